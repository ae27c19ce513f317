//! Robot main loop task
//!
//! Everything the core owns is touched only from here. The loop never
//! blocks on I/O; it yields between iterations so the UART, edge and
//! flash tasks get to run.

use defmt::*;
use embassy_futures::yield_now;
use embassy_time::{Duration, Instant};

use evebrain_core::Robot;
use evebrain_hal_rp2040::{FlashEeprom, Rp2040Board};

use crate::board::EEPROM_SIZE;

pub type EveRobot = Robot<Rp2040Board, FlashEeprom<EEPROM_SIZE>>;

/// Loop statistics are logged this often
const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[embassy_executor::task]
pub async fn robot_task(robot: &'static mut EveRobot) {
    info!("Robot loop started, version {}", robot.context().version());

    let mut iterations: u32 = 0;
    let mut last_stats = Instant::now();

    loop {
        robot.poll();
        iterations = iterations.wrapping_add(1);

        if last_stats.elapsed() >= STATS_INTERVAL {
            trace!("Robot loop: {} iterations/min", iterations);
            iterations = 0;
            last_stats = Instant::now();
        }

        yield_now().await;
    }
}
