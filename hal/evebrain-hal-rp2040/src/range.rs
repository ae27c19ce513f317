//! HC-SR04 ultrasonic ranger

use embassy_rp::gpio::{Input, Output};
use embassy_time::{block_for, Duration, Instant};

use evebrain_hal::RangeSensor;

pub struct Ultrasonic<'d> {
    trigger: Output<'d>,
    echo: Input<'d>,
}

impl<'d> Ultrasonic<'d> {
    pub fn new(trigger: Output<'d>, echo: Input<'d>) -> Self {
        Self { trigger, echo }
    }

    /// Spin until the echo line reaches `high` or the deadline passes
    fn wait_for(&self, high: bool, deadline: Instant) -> Option<Instant> {
        while self.echo.is_high() != high {
            if Instant::now() >= deadline {
                return None;
            }
        }
        Some(Instant::now())
    }
}

impl RangeSensor for Ultrasonic<'_> {
    fn echo_duration_us(&mut self, timeout_us: u32) -> u32 {
        self.trigger.set_low();
        block_for(Duration::from_micros(2));
        self.trigger.set_high();
        block_for(Duration::from_micros(10));
        self.trigger.set_low();

        let deadline = Instant::now() + Duration::from_micros(timeout_us as u64);
        let Some(rise) = self.wait_for(true, deadline) else {
            return 0;
        };
        match self.wait_for(false, deadline) {
            Some(fall) => (fall - rise).as_micros() as u32,
            None => 0,
        }
    }
}
