//! Edge watcher for an interrupt-capable pin
//!
//! Stands in for the pin-change ISR: it publishes every level and, while
//! the pin is attached, pushes it into the event queue. It never touches
//! robot state.

use defmt::*;
use embassy_rp::gpio::Input;

use evebrain_core::{PinEvent, PinEventQueue};

use crate::board::WATCHED_PIN_COUNT;
use crate::channels::{PIN_EVENTS, WATCHED};

#[embassy_executor::task(pool_size = WATCHED_PIN_COUNT)]
pub async fn pin_watch_task(pin: u8, mut input: Input<'static>) {
    debug!("Watching GPIO{}", pin);
    WATCHED.record_level(pin, input.is_high());

    loop {
        input.wait_for_any_edge().await;
        let level = input.is_high();
        WATCHED.record_level(pin, level);

        if WATCHED.is_enabled(pin) && !PIN_EVENTS.push(PinEvent { pin, level }) {
            warn!("GPIO{} has no event slot", pin);
        }
    }
}
