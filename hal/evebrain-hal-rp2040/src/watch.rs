//! Edge-watched input pins
//!
//! Interrupt-capable pins are owned by per-pin edge tasks in the firmware.
//! The tasks publish each level here; the board reads levels back for
//! `digitalInput` and gates event delivery on the enabled mask that
//! `attach_interrupt` / `detach_interrupt` maintain.

use portable_atomic::{AtomicU32, Ordering};

use evebrain_hal::InterruptError;

pub struct WatchedPins {
    pins: &'static [u8],
    enabled: AtomicU32,
    levels: AtomicU32,
}

impl WatchedPins {
    /// Watch `pins` (GPIO numbers below 32)
    pub const fn new(pins: &'static [u8]) -> Self {
        Self {
            pins,
            enabled: AtomicU32::new(0),
            levels: AtomicU32::new(0),
        }
    }

    pub fn pins(&self) -> &'static [u8] {
        self.pins
    }

    pub fn is_watched(&self, pin: u8) -> bool {
        pin < 32 && self.pins.contains(&pin)
    }

    pub fn enable(&self, pin: u8) -> Result<(), InterruptError> {
        if !self.is_watched(pin) {
            return Err(InterruptError::NotInterruptCapable);
        }
        self.enabled.fetch_or(1 << pin, Ordering::AcqRel);
        Ok(())
    }

    pub fn disable(&self, pin: u8) -> Result<(), InterruptError> {
        if !self.is_watched(pin) {
            return Err(InterruptError::NotInterruptCapable);
        }
        self.enabled.fetch_and(!(1 << pin), Ordering::AcqRel);
        Ok(())
    }

    pub fn is_enabled(&self, pin: u8) -> bool {
        pin < 32 && self.enabled.load(Ordering::Acquire) & (1 << pin) != 0
    }

    /// Publish the level an edge task just sampled
    pub fn record_level(&self, pin: u8, high: bool) {
        if pin >= 32 {
            return;
        }
        if high {
            self.levels.fetch_or(1 << pin, Ordering::AcqRel);
        } else {
            self.levels.fetch_and(!(1 << pin), Ordering::AcqRel);
        }
    }

    pub fn level(&self, pin: u8) -> bool {
        pin < 32 && self.levels.load(Ordering::Acquire) & (1 << pin) != 0
    }
}
