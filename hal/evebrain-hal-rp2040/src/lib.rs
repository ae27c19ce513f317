//! RP2040-specific HAL for the Evebrain robot firmware
//!
//! This crate provides RP2040 implementations of the `evebrain-hal`
//! traits:
//!
//! - Flash-backed emulated EEPROM for the settings record
//! - Pin-numbered user GPIO with PWM-capable pins and software servos
//! - Edge-watched input pins feeding the pin event queue
//! - Shift-register coil driver for the two wheel steppers
//! - PWM buzzer and servo outputs
//! - DHT11, HC-SR04 and I2C (HMC5883L / PCF8591) sensors
//! - Pipe-backed serial byte access
//!
//! [`board::Rp2040Board`] bundles all of them into one value implementing
//! every HAL trait.

#![no_std]

pub mod board;
pub mod climate;
pub mod coils;
pub mod flash;
pub mod i2c_sensors;
pub mod pins;
pub mod pwm;
pub mod range;
pub mod serial;
pub mod watch;

pub use board::Rp2040Board;
pub use flash::{EepromFlash, FlashEeprom};
pub use watch::WatchedPins;
