//! Board configuration
//!
//! Static facts about the robot the core is running on. Runtime
//! configuration that clients can change lives in [`crate::settings`].

use evebrain_hal::{
    AnalogExpander, Buzzer, ClimateSensor, Clock, CoilDriver, CompassSensor, GpioBank,
    NetworkLink, PinInterrupts, PinServoBank, PwmServo, RangeSensor, SerialRx, ServerLink,
    ServoLine,
};
use evebrain_protocol::HardwareVersion;

/// Steps per wheel revolution of the geared steppers, half-stepped
pub const DEFAULT_STEPS_PER_REVOLUTION: f32 = 2048.0;

/// Firmware sub-version appended to the hardware generation
pub const SUB_VERSION: &str = "1.0";

/// Everything the core needs from the hardware
///
/// Implemented automatically for any type providing all the HAL traits.
pub trait Board:
    Clock
    + GpioBank
    + PinInterrupts
    + CoilDriver
    + Buzzer
    + ServoLine
    + PwmServo
    + PinServoBank
    + ClimateSensor
    + RangeSensor
    + CompassSensor
    + AnalogExpander
    + NetworkLink
    + ServerLink
    + SerialRx
{
}

impl<T> Board for T where
    T: Clock
        + GpioBank
        + PinInterrupts
        + CoilDriver
        + Buzzer
        + ServoLine
        + PwmServo
        + PinServoBank
        + ClimateSensor
        + RangeSensor
        + CompassSensor
        + AnalogExpander
        + NetworkLink
        + ServerLink
        + SerialRx
{
}

/// Static robot description
#[derive(Debug, Clone, Copy)]
pub struct RobotConfig {
    /// Board generation, selects serial framing and baud rate
    pub hardware: HardwareVersion,
    /// Wheel stepper resolution
    pub steps_per_revolution: f32,
    /// Input sampled at boot; held low requests a factory reset
    pub reset_pin: Option<u8>,
    /// Pins reported in server status updates, in order
    pub status_pins: &'static [u8],
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            hardware: HardwareVersion::V3,
            steps_per_revolution: DEFAULT_STEPS_PER_REVOLUTION,
            reset_pin: None,
            status_pins: &[],
        }
    }
}
