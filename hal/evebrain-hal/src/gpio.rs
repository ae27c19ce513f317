//! GPIO pin abstractions
//!
//! Pins are addressed by number because the user-facing `gpio_*` and
//! `digitalInput` commands carry the pin in the message. Fixed board
//! wiring such as the shift register stays inside the board crate.

/// Pin direction for [`GpioBank::set_mode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Floating input
    Input,
    /// Push-pull output
    Output,
}

/// Pin-numbered general purpose I/O
///
/// Pin numbers are board numbers as the remote client sees them. Writes to
/// pins the board does not expose are ignored; reads of such pins return
/// low.
pub trait GpioBank {
    /// Configure the direction of a pin
    fn set_mode(&mut self, pin: u8, mode: PinMode);

    /// Drive an output pin
    fn digital_write(&mut self, pin: u8, high: bool);

    /// Sample a pin level
    fn digital_read(&mut self, pin: u8) -> bool;

    /// Set an 8-bit PWM duty cycle on a pin
    fn pwm_write(&mut self, pin: u8, duty: u8);

    /// Read the on-chip analog input
    fn analog_read(&mut self) -> u16;
}
