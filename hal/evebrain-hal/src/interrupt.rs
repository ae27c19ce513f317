//! Pin-change interrupt control
//!
//! Only a subset of pins can raise edge interrupts. Attaching an interrupt
//! arranges for the board's handler to push a pin event for that pin on
//! every level change.

/// Errors from interrupt configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptError {
    /// The pin cannot raise change interrupts on this board
    NotInterruptCapable,
}

/// Pin-change interrupt configuration
pub trait PinInterrupts {
    /// Configure `pin` as an input and enable change interrupts on it
    fn attach_interrupt(&mut self, pin: u8) -> Result<(), InterruptError>;

    /// Disable change interrupts on `pin`
    fn detach_interrupt(&mut self, pin: u8) -> Result<(), InterruptError>;
}
