//! Serial transport byte access

/// Non-blocking UART receive side
pub trait SerialRx {
    /// Take the next received byte, if any
    fn read_byte(&mut self) -> Option<u8>;
}

/// UART transmit side
///
/// Writes may be buffered; a full buffer drops bytes rather than blocking
/// the main loop.
pub trait SerialTx {
    fn write(&mut self, bytes: &[u8]);
}
