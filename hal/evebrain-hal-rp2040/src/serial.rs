//! Serial byte access over embassy-sync pipes
//!
//! UART tasks move bytes between the peripheral and two static pipes; the
//! main loop only ever touches the pipes and never awaits on the UART.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;

use evebrain_hal::{SerialRx, SerialTx};

/// Pipe capacity in each direction
pub const SERIAL_PIPE_SIZE: usize = 512;

pub type SerialPipe = Pipe<CriticalSectionRawMutex, SERIAL_PIPE_SIZE>;

/// Receive side, filled by the UART RX task
pub struct PipeRx {
    pipe: &'static SerialPipe,
}

impl PipeRx {
    pub fn new(pipe: &'static SerialPipe) -> Self {
        Self { pipe }
    }
}

impl SerialRx for PipeRx {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.pipe.try_read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }
}

/// Transmit side, drained by the UART TX task
pub struct PipeTx {
    pipe: &'static SerialPipe,
}

impl PipeTx {
    pub fn new(pipe: &'static SerialPipe) -> Self {
        Self { pipe }
    }
}

impl SerialTx for PipeTx {
    fn write(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while !rest.is_empty() {
            match self.pipe.try_write(rest) {
                Ok(n) => rest = &rest[n..],
                Err(_) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Serial TX pipe full, dropping {} bytes", rest.len());
                    return;
                }
            }
        }
    }
}
