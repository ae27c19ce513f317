//! Serial frame decoding
//!
//! Two framings exist on the serial transport:
//! - Line mode: one JSON document per line, terminated by CR or LF
//! - Legacy framed mode: WebSocket text frames over the raw UART, preceded
//!   by an HTTP upgrade header block the host sends once after connecting
//!
//! Both decoders share a fixed receive buffer which is dropped after a
//! complete message, on a framing error and after [`IDLE_TIMEOUT_MS`]
//! without input. A buffer that fills up wraps back to the start.

use alloc::vec::Vec as AllocVec;
use heapless::Vec;

use crate::transport::HardwareVersion;

/// Receive buffer size in bytes
pub const FRAME_BUFFER_SIZE: usize = 256;

/// A partial message is discarded after this long without input
pub const IDLE_TIMEOUT_MS: u64 = 500;

const OPCODE_TEXT: u8 = 0x1;
const FIN: u8 = 0x80;
const MASK: u8 = 0x80;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// Result of feeding one byte to a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameStatus {
    /// More bytes needed
    Pending,
    /// A complete message payload, ready for dispatch
    Message(Vec<u8, FRAME_BUFFER_SIZE>),
    /// An HTTP upgrade header block was consumed
    HeaderComplete,
    /// A zero-length frame was consumed
    Empty,
    /// The buffered bytes are not a supported frame and were dropped
    Error,
}

/// Receive buffer with overrun wrap and idle tracking
#[derive(Debug, Clone, Default)]
struct RxBuffer {
    data: Vec<u8, FRAME_BUFFER_SIZE>,
    last_byte_ms: u64,
}

impl RxBuffer {
    fn push(&mut self, byte: u8, now_ms: u64) {
        self.last_byte_ms = now_ms;
        if self.data.push(byte).is_err() {
            self.data.clear();
            // Cannot fail on an empty buffer
            let _ = self.data.push(byte);
        }
    }

    fn take(&mut self) -> Vec<u8, FRAME_BUFFER_SIZE> {
        core::mem::take(&mut self.data)
    }

    fn poll_idle(&mut self, now_ms: u64) -> bool {
        if !self.data.is_empty() && now_ms.saturating_sub(self.last_byte_ms) >= IDLE_TIMEOUT_MS {
            self.data.clear();
            return true;
        }
        false
    }
}

/// Line-delimited decoder
#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    buffer: RxBuffer,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a single byte
    ///
    /// Line endings on an empty buffer are ignored, so CRLF yields one
    /// message.
    pub fn push(&mut self, byte: u8, now_ms: u64) -> FrameStatus {
        if byte == b'\r' || byte == b'\n' {
            self.buffer.last_byte_ms = now_ms;
            if self.buffer.data.is_empty() {
                return FrameStatus::Pending;
            }
            return FrameStatus::Message(self.buffer.take());
        }
        self.buffer.push(byte, now_ms);
        FrameStatus::Pending
    }

    /// Bytes buffered so far
    pub fn pending(&self) -> &[u8] {
        &self.buffer.data
    }
}

/// Classification of a legacy buffer
enum Legacy {
    Incomplete,
    Header,
    Frame { header_len: usize, len: usize, mask: Option<[u8; 4]> },
    Invalid,
}

/// WebSocket-over-serial decoder used by first generation boards
#[derive(Debug, Clone, Default)]
pub struct LegacyDecoder {
    buffer: RxBuffer,
}

impl LegacyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a single byte
    pub fn push(&mut self, byte: u8, now_ms: u64) -> FrameStatus {
        self.buffer.push(byte, now_ms);
        match classify(&self.buffer.data) {
            Legacy::Incomplete => FrameStatus::Pending,
            Legacy::Header => {
                self.buffer.data.clear();
                FrameStatus::HeaderComplete
            }
            Legacy::Invalid => {
                self.buffer.data.clear();
                FrameStatus::Error
            }
            Legacy::Frame { len: 0, .. } => {
                self.buffer.data.clear();
                FrameStatus::Empty
            }
            Legacy::Frame {
                header_len,
                len,
                mask,
            } => {
                let raw = self.buffer.take();
                let mut payload = Vec::new();
                for (i, &b) in raw[header_len..header_len + len].iter().enumerate() {
                    let b = match mask {
                        Some(key) => b ^ key[i % 4],
                        None => b,
                    };
                    // Length was checked against the buffer size
                    let _ = payload.push(b);
                }
                FrameStatus::Message(payload)
            }
        }
    }
}

fn classify(buf: &[u8]) -> Legacy {
    let Some(&first) = buf.first() else {
        return Legacy::Incomplete;
    };

    // HTTP upgrade request lines start with a method name
    if first.is_ascii_alphabetic() {
        return if buf.ends_with(b"\r\n\r\n") {
            Legacy::Header
        } else {
            Legacy::Incomplete
        };
    }

    if first != FIN | OPCODE_TEXT {
        return Legacy::Invalid;
    }
    let Some(&second) = buf.get(1) else {
        return Legacy::Incomplete;
    };

    let masked = second & MASK != 0;
    let (len, mut header_len) = match second & !MASK {
        LEN_64 => return Legacy::Invalid,
        LEN_16 => {
            if buf.len() < 4 {
                return Legacy::Incomplete;
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
        }
        n => (n as usize, 2),
    };

    let mask = if masked {
        if buf.len() < header_len + 4 {
            return Legacy::Incomplete;
        }
        let key = [
            buf[header_len],
            buf[header_len + 1],
            buf[header_len + 2],
            buf[header_len + 3],
        ];
        header_len += 4;
        Some(key)
    } else {
        None
    };

    if header_len + len > FRAME_BUFFER_SIZE {
        return Legacy::Invalid;
    }
    if buf.len() < header_len + len {
        return Legacy::Incomplete;
    }
    Legacy::Frame {
        header_len,
        len,
        mask,
    }
}

/// Frame decoder selected once per hardware generation
#[derive(Debug, Clone)]
pub enum FrameDecoder {
    Line(LineDecoder),
    LegacyFramed(LegacyDecoder),
}

impl FrameDecoder {
    /// Pick the framing used by `hw`
    pub fn for_hardware(hw: HardwareVersion) -> Self {
        if hw.uses_legacy_framing() {
            FrameDecoder::LegacyFramed(LegacyDecoder::new())
        } else {
            FrameDecoder::Line(LineDecoder::new())
        }
    }

    /// Feed a single received byte
    pub fn push(&mut self, byte: u8, now_ms: u64) -> FrameStatus {
        match self {
            FrameDecoder::Line(d) => d.push(byte, now_ms),
            FrameDecoder::LegacyFramed(d) => d.push(byte, now_ms),
        }
    }

    /// Drop a partial message after the idle timeout
    ///
    /// Returns true when buffered bytes were discarded.
    pub fn poll_idle(&mut self, now_ms: u64) -> bool {
        match self {
            FrameDecoder::Line(d) => d.buffer.poll_idle(now_ms),
            FrameDecoder::LegacyFramed(d) => d.buffer.poll_idle(now_ms),
        }
    }

    /// Wrap an outgoing document for this framing
    pub fn encode(&self, payload: &[u8]) -> AllocVec<u8> {
        match self {
            FrameDecoder::Line(_) => {
                let mut out = AllocVec::with_capacity(payload.len() + 2);
                out.extend_from_slice(payload);
                out.extend_from_slice(b"\r\n");
                out
            }
            FrameDecoder::LegacyFramed(_) => encode_text_frame(payload),
        }
    }
}

/// Encode an unmasked WebSocket text frame
pub fn encode_text_frame(payload: &[u8]) -> AllocVec<u8> {
    let mut out = AllocVec::with_capacity(payload.len() + 10);
    out.push(FIN | OPCODE_TEXT);
    if payload.len() < LEN_16 as usize {
        out.push(payload.len() as u8);
    } else if payload.len() <= u16::MAX as usize {
        out.push(LEN_16);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        out.push(LEN_64);
        out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}
