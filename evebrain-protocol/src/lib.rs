//! Evebrain Command Protocol
//!
//! This crate defines the wire contract between a remote client and the
//! robot. Commands and replies are small JSON documents; on the serial
//! transport they are delimited either by line endings or, on first
//! generation hardware, by WebSocket text frames.
//!
//! # Protocol Overview
//!
//! ```text
//! client ──► {"cmd":"forward","arg":"100","id":"a1"}
//! robot  ◄── {"status":"ok","id":"a1"}                 (when motion ends)
//! robot  ◄── {"status":"notify","id":"pin_5_status","msg":true}
//! ```
//!
//! Each request may carry an `id` which is echoed in its reply, so a
//! client can correlate a deferred completion with the request that
//! started it. Notifications use `id` for the channel name instead.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod frame;
pub mod messages;
pub mod transport;

pub use frame::{
    encode_text_frame, FrameDecoder, FrameStatus, LegacyDecoder, LineDecoder,
    FRAME_BUFFER_SIZE, IDLE_TIMEOUT_MS,
};
pub use messages::{number, ParseError, Reply, ReplyStatus, Request};
pub use transport::HardwareVersion;
