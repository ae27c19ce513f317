//! Statics shared between Embassy tasks
//!
//! Uses embassy-sync primitives for the UART and flash hand-offs and the
//! core's critical-section queue for pin events.

use evebrain_core::EventQueue;
use evebrain_hal_rp2040::flash::CommitSignal;
use evebrain_hal_rp2040::serial::SerialPipe;
use evebrain_hal_rp2040::WatchedPins;

use crate::board::{EEPROM_SIZE, WATCHED_PINS, WATCHED_PIN_COUNT};

/// Bytes received on UART0, consumed by the robot loop
pub static RX_PIPE: SerialPipe = SerialPipe::new();

/// Bytes queued by the robot loop, drained to UART0
pub static TX_PIPE: SerialPipe = SerialPipe::new();

/// Pin levels pushed by the edge tasks
pub static PIN_EVENTS: EventQueue<WATCHED_PIN_COUNT> = EventQueue::new(WATCHED_PINS);

/// Levels and notify mask of the edge-watched pins
pub static WATCHED: WatchedPins = WatchedPins::new(&WATCHED_PINS);

/// EEPROM images waiting to be written to flash
pub static EEPROM_COMMITS: CommitSignal<EEPROM_SIZE> = CommitSignal::new();
