//! Evebrain Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the robot core is written
//! against. Chip-specific crates implement them; the core never touches
//! registers directly, which keeps it testable on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (evebrain-firmware)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  evebrain-core (robot context, loop)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  evebrain-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!            ┌────────────────┐
//!            │ evebrain-hal-  │
//!            │    rp2040      │
//!            └────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`time::Clock`] - Monotonic milliseconds / microseconds
//! - [`gpio::GpioBank`] - Pin-numbered digital, PWM and analog I/O
//! - [`interrupt::PinInterrupts`] - Pin-change interrupt attach/detach
//! - [`storage::NvStorage`] - Byte-addressable non-volatile storage
//! - [`actuator`] - Wheel coils, buzzer, servos
//! - [`sensor`] - Climate, ranging, compass, ADC expander
//! - [`network`] - Wifi status/configuration and remote server link
//! - [`serial`] - Byte-level UART receive / transmit

#![no_std]
#![deny(unsafe_code)]

pub mod actuator;
pub mod gpio;
pub mod interrupt;
pub mod network;
pub mod sensor;
pub mod serial;
pub mod storage;
pub mod time;

// Re-export key traits at crate root for convenience
pub use actuator::{Buzzer, CoilDriver, PinServoBank, PwmServo, ServoLine};
pub use gpio::{GpioBank, PinMode};
pub use interrupt::{InterruptError, PinInterrupts};
pub use network::{NetworkConfig, NetworkLink, ScanEntry, ServerLink, WifiMode};
pub use sensor::{AnalogExpander, ClimateSensor, CompassReading, CompassSensor, RangeSensor};
pub use serial::{SerialRx, SerialTx};
pub use storage::{NvStorage, StorageError};
pub use time::Clock;
