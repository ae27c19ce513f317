//! Board-agnostic core logic for the Evebrain robot firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Persistent settings with corruption recovery
//! - Interrupt-safe pin event queue
//! - Differential-drive motion control with slack compensation
//! - Readiness scheduling of deferred command completions
//! - Command registry and reply correlation
//! - The robot context, its command handlers and the main-loop step
//!
//! Everything is driven from a single cooperative loop ([`Robot::poll`]);
//! the only state shared with interrupt context is the [`EventQueue`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

#[macro_use]
pub mod logging;

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod handlers;
pub mod motion;
pub mod notes;
pub mod robot;
pub mod scheduler;
pub mod servo;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{CommandKind, CommandProcessor, OutputHandler};
pub use config::{Board, RobotConfig};
pub use context::Context;
pub use error::{SettingsError, ValidationError};
pub use events::{EventQueue, PinEvent, PinEventQueue};
pub use motion::{Direction, Geometry, MotionController};
pub use robot::Robot;
pub use scheduler::{ExecutionMode, PendingCompletion, ReadinessScheduler};
pub use settings::{Settings, SettingsStore};
