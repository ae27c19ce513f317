//! Error types
//!
//! Validation errors are reported to the client verbatim, so each variant
//! maps to a fixed message. Everything else is logged and swallowed.

use evebrain_hal::StorageError;

/// Errors from persisting settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// The storage medium failed
    Storage(StorageError),
    /// The record could not be encoded into the settings region
    Encode,
}

impl From<StorageError> for SettingsError {
    fn from(e: StorageError) -> Self {
        SettingsError::Storage(e)
    }
}

/// Rejected command arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    LeftSpeedRange,
    LeftSpeedZero,
    RightSpeedRange,
    RightSpeedZero,
    MissingSpeedMoveArgs,
    MissingSpeedMoveStepsArgs,
    NotifyUnsupported,
    StopNotifyUnsupported,
    InvalidServoPin,
    MissingServoArgs,
    InvalidArgument,
}

impl ValidationError {
    /// Message sent to the client
    pub fn message(self) -> &'static str {
        match self {
            Self::LeftSpeedRange => "Left speed is out of range, must be within (0,1]",
            Self::LeftSpeedZero => {
                "Left speed is out of range, cannot be 0 when moving non-zero distance."
            }
            Self::RightSpeedRange => "Right speed is out of range, must be within (0,1]",
            Self::RightSpeedZero => {
                "Right speed is out of range, cannot be 0 when moving non-zero distance."
            }
            Self::MissingSpeedMoveArgs => {
                "Missing leftSpeed, rightSpeed, leftDistance or rightDistance"
            }
            Self::MissingSpeedMoveStepsArgs => {
                "Missing leftSpeed, rightSpeed, leftSteps or rightSteps"
            }
            Self::NotifyUnsupported => "Cannot be notified about changes to that pin",
            Self::StopNotifyUnsupported => {
                "Cannot stop being notified about changes to that pin since cannot be notified about changes to that pin"
            }
            Self::InvalidServoPin => "Pin not valid for generic servo.",
            Self::MissingServoArgs => "Missing pin or angle argument for genericServo command",
            Self::InvalidArgument => "Invalid argument",
        }
    }
}
