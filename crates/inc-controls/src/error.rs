//! Error types for regulation.

use thiserror::Error;

/// Result type for regulation operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while configuring or running a regulator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a constructor.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// An actuator write did not take effect. Always fatal to the cycle.
    #[error("Actuator write failed on {actuator}: {reason}")]
    ActuatorWrite { actuator: String, reason: String },
}

impl ControlError {
    /// Whether this error means actuator state can no longer be trusted.
    pub fn is_actuator_fault(&self) -> bool {
        matches!(self, Self::ActuatorWrite { .. })
    }
}
