//! Error types for the inc-app service layer.

use inc_controls::ControlError;

/// Application error type wrapping the backend crates.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Project(String),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Sensor setup failed: {0}")]
    Sensor(String),

    #[error("GPIO pin {pin}: {reason}")]
    Gpio { pin: u8, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Regulation cycle panicked: {0}")]
    Panicked(String),
}

/// Result type for inc-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// A failed actuator write. Always fatal for the current cycle.
    pub fn is_actuator_fault(&self) -> bool {
        matches!(self, AppError::Control(err) if err.is_actuator_fault())
    }
}

impl From<inc_project::ProjectError> for AppError {
    fn from(err: inc_project::ProjectError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<inc_sensors::SensorError> for AppError {
    fn from(err: inc_sensors::SensorError) -> Self {
        AppError::Sensor(err.to_string())
    }
}
