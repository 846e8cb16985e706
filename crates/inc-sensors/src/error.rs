//! Error types for sensor access.

use thiserror::Error;

/// Result type for sensor operations.
pub type SensorResult<T> = Result<T, SensorError>;

/// Errors raised by a [`SensorChannel`](crate::SensorChannel).
///
/// These never reach the regulation loop; [`FaultTolerantSensor`](crate::FaultTolerantSensor)
/// absorbs them.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("I/O error on {device}: {source}")]
    Io {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serial port {port}: {reason}")]
    Serial { port: String, reason: String },

    #[error("Timed out waiting for a response from {device}")]
    Timeout { device: String },

    #[error("Malformed response from {device}: {response:?}")]
    Malformed { device: String, response: String },

    #[error("No temperature probes found")]
    NoProbes,

    #[error("All {count} temperature probes failed")]
    AllProbesFailed { count: usize },

    #[error("Zero reading from {device}")]
    ZeroReading { device: String },

    #[error("Non-finite reading from {device}: {value}")]
    NonFinite { device: String, value: f64 },

    #[error("Invalid sensor setup: {what}")]
    InvalidSetup { what: &'static str },
}
