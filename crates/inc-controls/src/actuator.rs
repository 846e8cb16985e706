//! Binary actuator outputs.
//!
//! Every relay and solenoid valve is reached through an [`ActuatorPort`].
//! Ports are shared (`Arc`) so that the emergency stop can reach the same
//! outputs as the regulator that normally drives them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// One on/off output (heater relay or solenoid valve).
///
/// Implementations must make `set` safe to call from any thread, since the
/// emergency stop may run from a signal handler thread.
pub trait ActuatorPort: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Drive the output. A failure means the output state is unknown.
    fn set(&self, on: bool) -> ControlResult<()>;
}

/// Actuator handle shared between a regulator and the emergency stop.
pub type SharedActuator = Arc<dyn ActuatorPort>;

/// Actuation mode of a gas channel for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorBand {
    /// Held fully on.
    Continuous,
    /// In the pulse band: micro-pulses separated by refractory periods.
    Pulse,
    /// Held off.
    Off,
}

impl ActuatorBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "CONT",
            Self::Pulse => "PULSE",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for ActuatorBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory output for dry runs and tests.
#[derive(Debug, Default)]
pub struct SimulatedOutput {
    name: String,
    on: AtomicBool,
    writes: AtomicU64,
    fail: AtomicBool,
}

impl SimulatedOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Convenience constructor returning the output already shared.
    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail (fault injection).
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ActuatorPort for SimulatedOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn set(&self, on: bool) -> ControlResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ControlError::ActuatorWrite {
                actuator: self.name.clone(),
                reason: "simulated write fault".to_string(),
            });
        }
        self.on.store(on, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
