//! Heater bank regulation.
//!
//! The PID output is a duty fraction of a fixed one-second phase window.
//! Within each window the whole bank is on while `now mod 1.0 < duty`.
//!
//! `update` runs once per tick, so the effective switching resolution is the
//! tick interval: with a 0.5 s tick the bank can only change state twice per
//! window. This is a property of the loop, not something the regulator
//! compensates for.

use serde::{Deserialize, Serialize};
use tracing::debug;

use inc_core::MIN_DT_S;

use crate::actuator::SharedActuator;
use crate::error::{ControlError, ControlResult};
use crate::pid::{PidController, PidGains, PidState};

/// Length of the heater phase window (seconds).
pub const PWM_WINDOW_S: f64 = 1.0;

/// Heater regulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterConfig {
    /// Target temperature (°C).
    pub setpoint: f64,
    /// Fraction of setpoint below which the reading is displayed as cold.
    pub threshold: f64,
    pub pid: PidGains,
    /// Duty limits, within `[0, 1]`.
    #[serde(default = "default_output_limits")]
    pub output_limits: (f64, f64),
}

fn default_output_limits() -> (f64, f64) {
    (0.0, 1.0)
}

/// Display classification of a temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    /// Below `setpoint * threshold`.
    Cold,
    /// Between `setpoint * threshold` and `setpoint`.
    Approaching,
    /// At or above setpoint.
    AtSetpoint,
}

/// Result of one heater update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterOutput {
    /// Clamped PID output.
    pub duty: f64,
    /// Whether the bank was energized this tick.
    pub on: bool,
}

/// Duty-cycled heater bank. All pins are ganged.
pub struct HeaterRegulator {
    config: HeaterConfig,
    pid: PidController,
    pid_state: PidState,
    pins: Vec<SharedActuator>,
    last_update_s: Option<f64>,
    last_output: HeaterOutput,
}

impl HeaterRegulator {
    pub fn new(config: HeaterConfig, pins: Vec<SharedActuator>) -> ControlResult<Self> {
        if !(config.setpoint.is_finite() && config.setpoint > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "heater setpoint must be positive",
            });
        }
        if !(config.threshold > 0.0 && config.threshold <= 1.0) {
            return Err(ControlError::InvalidArg {
                what: "heater threshold must be in (0, 1]",
            });
        }
        let (out_min, out_max) = config.output_limits;
        if out_min < 0.0 || out_max > 1.0 {
            return Err(ControlError::InvalidArg {
                what: "heater output limits must lie within [0, 1]",
            });
        }
        if pins.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "heater bank needs at least one pin",
            });
        }
        let pid = PidController::new(config.pid, out_min, out_max)?;
        Ok(Self {
            config,
            pid,
            pid_state: PidState::default(),
            pins,
            last_update_s: None,
            last_output: HeaterOutput {
                duty: 0.0,
                on: false,
            },
        })
    }

    /// Feed a temperature reading and drive the bank for this tick.
    pub fn update(&mut self, temp: f64, now: f64) -> ControlResult<HeaterOutput> {
        let dt = self
            .last_update_s
            .map_or(MIN_DT_S, |last| (now - last).max(MIN_DT_S));
        let (state, duty) = self
            .pid
            .update(&self.pid_state, temp, self.config.setpoint, dt);
        self.pid_state = state;
        self.last_update_s = Some(now);

        let phase = now.rem_euclid(PWM_WINDOW_S);
        let on = phase < duty;
        for pin in &self.pins {
            pin.set(on)?;
        }

        debug!(temp, duty, phase, on, "heater update");
        self.last_output = HeaterOutput { duty, on };
        Ok(self.last_output)
    }

    /// Drive the whole bank off without regulating.
    ///
    /// The PID restarts from rest on the next `update`, so time spent forced
    /// off does not accumulate into the integral.
    pub fn force_off(&mut self) -> ControlResult<HeaterOutput> {
        for pin in &self.pins {
            pin.set(false)?;
        }
        self.pid_state = PidState::default();
        self.last_update_s = None;
        self.last_output = HeaterOutput {
            duty: 0.0,
            on: false,
        };
        Ok(self.last_output)
    }

    /// Pure display classification; never touches the outputs.
    pub fn color(&self, val: f64) -> TemperatureBand {
        if val < self.config.setpoint * self.config.threshold {
            TemperatureBand::Cold
        } else if val < self.config.setpoint {
            TemperatureBand::Approaching
        } else {
            TemperatureBand::AtSetpoint
        }
    }

    /// Duty computed by the most recent update.
    pub fn duty(&self) -> f64 {
        self.last_output.duty
    }

    pub fn is_energized(&self) -> bool {
        self.last_output.on
    }

    pub fn config(&self) -> &HeaterConfig {
        &self.config
    }

    pub fn pins(&self) -> &[SharedActuator] {
        &self.pins
    }
}
