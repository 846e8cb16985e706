//! PID controller used by the heater regulator.
//!
//! - Gains are given directly (`kp`, `ki`, `kd`), not as time constants
//! - Derivative acts on the measurement, so setpoint steps do not kick
//! - Anti-windup is hard output clamping only; the integral is not clamped
//! - Sampled operation: the caller supplies `dt` for each update

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// PID gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (per second).
    pub ki: f64,
    /// Derivative gain (seconds).
    pub kd: f64,
}

/// PID controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidController {
    pub gains: PidGains,
    /// Minimum output value.
    pub out_min: f64,
    /// Maximum output value.
    pub out_max: f64,
}

impl PidController {
    /// Create a new PID controller.
    ///
    /// # Arguments
    ///
    /// * `gains` - Proportional, integral and derivative gains
    /// * `out_min` - Minimum output
    /// * `out_max` - Maximum output
    pub fn new(gains: PidGains, out_min: f64, out_max: f64) -> ControlResult<Self> {
        if !(gains.kp.is_finite() && gains.ki.is_finite() && gains.kd.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "PID gains must be finite",
            });
        }
        if !(out_min.is_finite() && out_max.is_finite()) || out_min >= out_max {
            return Err(ControlError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }
        Ok(Self {
            gains,
            out_min,
            out_max,
        })
    }

    /// Compute controller output.
    ///
    /// # Arguments
    ///
    /// * `state` - Controller state (integral and last measurement)
    /// * `pv` - Process variable (measured value)
    /// * `sp` - Setpoint (desired value)
    /// * `dt` - Time since last update (seconds), must be positive
    ///
    /// # Returns
    ///
    /// Updated state and output value, always within `[out_min, out_max]`.
    pub fn update(&self, state: &PidState, pv: f64, sp: f64, dt: f64) -> (PidState, f64) {
        // Error: e = sp - pv (positive error means PV is below setpoint)
        let error = sp - pv;

        let p_term = self.gains.kp * error;

        let integral = state.integral + self.gains.ki * error * dt;
        // A non-finite integral would poison every later output
        let integral = if integral.is_finite() {
            integral
        } else {
            state.integral
        };

        let d_input = state.last_input.map_or(0.0, |last| pv - last);
        let d_term = -self.gains.kd * d_input / dt;

        let output_raw = p_term + integral + d_term;
        let output = if output_raw.is_nan() {
            self.out_min
        } else {
            output_raw.clamp(self.out_min, self.out_max)
        };

        let new_state = PidState {
            integral,
            last_input: Some(pv),
        };

        (new_state, output)
    }
}

/// PID controller state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PidState {
    /// Integral accumulator (already multiplied by `ki`).
    pub integral: f64,
    /// Previous measurement, for the derivative term.
    pub last_input: Option<f64>,
}
