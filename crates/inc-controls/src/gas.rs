//! Gas channel regulation.
//!
//! One [`GasRegulator`] drives one solenoid valve. A non-inverted channel
//! injects gas (CO2: dose while the reading is *below* setpoint); an inverted
//! channel displaces it (O2 purged with N2: dose while the reading is *above*
//! setpoint).
//!
//! Each tick is evaluated in strict priority order:
//!
//! 1. **Continuous**: reading past `setpoint * th_continuous`, valve held on
//! 2. **Idle**: reading outside the pulse band, valve off
//! 3. **Rate suppression**: reading already improving faster than
//!    `rise_suppression` per second, valve off
//! 4. **Refractory**: less than the settle time since the last pulse closed,
//!    valve off
//! 5. **Pulse**: open for the pulse-on time, then close and start a new
//!    refractory period
//!
//! During the first `startup_soft_secs` of the run the startup pulse-on and
//! settle durations replace the steady-state ones.

use serde::{Deserialize, Serialize};
use tracing::debug;

use inc_core::rate_of_change;

use crate::actuator::{ActuatorBand, SharedActuator};
use crate::error::{ControlError, ControlResult};

/// Configuration of one gas channel.
///
/// Thresholds are fractions of `setpoint`. Injected channels need
/// `th_continuous < th_pulse < th_stop`; inverted channels the reverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatorConfig {
    pub setpoint: f64,
    pub invert: bool,
    pub th_continuous: f64,
    pub th_pulse: f64,
    /// Past this level (on the far side of setpoint) the channel is overshooting.
    pub th_stop: f64,
    pub pulse_on_s: f64,
    pub settle_s: f64,
    pub startup_soft_secs: f64,
    pub startup_pulse_on_s: f64,
    pub startup_settle_s: f64,
    /// Improvement rate (units per second) above which dosing pauses.
    pub rise_suppression: f64,
}

impl RegulatorConfig {
    pub fn validate(&self) -> ControlResult<()> {
        if !(self.setpoint.is_finite() && self.setpoint > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "gas setpoint must be positive",
            });
        }
        let thresholds = [self.th_continuous, self.th_pulse, self.th_stop];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "gas thresholds must be finite",
            });
        }
        let ordered = if self.invert {
            self.th_continuous > self.th_pulse && self.th_pulse > self.th_stop
        } else {
            self.th_continuous < self.th_pulse && self.th_pulse < self.th_stop
        };
        if !ordered {
            return Err(ControlError::InvalidArg {
                what: "gas thresholds out of order for channel direction",
            });
        }
        let timing = [
            self.pulse_on_s,
            self.settle_s,
            self.startup_soft_secs,
            self.startup_pulse_on_s,
            self.startup_settle_s,
            self.rise_suppression,
        ];
        if timing.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ControlError::InvalidArg {
                what: "gas timing parameters must be finite and non-negative",
            });
        }
        Ok(())
    }

    fn in_startup(&self, now: f64) -> bool {
        now < self.startup_soft_secs
    }

    /// Pulse-on duration applicable at `now`.
    pub fn pulse_on_at(&self, now: f64) -> f64 {
        if self.in_startup(now) {
            self.startup_pulse_on_s
        } else {
            self.pulse_on_s
        }
    }

    /// Settle duration applicable at `now`.
    pub fn settle_at(&self, now: f64) -> f64 {
        if self.in_startup(now) {
            self.startup_settle_s
        } else {
            self.settle_s
        }
    }

    /// Whether `val` is past `setpoint * fraction` in the dosing direction.
    fn past(&self, val: f64, fraction: f64) -> bool {
        let level = self.setpoint * fraction;
        if self.invert { val > level } else { val < level }
    }
}

/// Mutable state owned by one regulator.
///
/// `pulse_started_s` is `Some` exactly while the valve is open for a pulse
/// (as opposed to held open in continuous mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasRegulatorState {
    pub last_pulse_end_s: f64,
    pub last_value: Option<f64>,
    pub last_sample_s: Option<f64>,
    pub valve_on: bool,
    pub pulse_started_s: Option<f64>,
}

impl Default for GasRegulatorState {
    fn default() -> Self {
        // Engine start counts as a pulse end, so a fresh start (or a restart
        // after a fault) waits out one settle period before dosing.
        Self {
            last_pulse_end_s: 0.0,
            last_value: None,
            last_sample_s: None,
            valve_on: false,
            pulse_started_s: None,
        }
    }
}

/// Continuous/pulse/off state machine for one gas channel.
pub struct GasRegulator {
    name: String,
    config: RegulatorConfig,
    actuator: SharedActuator,
    state: GasRegulatorState,
}

impl GasRegulator {
    pub fn new(
        name: impl Into<String>,
        config: RegulatorConfig,
        actuator: SharedActuator,
    ) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            actuator,
            state: GasRegulatorState::default(),
        })
    }

    /// Run one tick of the state machine and drive the valve.
    ///
    /// Returns the band the channel was regulated in this tick.
    pub fn update(&mut self, val: f64, now: f64) -> ControlResult<ActuatorBand> {
        let rate = match (self.state.last_value, self.state.last_sample_s) {
            (Some(prev), Some(prev_t)) => rate_of_change(prev, prev_t, val, now),
            _ => 0.0,
        };
        self.state.last_value = Some(val);
        self.state.last_sample_s = Some(now);

        if self.is_continuous(val) {
            self.state.pulse_started_s = None;
            self.drive(true)?;
            debug!(channel = %self.name, val, "continuous");
            return Ok(ActuatorBand::Continuous);
        }

        if !self.in_pulse_band(val) {
            self.close(now)?;
            return Ok(ActuatorBand::Off);
        }

        if self.improving_faster_than_limit(rate) {
            debug!(channel = %self.name, val, rate, "dosing suppressed, already correcting");
            self.close(now)?;
            return Ok(ActuatorBand::Pulse);
        }

        let settle = self.config.settle_at(now);
        if now - self.state.last_pulse_end_s < settle {
            self.close(now)?;
            return Ok(ActuatorBand::Pulse);
        }

        match (self.state.valve_on, self.state.pulse_started_s) {
            (false, _) => {
                self.drive(true)?;
                self.state.pulse_started_s = Some(now);
                debug!(channel = %self.name, val, now, "pulse started");
            }
            (true, Some(started)) => {
                // Duration is fixed when the pulse opens
                if now - started >= self.config.pulse_on_at(started) {
                    self.close(now)?;
                    debug!(channel = %self.name, val, now, "pulse ended");
                } else {
                    self.drive(true)?;
                }
            }
            // Valve still open from continuous mode: treat it as a pulse that
            // just ended so the refractory period applies.
            (true, None) => self.close(now)?,
        }
        Ok(ActuatorBand::Pulse)
    }

    /// Close the valve immediately.
    ///
    /// Idempotent. A pulse cut short here counts as ended at the last sample
    /// time, so the next pulse still waits out the refractory period.
    pub fn force_off(&mut self) -> ControlResult<()> {
        let end = self.state.last_sample_s;
        self.close_at(end)
    }

    /// Close the valve at `now` without regulating, e.g. while another
    /// channel overrides this one. An open pulse ends at `now`.
    pub fn force_off_at(&mut self, now: f64) -> ControlResult<()> {
        self.close(now)
    }

    /// Reading is past the continuous threshold.
    pub fn is_continuous(&self, val: f64) -> bool {
        self.config.past(val, self.config.th_continuous)
    }

    /// Reading is inside the pulse band (or beyond it).
    pub fn in_pulse_band(&self, val: f64) -> bool {
        self.config.past(val, self.config.th_pulse)
    }

    /// Reading has gone past `setpoint * th_stop` on the far side of setpoint.
    pub fn is_overshoot(&self, val: f64) -> bool {
        let level = self.config.setpoint * self.config.th_stop;
        if self.config.invert {
            val < level
        } else {
            val > level
        }
    }

    /// Display classification, independent of actuation.
    pub fn color(&self, val: f64) -> ActuatorBand {
        if self.is_continuous(val) {
            ActuatorBand::Continuous
        } else if self.in_pulse_band(val) {
            ActuatorBand::Pulse
        } else {
            ActuatorBand::Off
        }
    }

    pub fn is_valve_open(&self) -> bool {
        self.state.valve_on
    }

    pub fn state(&self) -> &GasRegulatorState {
        &self.state
    }

    pub fn config(&self) -> &RegulatorConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actuator(&self) -> &SharedActuator {
        &self.actuator
    }

    fn improving_faster_than_limit(&self, rate: f64) -> bool {
        // Injected channels improve by rising, displaced channels by falling
        let improvement = if self.config.invert { -rate } else { rate };
        improvement > self.config.rise_suppression
    }

    fn drive(&mut self, on: bool) -> ControlResult<()> {
        self.actuator.set(on)?;
        self.state.valve_on = on;
        Ok(())
    }

    fn close(&mut self, now: f64) -> ControlResult<()> {
        self.close_at(Some(now))
    }

    fn close_at(&mut self, end_s: Option<f64>) -> ControlResult<()> {
        let was_open = self.state.valve_on;
        self.drive(false)?;
        if was_open {
            if let Some(end) = end_s {
                self.state.last_pulse_end_s = self.state.last_pulse_end_s.max(end);
            }
        }
        self.state.pulse_started_s = None;
        Ok(())
    }
}
