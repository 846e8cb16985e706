//! Regulation primitives for the incubator.
//!
//! This crate turns sensor readings into actuator writes. Every actuator is
//! binary (relay or solenoid), so the regulators here decide *when* an output
//! is energized rather than *how much*.
//!
//! # Architecture
//!
//! - [`ActuatorPort`] is the injected output capability, one per relay/valve
//! - [`PidController`] is a sampled PID with hard output clamping
//! - [`HeaterRegulator`] duty-cycles a ganged heater bank from the PID output
//! - [`GasRegulator`] runs the continuous/pulse/off state machine for one gas
//!   channel, with refractory timing, rate suppression and a startup soft-start
//!
//! Time is always an elapsed-seconds argument supplied by the caller, never
//! read from a system clock here.

pub mod actuator;
pub mod error;
pub mod gas;
pub mod heater;
pub mod pid;

pub use actuator::{ActuatorBand, ActuatorPort, SharedActuator, SimulatedOutput};
pub use error::{ControlError, ControlResult};
pub use gas::{GasRegulator, GasRegulatorState, RegulatorConfig};
pub use heater::{HeaterConfig, HeaterOutput, HeaterRegulator, PWM_WINDOW_S, TemperatureBand};
pub use pid::{PidController, PidGains, PidState};
