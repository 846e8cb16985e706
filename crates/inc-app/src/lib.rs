//! Application layer for the incubator controller.
//!
//! Ties sensors, regulators and outputs into a [`RegulationCycle`], wires the
//! cycle to GPIO/UART hardware or to simulated stand-ins, and runs it under a
//! restart supervisor. Front ends (the CLI) only call into this crate.

pub mod cycle;
pub mod error;
pub mod hardware;
pub mod run_service;
pub mod shutdown;

pub use cycle::{CycleParts, Measurement, RegulationCycle, Snapshot, SupervisedSensor};
pub use error::{AppError, AppResult};
pub use hardware::{
    GpioRelay, Outputs, SensorSet, build_cycle, claim_gpio_outputs, force_gpio_off,
    hardware_sensors, simulated_outputs, simulated_sensors,
};
pub use run_service::{RunOptions, RunSummary, run_supervised};
pub use shutdown::EmergencyStop;
