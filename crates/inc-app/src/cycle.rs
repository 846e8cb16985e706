//! One regulation tick across all channels.
//!
//! Within a tick every sensor is read before any output is written, and the
//! O2 channel is regulated before the CO2 channel is arbitrated. While O2 is
//! purging continuously the CO2 valve is forced closed, whatever its own
//! reading asks for.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use inc_controls::{ActuatorBand, GasRegulator, HeaterRegulator, SharedActuator, TemperatureBand};
use inc_core::Clock;
use inc_sensors::{FaultTolerantSensor, SensorChannel};

use crate::error::AppResult;
use crate::shutdown::EmergencyStop;

/// Sensor as seen by the cycle: boxed channel behind the retry wrapper.
pub type SupervisedSensor = FaultTolerantSensor<Box<dyn SensorChannel>>;

/// Readings taken at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub temperature_c: f64,
    pub o2_pct: f64,
    pub co2_pct: f64,
    /// Seconds since the cycle was built.
    pub elapsed_s: f64,
}

/// State published after each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub elapsed_s: f64,
    pub temperature_c: f64,
    pub o2_pct: f64,
    pub co2_pct: f64,
    pub heater_duty: f64,
    pub o2_actuator: ActuatorBand,
    pub co2_actuator: ActuatorBand,
    pub heater_on: bool,
    pub o2_valve_open: bool,
    pub co2_valve_open: bool,
    pub temperature_band: TemperatureBand,
    /// Sensors whose value this tick is a held-over last good reading.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stale_sensors: Vec<String>,
}

/// Everything a cycle owns. Built fresh for every supervised attempt.
pub struct CycleParts {
    pub temperature: SupervisedSensor,
    pub o2_sensor: SupervisedSensor,
    pub co2_sensor: SupervisedSensor,
    pub heater: HeaterRegulator,
    pub o2: GasRegulator,
    pub co2: GasRegulator,
    pub clock: Box<dyn Clock>,
}

pub struct RegulationCycle {
    temperature: SupervisedSensor,
    o2_sensor: SupervisedSensor,
    co2_sensor: SupervisedSensor,
    heater: HeaterRegulator,
    o2: GasRegulator,
    co2: GasRegulator,
    clock: Box<dyn Clock>,
    stop: EmergencyStop,
    ticks: u64,
}

impl RegulationCycle {
    pub fn new(parts: CycleParts) -> Self {
        let mut outputs: Vec<SharedActuator> = parts.heater.pins().to_vec();
        outputs.push(parts.o2.actuator().clone());
        outputs.push(parts.co2.actuator().clone());
        Self {
            temperature: parts.temperature,
            o2_sensor: parts.o2_sensor,
            co2_sensor: parts.co2_sensor,
            heater: parts.heater,
            o2: parts.o2,
            co2: parts.co2,
            clock: parts.clock,
            stop: EmergencyStop::new(outputs),
            ticks: 0,
        }
    }

    /// Read all three sensors. Never fails; stale values are flagged by the
    /// sensors themselves.
    pub fn measure(&mut self) -> Measurement {
        let temperature_c = self.temperature.read();
        let o2_pct = self.o2_sensor.read();
        let co2_pct = self.co2_sensor.read();
        Measurement {
            temperature_c,
            o2_pct,
            co2_pct,
            elapsed_s: self.clock.elapsed_s(),
        }
    }

    /// Run one tick. Any actuator write failure is returned; the caller is
    /// expected to fire the emergency stop and rebuild.
    ///
    /// A channel whose sensor has not produced a good reading yet is held
    /// off instead of being regulated on the `0.0` placeholder.
    pub fn tick(&mut self) -> AppResult<Snapshot> {
        let m = self.measure();
        let now = m.elapsed_s;
        let temperature_ready = self.temperature.has_reading();
        let o2_ready = self.o2_sensor.has_reading();
        let co2_ready = self.co2_sensor.has_reading();

        let heater = if temperature_ready {
            self.heater.update(m.temperature_c, now)?
        } else {
            debug!("no temperature reading yet, heater held off");
            self.heater.force_off()?
        };

        let o2_actuator = if o2_ready {
            self.o2.update(m.o2_pct, now)?
        } else {
            debug!("no O2 reading yet, O2 valve held off");
            self.o2.force_off_at(now)?;
            ActuatorBand::Off
        };

        let co2_actuator = if o2_ready && self.o2.is_continuous(m.o2_pct) {
            debug!(o2 = m.o2_pct, "O2 purging continuously, CO2 held off");
            self.co2.force_off_at(now)?;
            ActuatorBand::Off
        } else if !co2_ready {
            debug!("no CO2 reading yet, CO2 valve held off");
            self.co2.force_off_at(now)?;
            ActuatorBand::Off
        } else {
            self.co2.update(m.co2_pct, now)?
        };

        if o2_ready && self.o2.is_overshoot(m.o2_pct) {
            warn!(o2 = m.o2_pct, setpoint = self.o2.config().setpoint, "O2 overshoot");
        }
        if co2_ready && self.co2.is_overshoot(m.co2_pct) {
            warn!(co2 = m.co2_pct, setpoint = self.co2.config().setpoint, "CO2 overshoot");
        }

        self.ticks += 1;
        let snapshot = Snapshot {
            elapsed_s: now,
            temperature_c: m.temperature_c,
            o2_pct: m.o2_pct,
            co2_pct: m.co2_pct,
            heater_duty: heater.duty,
            o2_actuator,
            co2_actuator,
            heater_on: heater.on,
            o2_valve_open: self.o2.is_valve_open(),
            co2_valve_open: self.co2.is_valve_open(),
            temperature_band: self.heater.color(m.temperature_c),
            stale_sensors: self.stale_sensors(),
        };

        info!(
            target: "incubator::data",
            t = snapshot.elapsed_s,
            temp = snapshot.temperature_c,
            o2 = snapshot.o2_pct,
            co2 = snapshot.co2_pct,
            duty = snapshot.heater_duty,
            o2_mode = %snapshot.o2_actuator,
            co2_mode = %snapshot.co2_actuator,
            o2_valve = snapshot.o2_valve_open,
            co2_valve = snapshot.co2_valve_open,
            "tick"
        );
        Ok(snapshot)
    }

    fn stale_sensors(&self) -> Vec<String> {
        [&self.temperature, &self.o2_sensor, &self.co2_sensor]
            .into_iter()
            .filter(|s| !s.last_read_fresh())
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Drive every output off. Safe to call at any time.
    pub fn emergency_stop(&self) -> usize {
        self.stop.trigger()
    }

    /// Stop handle sharing this cycle's outputs.
    pub fn stop_handle(&self) -> EmergencyStop {
        self.stop.clone()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn heater(&self) -> &HeaterRegulator {
        &self.heater
    }

    pub fn o2(&self) -> &GasRegulator {
        &self.o2
    }

    pub fn co2(&self) -> &GasRegulator {
        &self.co2
    }

    /// Sensors in read order: temperature, O2, CO2.
    pub fn sensors(&self) -> [&SupervisedSensor; 3] {
        [&self.temperature, &self.o2_sensor, &self.co2_sensor]
    }
}
