//! Wiring configuration to hardware (or to simulated stand-ins).
//!
//! Outputs are claimed once per process and shared by every cycle the
//! supervisor builds; sensors and regulators are rebuilt per attempt.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rppal::gpio::{Gpio, OutputPin};
use tracing::info;

use inc_controls::{
    ActuatorPort, ControlError, ControlResult, GasRegulator, HeaterRegulator, SharedActuator,
    SimulatedOutput,
};
use inc_core::Clock;
use inc_project::{GasChannel, IncubatorConfig};
use inc_sensors::{
    FaultTolerantSensor, OneWireTemperature, ProfileSensor, SensorChannel, SerialGasConfig,
    SerialGasSensor,
};

use crate::cycle::{CycleParts, RegulationCycle};
use crate::error::{AppError, AppResult};
use crate::shutdown::EmergencyStop;

/// Bench profiles for `--simulate`: `(offset_s, value)` steps.
pub const SIM_TEMPERATURE_PROFILE: &[(f64, f64)] = &[(0.0, 20.0), (5.0, 30.0), (10.0, 37.0)];
pub const SIM_O2_PROFILE: &[(f64, f64)] = &[(0.0, 20.0), (15.0, 10.0), (30.0, 2.0)];
pub const SIM_CO2_PROFILE: &[(f64, f64)] = &[(0.0, 0.0), (10.0, 3.0), (20.0, 5.0)];

/// Relay or solenoid on a GPIO pin, active high.
pub struct GpioRelay {
    name: String,
    pin_number: u8,
    pin: Mutex<OutputPin>,
}

impl GpioRelay {
    /// Claim `pin` as an output, driven low.
    pub fn claim(gpio: &Gpio, pin: u8, name: impl Into<String>) -> AppResult<Self> {
        let mut output = gpio
            .get(pin)
            .map_err(|e| AppError::Gpio {
                pin,
                reason: e.to_string(),
            })?
            .into_output_low();
        // Pins stay driven low after exit instead of floating back to inputs
        output.set_reset_on_drop(false);
        Ok(Self {
            name: name.into(),
            pin_number: pin,
            pin: Mutex::new(output),
        })
    }

    pub fn pin_number(&self) -> u8 {
        self.pin_number
    }
}

impl ActuatorPort for GpioRelay {
    fn name(&self) -> &str {
        &self.name
    }

    fn set(&self, on: bool) -> ControlResult<()> {
        let mut pin = self.pin.lock().map_err(|_| ControlError::ActuatorWrite {
            actuator: self.name.clone(),
            reason: "pin lock poisoned".to_string(),
        })?;
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }
}

/// Every output the controller drives.
#[derive(Clone)]
pub struct Outputs {
    pub heaters: Vec<SharedActuator>,
    pub o2: SharedActuator,
    pub co2: SharedActuator,
}

impl Outputs {
    pub fn all(&self) -> Vec<SharedActuator> {
        let mut all = self.heaters.clone();
        all.push(self.o2.clone());
        all.push(self.co2.clone());
        all
    }

    pub fn emergency_stop(&self) -> EmergencyStop {
        EmergencyStop::new(self.all())
    }

    pub fn gas(&self, channel: GasChannel) -> &SharedActuator {
        match channel {
            GasChannel::O2 => &self.o2,
            GasChannel::Co2 => &self.co2,
        }
    }
}

fn output_name(config: &IncubatorConfig, pin: u8) -> String {
    if pin == config.gpio.o2_pin {
        "o2-valve".to_string()
    } else if pin == config.gpio.co2_pin {
        "co2-valve".to_string()
    } else {
        format!("heater-{pin}")
    }
}

/// Claim every configured pin as an output, driven low.
pub fn claim_gpio_outputs(config: &IncubatorConfig) -> AppResult<Outputs> {
    let gpio = Gpio::new().map_err(|e| AppError::Gpio {
        pin: 0,
        reason: format!("GPIO unavailable: {e}"),
    })?;
    let claim = |pin: u8| -> AppResult<SharedActuator> {
        Ok(Arc::new(GpioRelay::claim(&gpio, pin, output_name(config, pin))?))
    };

    let heaters = config
        .gpio
        .heaters
        .iter()
        .map(|&pin| claim(pin))
        .collect::<AppResult<Vec<_>>>()?;
    let outputs = Outputs {
        heaters,
        o2: claim(config.gpio.o2_pin)?,
        co2: claim(config.gpio.co2_pin)?,
    };
    info!(pins = ?config.all_pins(), "GPIO outputs claimed low");
    Ok(outputs)
}

/// In-memory outputs named like their GPIO counterparts.
pub fn simulated_outputs(config: &IncubatorConfig) -> Outputs {
    let sim = |pin: u8| -> SharedActuator { SimulatedOutput::shared(output_name(config, pin)) };
    Outputs {
        heaters: config.gpio.heaters.iter().map(|&pin| sim(pin)).collect(),
        o2: sim(config.gpio.o2_pin),
        co2: sim(config.gpio.co2_pin),
    }
}

/// Claim every configured pin and drive it low. Returns how many pins were
/// forced off.
pub fn force_gpio_off(config: &IncubatorConfig) -> AppResult<usize> {
    let outputs = claim_gpio_outputs(config)?;
    let stop = outputs.emergency_stop();
    let failures = stop.trigger();
    if failures > 0 {
        return Err(AppError::InvalidInput(format!(
            "{failures} outputs could not be forced off"
        )));
    }
    Ok(stop.outputs().len())
}

/// The three raw sensor channels of one cycle.
pub struct SensorSet {
    pub temperature: Box<dyn SensorChannel>,
    pub o2: Box<dyn SensorChannel>,
    pub co2: Box<dyn SensorChannel>,
}

fn seconds(field: &str, value: f64) -> AppResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| AppError::InvalidInput(format!("{field} = {value}: {e}")))
}

fn serial_config(config: &IncubatorConfig, channel: GasChannel) -> AppResult<SerialGasConfig> {
    let port = config.serial_port(channel);
    Ok(SerialGasConfig {
        port: port.port.clone(),
        baud: config.serial.baud,
        command: port.cmd.clone(),
        scale: port.scale,
        timeout: seconds("serial.timeout_s", config.serial.timeout_s)?,
        open_settle: seconds("serial.open_settle_s", config.serial.open_settle_s)?,
    })
}

/// 1-wire temperature probes plus the two serial gas sensors.
pub fn hardware_sensors(config: &IncubatorConfig) -> AppResult<SensorSet> {
    let o2 = SerialGasSensor::new(GasChannel::O2.as_str(), serial_config(config, GasChannel::O2)?);
    let co2 = SerialGasSensor::new(
        GasChannel::Co2.as_str(),
        serial_config(config, GasChannel::Co2)?,
    );
    Ok(SensorSet {
        temperature: Box::new(OneWireTemperature::new(&config.onewire.devices_dir)),
        o2: Box::new(o2),
        co2: Box::new(co2),
    })
}

/// Step-profile sensors driven by `clock`.
pub fn simulated_sensors<C>(clock: C) -> AppResult<SensorSet>
where
    C: Clock + Clone + 'static,
{
    Ok(SensorSet {
        temperature: Box::new(ProfileSensor::new(
            "temperature",
            SIM_TEMPERATURE_PROFILE.to_vec(),
            clock.clone(),
        )?),
        o2: Box::new(ProfileSensor::new(
            GasChannel::O2.as_str(),
            SIM_O2_PROFILE.to_vec(),
            clock.clone(),
        )?),
        co2: Box::new(ProfileSensor::new(
            GasChannel::Co2.as_str(),
            SIM_CO2_PROFILE.to_vec(),
            clock,
        )?),
    })
}

/// Build a fresh cycle over already-claimed outputs.
pub fn build_cycle(
    config: &IncubatorConfig,
    outputs: &Outputs,
    sensors: SensorSet,
    clock: Box<dyn Clock>,
) -> AppResult<RegulationCycle> {
    let max_failures = config.sensors.max_failures;
    let heater = HeaterRegulator::new(config.heater_config(), outputs.heaters.clone())?;
    let gas = |channel: GasChannel| {
        GasRegulator::new(
            channel.as_str(),
            config.gas_config(channel),
            outputs.gas(channel).clone(),
        )
    };
    let o2 = gas(GasChannel::O2)?;
    let co2 = gas(GasChannel::Co2)?;

    Ok(RegulationCycle::new(CycleParts {
        temperature: FaultTolerantSensor::new(sensors.temperature, max_failures),
        o2_sensor: FaultTolerantSensor::new(sensors.o2, max_failures),
        co2_sensor: FaultTolerantSensor::new(sensors.co2, max_failures),
        heater,
        o2,
        co2,
        clock,
    }))
}
