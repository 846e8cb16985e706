//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use inc_controls::{HeaterConfig, PidGains, RegulatorConfig};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncubatorConfig {
    /// Sleep between regulation ticks (seconds).
    #[serde(alias = "read_interval")]
    pub read_interval_s: f64,
    /// Delay before the supervisor rebuilds a failed cycle (seconds).
    #[serde(default = "default_restart_backoff_s")]
    pub restart_backoff_s: f64,
    pub gpio: GpioDef,
    pub serial: SerialDef,
    #[serde(default)]
    pub onewire: OneWireDef,
    #[serde(default)]
    pub sensors: SensorsDef,
    pub heater: HeaterDef,
    pub o2: GasChannelDef,
    pub co2: GasChannelDef,
}

/// BCM pin numbers of every output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpioDef {
    pub heaters: Vec<u8>,
    pub o2_pin: u8,
    pub co2_pin: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialDef {
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_serial_timeout_s")]
    pub timeout_s: f64,
    #[serde(default = "default_open_settle_s")]
    pub open_settle_s: f64,
    pub o2: SerialPortDef,
    pub co2: SerialPortDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialPortDef {
    pub port: PathBuf,
    pub cmd: String,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneWireDef {
    #[serde(default = "default_devices_dir")]
    pub devices_dir: PathBuf,
}

impl Default for OneWireDef {
    fn default() -> Self {
        Self {
            devices_dir: default_devices_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorsDef {
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

impl Default for SensorsDef {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaterDef {
    pub setpoint: f64,
    pub threshold: f64,
    pub pid: PidDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PidDef {
    #[serde(alias = "Kp")]
    pub kp: f64,
    #[serde(alias = "Ki")]
    pub ki: f64,
    #[serde(alias = "Kd")]
    pub kd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GasChannelDef {
    pub setpoint: f64,
    #[serde(default)]
    pub invert: bool,
    pub thresholds: ThresholdsDef,
    #[serde(default)]
    pub timing: GasTimingDef,
}

/// Fractions of setpoint. All three keys are required.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdsDef {
    pub continuous: f64,
    pub pulse: f64,
    pub stop: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GasTimingDef {
    pub pulse_on_s: f64,
    pub settle_s: f64,
    pub startup_soft_s: f64,
    pub startup_pulse_on_s: f64,
    pub startup_settle_s: f64,
    /// Units per second.
    pub rise_suppression: f64,
}

impl Default for GasTimingDef {
    fn default() -> Self {
        Self {
            pulse_on_s: 0.1,
            settle_s: 6.0,
            startup_soft_s: 300.0,
            startup_pulse_on_s: 0.05,
            startup_settle_s: 12.0,
            rise_suppression: 0.2,
        }
    }
}

/// The two regulated gas channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasChannel {
    O2,
    Co2,
}

impl GasChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GasChannel::O2 => "o2",
            GasChannel::Co2 => "co2",
        }
    }
}

impl std::fmt::Display for GasChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IncubatorConfig {
    pub fn heater_config(&self) -> HeaterConfig {
        let pid = self.heater.pid;
        HeaterConfig {
            setpoint: self.heater.setpoint,
            threshold: self.heater.threshold,
            pid: PidGains {
                kp: pid.kp,
                ki: pid.ki,
                kd: pid.kd,
            },
            output_limits: (0.0, 1.0),
        }
    }

    pub fn channel(&self, channel: GasChannel) -> &GasChannelDef {
        match channel {
            GasChannel::O2 => &self.o2,
            GasChannel::Co2 => &self.co2,
        }
    }

    pub fn gas_config(&self, channel: GasChannel) -> RegulatorConfig {
        let def = self.channel(channel);
        RegulatorConfig {
            setpoint: def.setpoint,
            invert: def.invert,
            th_continuous: def.thresholds.continuous,
            th_pulse: def.thresholds.pulse,
            th_stop: def.thresholds.stop,
            pulse_on_s: def.timing.pulse_on_s,
            settle_s: def.timing.settle_s,
            startup_soft_secs: def.timing.startup_soft_s,
            startup_pulse_on_s: def.timing.startup_pulse_on_s,
            startup_settle_s: def.timing.startup_settle_s,
            rise_suppression: def.timing.rise_suppression,
        }
    }

    pub fn serial_port(&self, channel: GasChannel) -> &SerialPortDef {
        match channel {
            GasChannel::O2 => &self.serial.o2,
            GasChannel::Co2 => &self.serial.co2,
        }
    }

    /// Every configured output pin: heaters first, then O2, then CO2.
    pub fn all_pins(&self) -> Vec<u8> {
        let mut pins = self.gpio.heaters.clone();
        pins.push(self.gpio.o2_pin);
        pins.push(self.gpio.co2_pin);
        pins
    }
}

fn default_restart_backoff_s() -> f64 {
    5.0
}

fn default_baud() -> u32 {
    9600
}

fn default_serial_timeout_s() -> f64 {
    1.0
}

fn default_open_settle_s() -> f64 {
    0.5
}

fn default_devices_dir() -> PathBuf {
    PathBuf::from("/sys/bus/w1/devices")
}

fn default_max_failures() -> u32 {
    3
}
