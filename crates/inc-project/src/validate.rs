//! Configuration validation logic.
//!
//! A config that passes here constructs every regulator without error, so
//! the process refuses to start before any pin is claimed.

use std::collections::HashSet;

use crate::schema::{GasChannel, GasChannelDef, IncubatorConfig, SerialPortDef};

/// Upper bound for loop and I/O delays (seconds).
pub const MAX_DELAY_S: f64 = 3600.0;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub fn validate_config(config: &IncubatorConfig) -> Result<(), ValidationError> {
    positive("read_interval_s", config.read_interval_s)?;
    non_negative("restart_backoff_s", config.restart_backoff_s)?;
    at_most("read_interval_s", config.read_interval_s, MAX_DELAY_S)?;
    at_most("restart_backoff_s", config.restart_backoff_s, MAX_DELAY_S)?;

    if config.sensors.max_failures == 0 {
        return Err(ValidationError::InvalidValue {
            field: "sensors.max_failures".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if config.gpio.heaters.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "gpio.heaters".to_string(),
            value: "[]".to_string(),
            reason: "at least one heater pin is required".to_string(),
        });
    }
    let mut pins = HashSet::new();
    for pin in config.all_pins() {
        if !pins.insert(pin) {
            return Err(ValidationError::DuplicateId {
                id: pin.to_string(),
                context: "gpio pins".to_string(),
            });
        }
    }

    positive("serial.timeout_s", config.serial.timeout_s)?;
    non_negative("serial.open_settle_s", config.serial.open_settle_s)?;
    at_most("serial.timeout_s", config.serial.timeout_s, MAX_DELAY_S)?;
    at_most("serial.open_settle_s", config.serial.open_settle_s, MAX_DELAY_S)?;
    if config.serial.baud == 0 {
        return Err(ValidationError::InvalidValue {
            field: "serial.baud".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    validate_port(GasChannel::O2, &config.serial.o2)?;
    validate_port(GasChannel::Co2, &config.serial.co2)?;
    if config.serial.o2.port == config.serial.co2.port {
        return Err(ValidationError::DuplicateId {
            id: config.serial.o2.port.display().to_string(),
            context: "serial ports".to_string(),
        });
    }

    positive("heater.setpoint", config.heater.setpoint)?;
    let threshold = config.heater.threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ValidationError::InvalidValue {
            field: "heater.threshold".to_string(),
            value: threshold.to_string(),
            reason: "must be in (0, 1]".to_string(),
        });
    }
    let pid = config.heater.pid;
    for (field, gain) in [
        ("heater.pid.kp", pid.kp),
        ("heater.pid.ki", pid.ki),
        ("heater.pid.kd", pid.kd),
    ] {
        if !gain.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                value: gain.to_string(),
                reason: "must be finite".to_string(),
            });
        }
    }

    // O2 is displaced by purging, CO2 is injected
    validate_channel(GasChannel::O2, &config.o2, true)?;
    validate_channel(GasChannel::Co2, &config.co2, false)?;

    Ok(())
}

fn validate_port(channel: GasChannel, port: &SerialPortDef) -> Result<(), ValidationError> {
    if port.cmd.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: format!("serial.{channel}.cmd"),
            value: format!("{:?}", port.cmd),
            reason: "command must not be empty".to_string(),
        });
    }
    positive(&format!("serial.{channel}.scale"), port.scale)
}

fn validate_channel(
    channel: GasChannel,
    def: &GasChannelDef,
    expect_invert: bool,
) -> Result<(), ValidationError> {
    positive(&format!("{channel}.setpoint"), def.setpoint)?;

    if def.invert != expect_invert {
        return Err(ValidationError::InvalidValue {
            field: format!("{channel}.invert"),
            value: def.invert.to_string(),
            reason: format!(
                "{channel} channel must be {}",
                if expect_invert { "inverted" } else { "non-inverted" }
            ),
        });
    }

    let th = def.thresholds;
    for (name, value) in [("continuous", th.continuous), ("pulse", th.pulse), ("stop", th.stop)] {
        positive(&format!("{channel}.thresholds.{name}"), value)?;
    }
    let ordered = if def.invert {
        th.continuous > th.pulse && th.pulse > th.stop
    } else {
        th.continuous < th.pulse && th.pulse < th.stop
    };
    if !ordered {
        return Err(ValidationError::InvalidValue {
            field: format!("{channel}.thresholds"),
            value: format!("{}/{}/{}", th.continuous, th.pulse, th.stop),
            reason: if def.invert {
                "inverted channel needs continuous > pulse > stop".to_string()
            } else {
                "injected channel needs continuous < pulse < stop".to_string()
            },
        });
    }

    let t = def.timing;
    for (name, value) in [
        ("pulse_on_s", t.pulse_on_s),
        ("settle_s", t.settle_s),
        ("startup_soft_s", t.startup_soft_s),
        ("startup_pulse_on_s", t.startup_pulse_on_s),
        ("startup_settle_s", t.startup_settle_s),
        ("rise_suppression", t.rise_suppression),
    ] {
        non_negative(&format!("{channel}.timing.{name}"), value)?;
    }

    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }
    Ok(())
}

fn at_most(field: &str, value: f64, max: f64) -> Result<(), ValidationError> {
    if value > max {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("must be at most {max}"),
        });
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }
    Ok(())
}
