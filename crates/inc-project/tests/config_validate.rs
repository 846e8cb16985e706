use std::path::PathBuf;

use inc_project::schema::*;
use inc_project::{ProjectError, ValidationError, from_yaml_str, validate_config};

fn base_config() -> IncubatorConfig {
    IncubatorConfig {
        read_interval_s: 0.5,
        restart_backoff_s: 5.0,
        gpio: GpioDef {
            heaters: vec![5, 6, 13],
            o2_pin: 20,
            co2_pin: 21,
        },
        serial: SerialDef {
            baud: 9600,
            timeout_s: 1.0,
            open_settle_s: 0.5,
            o2: SerialPortDef {
                port: PathBuf::from("/dev/ttyUSB0"),
                cmd: "%".to_string(),
                scale: 0.001,
            },
            co2: SerialPortDef {
                port: PathBuf::from("/dev/ttyUSB1"),
                cmd: "Z".to_string(),
                scale: 0.001,
            },
        },
        onewire: OneWireDef::default(),
        sensors: SensorsDef::default(),
        heater: HeaterDef {
            setpoint: 37.0,
            threshold: 0.98,
            pid: PidDef {
                kp: 0.8,
                ki: 0.02,
                kd: 0.5,
            },
        },
        o2: GasChannelDef {
            setpoint: 2.0,
            invert: true,
            thresholds: ThresholdsDef {
                continuous: 1.5,
                pulse: 1.1,
                stop: 0.9,
            },
            timing: GasTimingDef::default(),
        },
        co2: GasChannelDef {
            setpoint: 5.0,
            invert: false,
            thresholds: ThresholdsDef {
                continuous: 0.75,
                pulse: 0.9,
                stop: 1.1,
            },
            timing: GasTimingDef::default(),
        },
    }
}

fn invalid_field(config: &IncubatorConfig) -> String {
    match validate_config(config) {
        Err(ValidationError::InvalidValue { field, .. }) => field,
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn base_config_is_valid() {
    validate_config(&base_config()).unwrap();
}

#[test]
fn rejects_non_positive_setpoint() {
    let mut config = base_config();
    config.co2.setpoint = 0.0;
    assert_eq!(invalid_field(&config), "co2.setpoint");

    let mut config = base_config();
    config.heater.setpoint = f64::NAN;
    assert_eq!(invalid_field(&config), "heater.setpoint");
}

#[test]
fn rejects_misordered_injected_thresholds() {
    let mut config = base_config();
    config.co2.thresholds.pulse = 0.7;
    assert_eq!(invalid_field(&config), "co2.thresholds");
}

#[test]
fn rejects_misordered_inverted_thresholds() {
    let mut config = base_config();
    config.o2.thresholds = ThresholdsDef {
        continuous: 0.9,
        pulse: 1.1,
        stop: 1.5,
    };
    assert_eq!(invalid_field(&config), "o2.thresholds");
}

#[test]
fn rejects_wrong_channel_direction() {
    let mut config = base_config();
    config.o2.invert = false;
    assert_eq!(invalid_field(&config), "o2.invert");
}

#[test]
fn rejects_negative_timing() {
    let mut config = base_config();
    config.o2.timing.settle_s = -1.0;
    assert_eq!(invalid_field(&config), "o2.timing.settle_s");
}

#[test]
fn rejects_zero_read_interval() {
    let mut config = base_config();
    config.read_interval_s = 0.0;
    assert_eq!(invalid_field(&config), "read_interval_s");
}

#[test]
fn rejects_unbounded_delays() {
    let mut config = base_config();
    config.read_interval_s = 1e19;
    assert_eq!(invalid_field(&config), "read_interval_s");

    let mut config = base_config();
    config.restart_backoff_s = 1e19;
    assert_eq!(invalid_field(&config), "restart_backoff_s");

    let mut config = base_config();
    config.serial.timeout_s = 1e19;
    assert_eq!(invalid_field(&config), "serial.timeout_s");

    let mut config = base_config();
    config.read_interval_s = 3600.0;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn rejects_zero_max_failures() {
    let mut config = base_config();
    config.sensors.max_failures = 0;
    assert_eq!(invalid_field(&config), "sensors.max_failures");
}

#[test]
fn rejects_empty_heater_bank() {
    let mut config = base_config();
    config.gpio.heaters.clear();
    assert_eq!(invalid_field(&config), "gpio.heaters");
}

#[test]
fn rejects_shared_pin() {
    let mut config = base_config();
    config.gpio.co2_pin = 13;
    assert!(matches!(
        validate_config(&config),
        Err(ValidationError::DuplicateId { id, .. }) if id == "13"
    ));
}

#[test]
fn rejects_shared_serial_port() {
    let mut config = base_config();
    config.serial.co2.port = config.serial.o2.port.clone();
    assert!(matches!(
        validate_config(&config),
        Err(ValidationError::DuplicateId { .. })
    ));
}

#[test]
fn missing_threshold_key_is_a_parse_error() {
    let yaml = serde_yaml::to_string(&base_config())
        .unwrap()
        .replace("    stop: 1.1\n", "");
    assert!(matches!(from_yaml_str(&yaml), Err(ProjectError::Yaml(_))));
}

#[test]
fn converts_to_regulator_configs() {
    let config = base_config();

    let heater = config.heater_config();
    assert_eq!(heater.setpoint, 37.0);
    assert_eq!(heater.output_limits, (0.0, 1.0));
    assert_eq!(heater.pid.kd, 0.5);

    let o2 = config.gas_config(GasChannel::O2);
    assert!(o2.invert);
    assert_eq!(o2.th_continuous, 1.5);
    assert_eq!(o2.startup_soft_secs, 300.0);
    o2.validate().unwrap();

    let co2 = config.gas_config(GasChannel::Co2);
    assert!(!co2.invert);
    assert_eq!(co2.th_stop, 1.1);
    co2.validate().unwrap();
}
