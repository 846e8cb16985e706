use std::path::Path;

use inc_project::{from_yaml_str, load_yaml, save_yaml};

#[test]
fn shipped_config_loads_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/incubator.yaml");
    let config = load_yaml(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e));

    assert_eq!(config.gpio.heaters, vec![5, 6, 13, 19, 26, 27]);
    assert_eq!(config.all_pins(), vec![5, 6, 13, 19, 26, 27, 20, 21]);
}

#[test]
fn minimal_config_takes_defaults() {
    let yaml = r#"
read_interval: 1.0
gpio: { heaters: [5], o2_pin: 20, co2_pin: 21 }
serial:
  o2: { port: /dev/ttyUSB0, cmd: "%", scale: 0.001 }
  co2: { port: /dev/ttyUSB1, cmd: "Z", scale: 0.001 }
heater:
  setpoint: 37.0
  threshold: 0.98
  pid: { Kp: 1.0, Ki: 0.0, Kd: 0.0 }
o2:
  setpoint: 2.0
  invert: true
  thresholds: { continuous: 1.5, pulse: 1.1, stop: 0.9 }
co2:
  setpoint: 5.0
  thresholds: { continuous: 0.75, pulse: 0.9, stop: 1.1 }
"#;
    let config = from_yaml_str(yaml).unwrap();
    assert_eq!(config.read_interval_s, 1.0);
    assert_eq!(config.restart_backoff_s, 5.0);
    assert_eq!(config.serial.baud, 9600);
    assert_eq!(config.sensors.max_failures, 3);
    assert_eq!(config.heater.pid.kp, 1.0);
    assert_eq!(config.co2.timing.settle_s, 6.0);
    assert_eq!(config.onewire.devices_dir, Path::new("/sys/bus/w1/devices"));
}

#[test]
fn roundtrip_yaml() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/incubator.yaml");
    let config = load_yaml(&path).unwrap();

    let out = std::env::temp_dir().join(format!("inc_project_roundtrip_{}.yaml", std::process::id()));
    save_yaml(&out, &config).unwrap();
    let loaded = load_yaml(&out).unwrap();
    assert_eq!(config, loaded);
    let _ = std::fs::remove_file(&out);
}
