//! Property tests for the regulators.

use std::sync::Arc;

use inc_controls::{
    GasRegulator, HeaterConfig, HeaterRegulator, PidGains, RegulatorConfig, SharedActuator,
    SimulatedOutput,
};
use proptest::prelude::*;

fn co2_config() -> RegulatorConfig {
    RegulatorConfig {
        setpoint: 5.0,
        invert: false,
        th_continuous: 0.75,
        th_pulse: 0.9,
        th_stop: 1.1,
        pulse_on_s: 0.1,
        settle_s: 6.0,
        startup_soft_secs: 20.0,
        startup_pulse_on_s: 0.05,
        startup_settle_s: 10.0,
        rise_suppression: 0.2,
    }
}

proptest! {
    #[test]
    fn continuous_reading_always_opens_valve(
        history in prop::collection::vec(0.0f64..8.0, 0..40),
        low in 0.0f64..3.74,
    ) {
        let valve = SimulatedOutput::shared("co2");
        let mut reg = GasRegulator::new("co2", co2_config(), valve.clone()).unwrap();
        let mut t = 0.0;
        for v in history {
            t += 0.5;
            reg.update(v, t).unwrap();
        }
        t += 0.5;
        reg.update(low, t).unwrap();
        prop_assert!(valve.is_on());
        prop_assert!(reg.is_valve_open());
    }

    #[test]
    fn pulses_respect_refractory_window(
        readings in prop::collection::vec(3.8f64..4.6, 1..200),
    ) {
        let config = co2_config();
        let valve = SimulatedOutput::shared("co2");
        let mut reg = GasRegulator::new("co2", config.clone(), valve.clone()).unwrap();
        let mut t = 0.0;
        for v in readings {
            t += 0.5;
            let before = reg.state().clone();
            reg.update(v, t).unwrap();
            let after = reg.state();

            // Started-pulse marker only while the valve is open
            prop_assert!(after.pulse_started_s.is_none() || after.valve_on);
            prop_assert_eq!(after.valve_on, valve.is_on());

            if before.pulse_started_s.is_none() && after.pulse_started_s.is_some() {
                prop_assert!(t - before.last_pulse_end_s >= config.settle_at(t));
            }
            if let (Some(started), false) = (before.pulse_started_s, after.valve_on) {
                // Closed in-band with no suppression: the full pulse elapsed
                let not_rising = v <= before.last_value.unwrap_or(v);
                if reg.in_pulse_band(v) && after.last_pulse_end_s == t && not_rising {
                    prop_assert!(t - started >= config.pulse_on_at(t));
                }
            }
        }
    }

    #[test]
    fn heater_duty_stays_in_unit_interval(
        kp in -1e6f64..1e6,
        ki in -1e6f64..1e6,
        kd in -1e6f64..1e6,
        temps in prop::collection::vec(-1e6f64..1e6, 1..50),
    ) {
        let config = HeaterConfig {
            setpoint: 37.0,
            threshold: 0.98,
            pid: PidGains { kp, ki, kd },
            output_limits: (0.0, 1.0),
        };
        let out = SimulatedOutput::shared("heater");
        let pins: Vec<SharedActuator> = vec![out.clone() as SharedActuator];
        let mut heater = HeaterRegulator::new(config, pins).unwrap();
        let mut t = 0.0;
        for temp in temps {
            t += 0.5;
            let output = heater.update(temp, t).unwrap();
            prop_assert!((0.0..=1.0).contains(&output.duty));
            prop_assert_eq!(output.on, out.is_on());
        }
    }

    #[test]
    fn force_off_never_resumes_a_pulse(
        readings in prop::collection::vec(3.8f64..4.49, 1..60),
        stops in prop::collection::vec(any::<bool>(), 60),
    ) {
        let valve = SimulatedOutput::shared("co2");
        let mut reg = GasRegulator::new("co2", co2_config(), valve.clone()).unwrap();
        let mut t = 0.0;
        for (v, stop) in readings.into_iter().zip(stops) {
            t += 0.5;
            if stop {
                reg.force_off().unwrap();
                reg.force_off().unwrap();
                prop_assert!(!valve.is_on());
                prop_assert!(reg.state().pulse_started_s.is_none());
            } else {
                let before = reg.state().clone();
                reg.update(v, t).unwrap();
                if before.pulse_started_s.is_none() && reg.state().pulse_started_s.is_some() {
                    prop_assert!(t - before.last_pulse_end_s >= co2_config().settle_at(t));
                }
            }
        }
    }
}

#[test]
fn shared_outputs_see_heater_writes() {
    let a = SimulatedOutput::shared("a");
    let b = SimulatedOutput::shared("b");
    let pins: Vec<SharedActuator> = vec![a.clone() as SharedActuator, b.clone()];
    let config = HeaterConfig {
        setpoint: 37.0,
        threshold: 0.98,
        pid: PidGains {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
        },
        output_limits: (0.0, 1.0),
    };
    let mut heater = HeaterRegulator::new(config, pins).unwrap();
    heater.update(20.0, 0.2).unwrap();
    assert!(a.is_on() && b.is_on());
    assert_eq!(Arc::strong_count(&a), 2);
}
