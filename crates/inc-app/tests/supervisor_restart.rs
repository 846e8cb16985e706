//! Integration test: supervised run loop over simulated hardware.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use inc_app::{AppError, Outputs, RunOptions, build_cycle, run_supervised, simulated_sensors};
use inc_controls::{SharedActuator, SimulatedOutput};
use inc_core::ManualClock;
use inc_project::IncubatorConfig;

fn config() -> IncubatorConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/incubator.yaml");
    inc_project::load_yaml(&path).unwrap()
}

struct Rig {
    config: IncubatorConfig,
    outputs: Outputs,
    heater: Arc<SimulatedOutput>,
    o2_valve: Arc<SimulatedOutput>,
    all: Vec<Arc<SimulatedOutput>>,
}

fn rig() -> Rig {
    let config = config();
    let all: Vec<_> = config
        .all_pins()
        .iter()
        .map(|pin| SimulatedOutput::shared(format!("out-{pin}")))
        .collect();
    let n = config.gpio.heaters.len();
    let outputs = Outputs {
        heaters: all[..n].iter().map(|o| o.clone() as SharedActuator).collect(),
        o2: all[n].clone(),
        co2: all[n + 1].clone(),
    };
    Rig {
        heater: all[0].clone(),
        o2_valve: all[n].clone(),
        config,
        outputs,
        all,
    }
}

fn fast(max_ticks: Option<u64>) -> RunOptions {
    RunOptions {
        read_interval: Duration::ZERO,
        restart_backoff: Duration::ZERO,
        max_ticks,
    }
}

#[test]
fn options_follow_config() {
    let options = RunOptions::from_config(&config()).unwrap();
    assert_eq!(options.read_interval, Duration::from_millis(500));
    assert_eq!(options.restart_backoff, Duration::from_secs(5));
    assert_eq!(options.max_ticks, None);
}

#[test]
fn runs_requested_ticks_then_turns_everything_off() {
    let rig = rig();
    let stop = rig.outputs.emergency_stop();
    let shutdown = AtomicBool::new(false);
    let mut seen = Vec::new();

    let summary = run_supervised(
        || {
            let clock = ManualClock::new(0.0);
            let sensors = simulated_sensors(clock.clone())?;
            build_cycle(&rig.config, &rig.outputs, sensors, Box::new(clock))
        },
        &stop,
        &fast(Some(4)),
        &shutdown,
        |snap| seen.push(snap.clone()),
    );

    assert_eq!(summary.ticks, 4);
    assert_eq!(summary.restarts, 0);
    assert_eq!(seen.len(), 4);
    // Simulated O2 starts at 20%: continuous purge holds CO2 off
    assert!(seen.iter().all(|s| s.o2_valve_open && !s.co2_valve_open));
    assert!(rig.all.iter().all(|o| !o.is_on()));
}

#[test]
fn actuator_fault_restarts_with_fresh_cycle() {
    let rig = rig();
    let stop = rig.outputs.emergency_stop();
    let shutdown = AtomicBool::new(false);
    let mut builds = 0;

    let summary = run_supervised(
        || {
            builds += 1;
            // First attempt runs into a dead heater relay
            rig.heater.fail_writes(builds == 1);
            let clock = ManualClock::new(0.0);
            let sensors = simulated_sensors(clock.clone())?;
            build_cycle(&rig.config, &rig.outputs, sensors, Box::new(clock))
        },
        &stop,
        &fast(Some(3)),
        &shutdown,
        |_| {},
    );

    assert_eq!(builds, 2);
    assert_eq!(summary.restarts, 1);
    assert_eq!(summary.ticks, 3);
    assert!(summary.last_error.unwrap().contains("out-5"));
    assert!(rig.all.iter().all(|o| !o.is_on()));
}

#[test]
fn build_failure_is_retried() {
    let rig = rig();
    let stop = rig.outputs.emergency_stop();
    let shutdown = AtomicBool::new(false);
    let mut builds = 0;

    let summary = run_supervised(
        || {
            builds += 1;
            if builds < 3 {
                return Err(AppError::Sensor("port busy".to_string()));
            }
            let clock = ManualClock::new(0.0);
            let sensors = simulated_sensors(clock.clone())?;
            build_cycle(&rig.config, &rig.outputs, sensors, Box::new(clock))
        },
        &stop,
        &fast(Some(1)),
        &shutdown,
        |_| {},
    );

    assert_eq!(summary.restarts, 2);
    assert_eq!(summary.ticks, 1);
}

#[test]
fn shutdown_flag_ends_the_run() {
    let rig = rig();
    let stop = rig.outputs.emergency_stop();
    let shutdown = AtomicBool::new(false);
    let mut ticks = 0;

    let summary = run_supervised(
        || {
            let clock = ManualClock::new(0.0);
            let sensors = simulated_sensors(clock.clone())?;
            build_cycle(&rig.config, &rig.outputs, sensors, Box::new(clock))
        },
        &stop,
        &fast(None),
        &shutdown,
        |_| {
            ticks += 1;
            if ticks == 2 {
                shutdown.store(true, Ordering::SeqCst);
            }
        },
    );

    assert_eq!(summary.ticks, 2);
    assert!(!rig.o2_valve.is_on());
}

#[test]
fn panic_in_cycle_forces_outputs_off_and_restarts() {
    let rig = rig();
    let stop = rig.outputs.emergency_stop();
    let shutdown = AtomicBool::new(false);
    let mut builds = 0;
    let mut snapshots = 0;

    let summary = run_supervised(
        || {
            builds += 1;
            if builds == 2 {
                // Everything was forced off before the rebuild
                assert!(rig.all.iter().all(|o| !o.is_on()));
            }
            let clock = ManualClock::new(0.0);
            let sensors = simulated_sensors(clock.clone())?;
            build_cycle(&rig.config, &rig.outputs, sensors, Box::new(clock))
        },
        &stop,
        &fast(Some(3)),
        &shutdown,
        |_| {
            snapshots += 1;
            if snapshots == 1 {
                // Cold chamber and high O2: heater and purge valve are on
                assert!(rig.heater.is_on() && rig.o2_valve.is_on());
                panic!("display driver crashed");
            }
        },
    );

    assert_eq!(builds, 2);
    assert_eq!(summary.restarts, 1);
    assert_eq!(summary.ticks, 3);
    assert!(summary.last_error.unwrap().contains("display driver crashed"));
    assert!(rig.all.iter().all(|o| !o.is_on()));
}

#[test]
fn unrepresentable_read_interval_does_not_overflow() {
    let rig = rig();
    let stop = rig.outputs.emergency_stop();
    let shutdown = AtomicBool::new(false);
    let options = RunOptions {
        read_interval: Duration::MAX,
        restart_backoff: Duration::ZERO,
        max_ticks: None,
    };

    let summary = run_supervised(
        || {
            let clock = ManualClock::new(0.0);
            let sensors = simulated_sensors(clock.clone())?;
            build_cycle(&rig.config, &rig.outputs, sensors, Box::new(clock))
        },
        &stop,
        &options,
        &shutdown,
        |_| shutdown.store(true, Ordering::SeqCst),
    );

    assert_eq!(summary.ticks, 1);
    assert_eq!(summary.restarts, 0);
    assert!(rig.all.iter().all(|o| !o.is_on()));
}
