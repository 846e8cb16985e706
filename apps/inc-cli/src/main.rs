use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inc_app::{
    AppError, AppResult, RegulationCycle, RunOptions, Snapshot, build_cycle, claim_gpio_outputs,
    force_gpio_off, hardware_sensors, run_supervised, simulated_outputs, simulated_sensors,
};
use inc_core::MonotonicClock;

#[derive(Parser)]
#[command(name = "incubator")]
#[command(about = "Incubator controller - temperature, O2 and CO2 regulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration YAML file
        config_path: PathBuf,
    },
    /// Run the regulation loop
    Run {
        /// Path to the configuration YAML file
        config_path: PathBuf,
        /// Use simulated sensors and outputs instead of hardware
        #[arg(long)]
        simulate: bool,
        /// Print one JSON snapshot per tick on stdout
        #[arg(long)]
        json: bool,
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Force every configured GPIO output low and exit
    Off {
        /// Path to the configuration YAML file
        config_path: PathBuf,
    },
}

fn main() -> AppResult<()> {
    // Logs go to stderr so `run --json` output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Run {
            config_path,
            simulate,
            json,
            ticks,
        } => cmd_run(&config_path, simulate, json, ticks),
        Commands::Off { config_path } => cmd_off(&config_path),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating config: {}", config_path.display());
    let config = inc_project::load_yaml(config_path)?;
    println!("✓ Config is valid");
    println!(
        "  heater: {:.1} °C on pins {:?}",
        config.heater.setpoint, config.gpio.heaters
    );
    println!(
        "  o2: {:.2} % on pin {} ({})",
        config.o2.setpoint,
        config.gpio.o2_pin,
        config.serial.o2.port.display()
    );
    println!(
        "  co2: {:.2} % on pin {} ({})",
        config.co2.setpoint,
        config.gpio.co2_pin,
        config.serial.co2.port.display()
    );
    Ok(())
}

fn cmd_run(config_path: &Path, simulate: bool, json: bool, ticks: Option<u64>) -> AppResult<()> {
    let config = inc_project::load_yaml(config_path)?;
    let mut options = RunOptions::from_config(&config)?;
    options.max_ticks = ticks;

    let outputs = if simulate {
        info!("simulation mode: no hardware is touched");
        simulated_outputs(&config)
    } else {
        claim_gpio_outputs(&config)?
    };
    let stop = outputs.emergency_stop();
    let shutdown = Arc::new(AtomicBool::new(false));

    {
        let stop = stop.clone();
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            warn!("termination signal received, forcing outputs off");
            stop.trigger();
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| AppError::InvalidInput(format!("cannot install signal handler: {e}")))?;
    }

    let build = || -> AppResult<RegulationCycle> {
        let clock = MonotonicClock::start();
        let sensors = if simulate {
            simulated_sensors(clock)?
        } else {
            hardware_sensors(&config)?
        };
        build_cycle(&config, &outputs, sensors, Box::new(clock))
    };

    let summary = run_supervised(build, &stop, &options, &shutdown, |snapshot| {
        if json {
            publish(snapshot);
        }
    });

    println!(
        "Stopped after {} ticks ({} restarts)",
        summary.ticks, summary.restarts
    );
    Ok(())
}

/// Write one snapshot as a JSON line. Failures never reach the loop.
fn publish(snapshot: &Snapshot) {
    let line = match serde_json::to_string(snapshot) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "snapshot serialization failed");
            return;
        }
    };
    let mut out = io::stdout().lock();
    if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
        warn!(error = %e, "snapshot publish failed");
    }
}

fn cmd_off(config_path: &Path) -> AppResult<()> {
    let config = inc_project::load_yaml(config_path)?;
    let count = force_gpio_off(&config)?;
    println!("✓ {count} GPIO outputs forced low");
    Ok(())
}
