//! Supervised regulation loop.
//!
//! Each attempt builds a fresh [`RegulationCycle`] and ticks it every
//! `read_interval`. A tick error or a panic forces every output off, is
//! logged, and after `restart_backoff` the cycle is rebuilt from scratch; no
//! regulator or sensor state survives a restart. Outputs are also forced off
//! if the loop itself unwinds.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};

use inc_project::IncubatorConfig;

use crate::cycle::{RegulationCycle, Snapshot};
use crate::error::{AppError, AppResult};
use crate::shutdown::EmergencyStop;

/// Longest uninterrupted sleep before the shutdown flag is checked again.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub read_interval: Duration,
    pub restart_backoff: Duration,
    /// Stop after this many successful ticks in total.
    pub max_ticks: Option<u64>,
}

impl RunOptions {
    pub fn from_config(config: &IncubatorConfig) -> AppResult<Self> {
        let secs = |field: &str, v: f64| {
            Duration::try_from_secs_f64(v)
                .map_err(|e| AppError::InvalidInput(format!("{field} = {v}: {e}")))
        };
        Ok(Self {
            read_interval: secs("read_interval_s", config.read_interval_s)?,
            restart_backoff: secs("restart_backoff_s", config.restart_backoff_s)?,
            max_ticks: None,
        })
    }
}

/// What a supervised run did before it returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub restarts: u32,
    pub last_error: Option<String>,
}

/// Run cycles until `shutdown` is raised or `max_ticks` is reached.
///
/// `build` is called for every attempt; a build failure is handled like a
/// tick failure. `stop` must cover every output any built cycle drives. All
/// outputs are off when this returns.
pub fn run_supervised<B, S>(
    mut build: B,
    stop: &EmergencyStop,
    options: &RunOptions,
    shutdown: &AtomicBool,
    mut on_snapshot: S,
) -> RunSummary
where
    B: FnMut() -> AppResult<RegulationCycle>,
    S: FnMut(&Snapshot),
{
    let _guard = StopOnDrop(stop);
    let mut summary = RunSummary::default();

    while !shutdown.load(Ordering::SeqCst) && !limit_reached(&summary, options) {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            build().and_then(|mut cycle| {
                info!(attempt = summary.restarts + 1, "regulation cycle started");
                run_cycle(&mut cycle, options, shutdown, &mut summary, &mut on_snapshot)
            })
        }))
        .unwrap_or_else(|payload| Err(AppError::Panicked(panic_message(payload.as_ref()))));

        match attempt {
            Ok(()) => break,
            Err(err) => {
                stop.trigger();
                error!(
                    error = %err,
                    actuator_fault = err.is_actuator_fault(),
                    backoff_s = options.restart_backoff.as_secs_f64(),
                    "regulation cycle failed, outputs forced off"
                );
                summary.restarts += 1;
                summary.last_error = Some(err.to_string());
                sleep_unless_shutdown(options.restart_backoff, shutdown);
            }
        }
    }

    info!(ticks = summary.ticks, restarts = summary.restarts, "regulation stopped");
    // Guard drop forces everything off on the way out
    summary
}

fn run_cycle<S>(
    cycle: &mut RegulationCycle,
    options: &RunOptions,
    shutdown: &AtomicBool,
    summary: &mut RunSummary,
    on_snapshot: &mut S,
) -> AppResult<()>
where
    S: FnMut(&Snapshot),
{
    loop {
        if shutdown.load(Ordering::SeqCst) || limit_reached(summary, options) {
            return Ok(());
        }
        let snapshot = cycle.tick()?;
        summary.ticks += 1;
        on_snapshot(&snapshot);
        sleep_unless_shutdown(options.read_interval, shutdown);
    }
}

/// Forces every output off when dropped, including during unwinding.
struct StopOnDrop<'a>(&'a EmergencyStop);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.trigger();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn limit_reached(summary: &RunSummary, options: &RunOptions) -> bool {
    options.max_ticks.is_some_and(|max| summary.ticks >= max)
}

fn sleep_unless_shutdown(duration: Duration, shutdown: &AtomicBool) {
    // Too far out to represent: sleep until shutdown
    let deadline = Instant::now().checked_add(duration);
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let left = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => SHUTDOWN_POLL,
        };
        if left.is_zero() {
            return;
        }
        thread::sleep(left.min(SHUTDOWN_POLL));
    }
}
