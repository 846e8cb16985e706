//! Bounded-retry wrapper around a [`SensorChannel`].
//!
//! A read failure (an error, a reading of exactly `0.0`, or a non-finite
//! reading) returns the last good value instead. After `max_failures`
//! consecutive failures the channel is reinitialized once and the counter
//! starts over, whether or not the reinit worked. A wedged device therefore
//! costs at most one reinit attempt per `max_failures` ticks.
//!
//! Treating `0.0` as a failure means a genuine zero reading is
//! indistinguishable from a dead sensor. Gas readings of exactly zero do not
//! occur inside a sealed incubator, and serial sensors report zero when they
//! have not finished warming up, so the ambiguity is kept.

use tracing::{error, info, warn};

use inc_core::ensure_finite;

use crate::channel::SensorChannel;
use crate::error::{SensorError, SensorResult};

/// Failure bookkeeping for one sensor.
///
/// `consecutive_failures < max_failures` holds whenever `read` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorHealth {
    pub consecutive_failures: u32,
    pub max_failures: u32,
    pub last_good_value: f64,
}

/// Never-failing read access to a possibly flaky channel.
pub struct FaultTolerantSensor<S> {
    channel: S,
    health: SensorHealth,
    reinit_attempts: u64,
    last_read_fresh: bool,
    has_reading: bool,
}

impl<S: SensorChannel> FaultTolerantSensor<S> {
    /// Wrap `channel`. A `max_failures` of zero is treated as one.
    pub fn new(channel: S, max_failures: u32) -> Self {
        Self {
            channel,
            health: SensorHealth {
                consecutive_failures: 0,
                max_failures: max_failures.max(1),
                last_good_value: 0.0,
            },
            reinit_attempts: 0,
            last_read_fresh: false,
            has_reading: false,
        }
    }

    /// Read the channel, falling back to the last good value on failure.
    pub fn read(&mut self) -> f64 {
        match self.channel.read().and_then(|v| self.check(v)) {
            Ok(value) => {
                self.health.consecutive_failures = 0;
                self.health.last_good_value = value;
                self.last_read_fresh = true;
                self.has_reading = true;
                value
            }
            Err(err) => {
                self.last_read_fresh = false;
                self.record_failure(&err);
                self.health.last_good_value
            }
        }
    }

    fn check(&self, value: f64) -> SensorResult<f64> {
        let value = ensure_finite(value, "sensor reading").map_err(|_| SensorError::NonFinite {
            device: self.channel.name().to_string(),
            value,
        })?;
        if value == 0.0 {
            return Err(SensorError::ZeroReading {
                device: self.channel.name().to_string(),
            });
        }
        Ok(value)
    }

    fn record_failure(&mut self, err: &SensorError) {
        self.health.consecutive_failures += 1;
        warn!(
            sensor = self.channel.name(),
            failures = self.health.consecutive_failures,
            max_failures = self.health.max_failures,
            error = %err,
            "read failed, holding last good value"
        );

        if self.health.consecutive_failures >= self.health.max_failures {
            error!(
                sensor = self.channel.name(),
                "max failures reached, reinitializing sensor"
            );
            self.reinit_attempts += 1;
            match self.channel.reinitialize() {
                Ok(()) => info!(sensor = self.channel.name(), "sensor reinitialized"),
                Err(reinit_err) => error!(
                    sensor = self.channel.name(),
                    error = %reinit_err,
                    "sensor reinitialization failed"
                ),
            }
            self.health.consecutive_failures = 0;
        }
    }

    pub fn health(&self) -> &SensorHealth {
        &self.health
    }

    /// Whether the most recent `read` returned a fresh value.
    pub fn last_read_fresh(&self) -> bool {
        self.last_read_fresh
    }

    /// Whether any read has succeeded yet. Until then `read` returns the
    /// `0.0` placeholder, which is not a measurement.
    pub fn has_reading(&self) -> bool {
        self.has_reading
    }

    /// Number of reinitialization attempts so far.
    pub fn reinit_attempts(&self) -> u64 {
        self.reinit_attempts
    }

    pub fn name(&self) -> &str {
        self.channel.name()
    }

    pub fn channel(&self) -> &S {
        &self.channel
    }

}
