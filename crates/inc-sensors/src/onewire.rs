//! DS18B20 probes on the Linux 1-wire bus.
//!
//! The kernel `w1_therm` driver exposes each probe as
//! `<devices_dir>/28-xxxxxxxxxxxx/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The reported temperature is the mean of every probe that read cleanly.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::channel::SensorChannel;
use crate::error::{SensorError, SensorResult};

pub const DEFAULT_W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

/// DS18B20 family code prefix.
const DS18B20_PREFIX: &str = "28-";

/// Aggregate of every DS18B20 probe found on the bus.
pub struct OneWireTemperature {
    name: String,
    devices_dir: PathBuf,
    probes: Vec<PathBuf>,
}

impl OneWireTemperature {
    /// Discover probes under `devices_dir`. A failed discovery leaves the
    /// channel with no probes; reads fail until a reinit finds some.
    pub fn new(devices_dir: impl Into<PathBuf>) -> Self {
        let devices_dir = devices_dir.into();
        let probes = match discover_probes(&devices_dir) {
            Ok(probes) => probes,
            Err(err) => {
                warn!(error = %err, "1-wire probe discovery failed");
                Vec::new()
            }
        };
        if probes.is_empty() {
            warn!(dir = %devices_dir.display(), "no DS18B20 probes found");
        } else {
            info!(count = probes.len(), "1-wire probes discovered");
        }
        Self {
            name: "temperature".to_string(),
            devices_dir,
            probes,
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }
}

impl SensorChannel for OneWireTemperature {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> SensorResult<f64> {
        if self.probes.is_empty() {
            return Err(SensorError::NoProbes);
        }
        let mut sum = 0.0;
        let mut ok = 0usize;
        for probe in &self.probes {
            match read_probe(probe) {
                Ok(t) => {
                    sum += t;
                    ok += 1;
                }
                Err(err) => debug!(probe = %probe.display(), error = %err, "probe skipped"),
            }
        }
        if ok == 0 {
            return Err(SensorError::AllProbesFailed {
                count: self.probes.len(),
            });
        }
        Ok(sum / ok as f64)
    }

    fn reinitialize(&mut self) -> SensorResult<()> {
        self.probes = discover_probes(&self.devices_dir)?;
        info!(count = self.probes.len(), "1-wire probes rediscovered");
        Ok(())
    }
}

/// List `w1_slave` files of every DS18B20 under `dir`, sorted.
pub fn discover_probes(dir: &Path) -> SensorResult<Vec<PathBuf>> {
    let io_err = |source| SensorError::Io {
        device: dir.display().to_string(),
        source,
    };
    let mut probes = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(DS18B20_PREFIX)
        {
            probes.push(entry.path().join("w1_slave"));
        }
    }
    probes.sort();
    Ok(probes)
}

fn read_probe(path: &Path) -> SensorResult<f64> {
    let text = fs::read_to_string(path).map_err(|source| SensorError::Io {
        device: path.display().to_string(),
        source,
    })?;
    parse_w1_slave(&text).ok_or_else(|| SensorError::Malformed {
        device: path.display().to_string(),
        response: text.trim().to_string(),
    })
}

/// Parse `w1_slave` contents into °C. `None` on CRC failure or bad format.
pub fn parse_w1_slave(text: &str) -> Option<f64> {
    let mut lines = text.lines();
    let crc_line = lines.next()?;
    if !crc_line.trim_end().ends_with("YES") {
        return None;
    }
    let data_line = lines.next()?;
    let (_, millis) = data_line.rsplit_once("t=")?;
    let millis: i64 = millis.trim().parse().ok()?;
    Some(millis as f64 / 1000.0)
}
