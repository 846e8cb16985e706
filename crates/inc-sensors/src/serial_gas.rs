//! Gas sensors polled over a serial port.
//!
//! The sensors speak a one-line ASCII protocol: the host sends a single
//! command (e.g. `Z\r\n` for CO2, `%\r\n` for O2) and the sensor answers with
//! a letter and a zero-padded integer, e.g. ` Z 00450`. The integer times a
//! configured scale is the gas percentage.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use rppal::uart::{Parity, Queue, Uart};
use tracing::{info, warn};

use crate::channel::SensorChannel;
use crate::error::{SensorError, SensorResult};

/// Longest response accepted before giving up on a line.
const MAX_LINE_BYTES: usize = 128;

/// Serial port settings for one gas sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialGasConfig {
    pub port: PathBuf,
    pub baud: u32,
    pub command: String,
    pub scale: f64,
    /// I/O timeout for one response.
    pub timeout: Duration,
    /// Delay after opening the port before the first command.
    pub open_settle: Duration,
}

impl SerialGasConfig {
    /// Command bytes as sent on the wire. A missing line terminator is added.
    pub fn command_bytes(&self) -> Vec<u8> {
        let mut bytes = self.command.as_bytes().to_vec();
        if !bytes.ends_with(b"\n") {
            bytes.extend_from_slice(b"\r\n");
        }
        bytes
    }
}

/// One gas sensor on its own UART.
pub struct SerialGasSensor {
    name: String,
    config: SerialGasConfig,
    uart: Option<Uart>,
}

impl SerialGasSensor {
    /// Open the port. A port that cannot be opened yet is left closed, and
    /// reads fail until a reinit opens it.
    pub fn new(name: impl Into<String>, config: SerialGasConfig) -> Self {
        let name = name.into();
        let uart = match open_port(&config) {
            Ok(uart) => Some(uart),
            Err(err) => {
                warn!(sensor = %name, error = %err, "serial port unavailable, will retry on reinit");
                None
            }
        };
        Self { name, config, uart }
    }

    pub fn is_open(&self) -> bool {
        self.uart.is_some()
    }

    pub fn config(&self) -> &SerialGasConfig {
        &self.config
    }

    fn port_error(&self, err: rppal::uart::Error) -> SensorError {
        SensorError::Serial {
            port: self.config.port.display().to_string(),
            reason: err.to_string(),
        }
    }

    fn read_line(&mut self) -> SensorResult<String> {
        let deadline = Instant::now() + self.config.timeout;
        let mut line = Vec::new();
        let mut chunk = [0u8; 32];
        loop {
            let uart = self.uart.as_mut().ok_or(SensorError::InvalidSetup {
                what: "serial port is closed",
            })?;
            let n = uart.read(&mut chunk).map_err(|e| self.port_error(e))?;
            line.extend_from_slice(&chunk[..n]);

            if let Some(end) = line.iter().position(|b| *b == b'\n') {
                line.truncate(end);
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if line.len() > MAX_LINE_BYTES {
                return Err(SensorError::Malformed {
                    device: self.name.clone(),
                    response: String::from_utf8_lossy(&line).into_owned(),
                });
            }
            // n == 0 means the port-level timeout expired with nothing read
            if n == 0 || Instant::now() >= deadline {
                return Err(SensorError::Timeout {
                    device: self.name.clone(),
                });
            }
        }
    }
}

impl SensorChannel for SerialGasSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> SensorResult<f64> {
        let command = self.config.command_bytes();
        {
            let uart = self.uart.as_mut().ok_or(SensorError::InvalidSetup {
                what: "serial port is closed",
            })?;
            let res = uart
                .flush(Queue::Input)
                .and_then(|_| uart.write(&command).map(|_| ()));
            if let Err(e) = res {
                return Err(self.port_error(e));
            }
        }
        let line = self.read_line()?;
        parse_response(&line, self.config.scale).ok_or_else(|| SensorError::Malformed {
            device: self.name.clone(),
            response: line.trim().to_string(),
        })
    }

    fn reinitialize(&mut self) -> SensorResult<()> {
        // Drop closes the old descriptor before reopening
        self.uart = None;
        self.uart = Some(open_port(&self.config)?);
        info!(sensor = %self.name, port = %self.config.port.display(), "serial port reopened");
        Ok(())
    }
}

fn open_port(config: &SerialGasConfig) -> SensorResult<Uart> {
    let port_err = |e: rppal::uart::Error| SensorError::Serial {
        port: config.port.display().to_string(),
        reason: e.to_string(),
    };
    let mut uart = Uart::with_path(&config.port, config.baud, Parity::None, 8, 1).map_err(port_err)?;
    // Return after the first byte, or after the timeout with nothing
    uart.set_read_mode(0, config.timeout).map_err(port_err)?;
    thread::sleep(config.open_settle);
    info!(port = %config.port.display(), baud = config.baud, "serial port opened");
    Ok(uart)
}

/// Parse a sensor response line. Token 1 must be all digits.
pub fn parse_response(line: &str, scale: f64) -> Option<f64> {
    let token = line.split_whitespace().nth(1)?;
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let raw: u64 = token.parse().ok()?;
    Some(raw as f64 * scale)
}
