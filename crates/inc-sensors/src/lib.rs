//! Sensor access for the incubator.
//!
//! Hardware sensors are flaky: USB serial adapters drop out and 1-wire probes
//! miss conversions. Every physical sensor implements [`SensorChannel`], which
//! may fail, and the regulation loop only ever sees it through a
//! [`FaultTolerantSensor`], which never does.

pub mod channel;
pub mod error;
pub mod onewire;
pub mod serial_gas;
pub mod sim;
pub mod supervisor;

pub use channel::SensorChannel;
pub use error::{SensorError, SensorResult};
pub use onewire::{DEFAULT_W1_DEVICES_DIR, OneWireTemperature};
pub use serial_gas::{SerialGasConfig, SerialGasSensor};
pub use sim::ProfileSensor;
pub use supervisor::{FaultTolerantSensor, SensorHealth};
