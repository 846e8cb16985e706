//! The sensor capability.

use crate::error::SensorResult;

/// One physical sensor producing a scalar reading.
pub trait SensorChannel: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Take one reading. May block up to the channel's I/O timeout.
    fn read(&mut self) -> SensorResult<f64>;

    /// Close and reopen the underlying resource.
    fn reinitialize(&mut self) -> SensorResult<()>;
}

impl<S: SensorChannel + ?Sized> SensorChannel for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&mut self) -> SensorResult<f64> {
        (**self).read()
    }

    fn reinitialize(&mut self) -> SensorResult<()> {
        (**self).reinitialize()
    }
}
