//! inc-core: shared foundation for the incubator controller.
//!
//! Contains:
//! - error (shared error types)
//! - numeric (finite checks, rate of change)
//! - clock (injectable elapsed-time sources)

pub mod clock;
pub mod error;
pub mod numeric;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{CoreError, CoreResult};
pub use numeric::*;
