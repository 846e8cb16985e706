use crate::CoreError;

/// Smallest time step used when dividing by elapsed time.
pub const MIN_DT_S: f64 = 1e-6;

pub fn ensure_finite(v: f64, what: &'static str) -> Result<f64, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Rate of change between two samples, with the time step floored at [`MIN_DT_S`].
pub fn rate_of_change(prev: f64, prev_t: f64, value: f64, t: f64) -> f64 {
    (value - prev) / (t - prev_t).max(MIN_DT_S)
}
