//! Scripted sensors for bench runs without hardware.

use inc_core::Clock;

use crate::channel::SensorChannel;
use crate::error::{SensorError, SensorResult};

/// Step profile: `(offset_s, value)` pairs sorted by offset. The reading is
/// the value of the last step whose offset has passed.
pub struct ProfileSensor<C> {
    name: String,
    profile: Vec<(f64, f64)>,
    clock: C,
}

impl<C: Clock> ProfileSensor<C> {
    pub fn new(name: impl Into<String>, mut profile: Vec<(f64, f64)>, clock: C) -> SensorResult<Self> {
        if profile.is_empty() {
            return Err(SensorError::InvalidSetup {
                what: "profile needs at least one step",
            });
        }
        if profile.iter().any(|(t, v)| !t.is_finite() || !v.is_finite()) {
            return Err(SensorError::InvalidSetup {
                what: "profile steps must be finite",
            });
        }
        profile.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self {
            name: name.into(),
            profile,
            clock,
        })
    }

    /// Profile value at elapsed time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        self.profile
            .iter()
            .take_while(|(offset, _)| *offset <= t)
            .last()
            .unwrap_or(&self.profile[0])
            .1
    }
}

impl<C: Clock> SensorChannel for ProfileSensor<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> SensorResult<f64> {
        Ok(self.value_at(self.clock.elapsed_s()))
    }

    fn reinitialize(&mut self) -> SensorResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inc_core::ManualClock;

    #[test]
    fn steps_through_profile() {
        let clock = ManualClock::new(0.0);
        let mut sensor =
            ProfileSensor::new("o2", vec![(0.0, 20.0), (15.0, 10.0), (30.0, 2.0)], clock.clone())
                .unwrap();
        assert_eq!(sensor.read().unwrap(), 20.0);
        clock.set(14.9);
        assert_eq!(sensor.read().unwrap(), 20.0);
        clock.set(15.0);
        assert_eq!(sensor.read().unwrap(), 10.0);
        clock.set(500.0);
        assert_eq!(sensor.read().unwrap(), 2.0);
    }

    #[test]
    fn before_first_step_uses_first_value() {
        let sensor = ProfileSensor::new("t", vec![(5.0, 30.0), (10.0, 37.0)], ManualClock::new(0.0))
            .unwrap();
        assert_eq!(sensor.value_at(1.0), 30.0);
    }

    #[test]
    fn unsorted_profile_is_sorted() {
        let sensor = ProfileSensor::new("co2", vec![(20.0, 5.0), (0.0, 0.5), (10.0, 3.0)], ManualClock::new(0.0))
            .unwrap();
        assert_eq!(sensor.value_at(12.0), 3.0);
    }

    #[test]
    fn rejects_empty_profile() {
        assert!(ProfileSensor::new("x", Vec::new(), ManualClock::new(0.0)).is_err());
    }
}
