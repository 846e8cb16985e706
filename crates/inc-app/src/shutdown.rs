//! Emergency stop.
//!
//! An [`EmergencyStop`] holds its own handles to every output, independent of
//! the regulators, so it can be fired from a signal handler thread or by the
//! supervisor after a failed cycle without touching regulator state.

use std::sync::Arc;

use tracing::{error, warn};

use inc_controls::SharedActuator;

#[derive(Clone)]
pub struct EmergencyStop {
    outputs: Arc<[SharedActuator]>,
}

impl EmergencyStop {
    pub fn new(outputs: Vec<SharedActuator>) -> Self {
        Self {
            outputs: outputs.into(),
        }
    }

    /// Drive every output off. A failing output does not stop the others
    /// from being written. Returns the number of outputs that failed.
    pub fn trigger(&self) -> usize {
        let mut failures = 0;
        for output in self.outputs.iter() {
            if let Err(err) = output.set(false) {
                error!(actuator = output.name(), error = %err, "emergency stop write failed");
                failures += 1;
            }
        }
        if failures == 0 {
            warn!(outputs = self.outputs.len(), "emergency stop: all outputs off");
        }
        failures
    }

    pub fn outputs(&self) -> &[SharedActuator] {
        &self.outputs
    }
}

impl std::fmt::Debug for EmergencyStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencyStop")
            .field(
                "outputs",
                &self.outputs.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inc_controls::{ActuatorPort, SimulatedOutput};

    #[test]
    fn turns_everything_off_despite_failures() {
        let outs: Vec<_> = (0..3)
            .map(|i| SimulatedOutput::shared(format!("out-{i}")))
            .collect();
        for out in &outs {
            out.set(true).unwrap();
        }
        outs[1].fail_writes(true);

        let stop = EmergencyStop::new(outs.iter().map(|o| o.clone() as SharedActuator).collect());
        assert_eq!(stop.trigger(), 1);
        assert!(!outs[0].is_on());
        assert!(!outs[2].is_on());
    }

    #[test]
    fn repeated_triggers_are_harmless() {
        let out = SimulatedOutput::shared("valve");
        let stop = EmergencyStop::new(vec![out.clone() as SharedActuator]);
        let clone = stop.clone();
        assert_eq!(stop.trigger(), 0);
        assert_eq!(clone.trigger(), 0);
        assert!(!out.is_on());
        assert_eq!(out.write_count(), 2);
    }
}
