use super::state::DeviceSnapshot;

/// Distance of whatever sits inside the proximity threshold while the alarm
/// is armed. A distance of 0, or none at all, is "no reading", never an
/// intrusion.
pub fn intrusion_distance(snapshot: &DeviceSnapshot, threshold_cm: f64) -> Option<f64> {
    snapshot
        .distance
        .filter(|&d| snapshot.proximity_alarm_enabled && d > 0.0 && d < threshold_cm)
}

/// Latch that turns a level condition into one-shot alerts.
#[derive(Debug, Default)]
pub struct AlertSuppression {
    latched: bool,
}

impl AlertSuppression {
    /// Feed the current condition; returns true only on a false→true edge.
    pub fn observe(&mut self, condition: bool) -> bool {
        let rising = condition && !self.latched;
        self.latched = condition;
        rising
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }
}
