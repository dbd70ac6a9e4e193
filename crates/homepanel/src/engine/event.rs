use serde::Serialize;

/// Events the dashboard surfaces to whoever is listening.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Something came within the proximity threshold while the alarm was armed
    IntrusionDetected { distance: f64 },

    /// The camera view should be shown
    CameraActivationRequested,
}
