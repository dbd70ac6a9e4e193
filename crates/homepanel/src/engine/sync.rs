//! Periodic reconciliation with the service.
//!
//! One task, one fetch per tick, ticks never overlap. A failed tick leaves the
//! mirrored values alone; the next tick is the only retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::alert::intrusion_distance;
use super::alert::AlertSuppression;
use super::event::Event;
use super::state::DeviceSnapshot;
use super::state::PanelState;
use super::store::SharedState;
use crate::config::AlarmConfig;
use crate::config::ServiceConfig;
use crate::device::DeviceApi;

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Snapshot applied; `alert` carries the distance if an intrusion fired
    Applied { alert: Option<f64> },

    /// Fetch failed, state untouched
    Discarded,
}

pub struct StateSyncLoop {
    api: Arc<dyn DeviceApi>,
    state: SharedState,
    events: broadcast::Sender<Event>,
    interval: Duration,
    threshold_cm: f64,
    suppression: AlertSuppression,
}

impl StateSyncLoop {
    pub fn new(
        api: Arc<dyn DeviceApi>,
        state: SharedState,
        events: broadcast::Sender<Event>,
        service: &ServiceConfig,
        alarm: &AlarmConfig,
    ) -> Self {
        Self {
            api,
            state,
            events,
            interval: service.poll_interval(),
            threshold_cm: alarm.proximity_threshold_cm,
            suppression: AlertSuppression::default(),
        }
    }

    /// Fetch one snapshot and fold it into the panel state.
    pub async fn tick(&mut self) -> TickOutcome {
        let snapshot = match self.api.fetch_state().await {
            Ok(state) => DeviceSnapshot::from(state),
            Err(e) => {
                debug!("State fetch failed, keeping previous state: {}", e);
                self.state.update(PanelState::mark_offline);
                return TickOutcome::Discarded;
            }
        };

        let intruder = intrusion_distance(&snapshot, self.threshold_cm);
        let rising = self.suppression.observe(intruder.is_some());

        self.state.update(|state| {
            state.apply_snapshot(&snapshot);
            if rising {
                state.camera_active = true;
            }
        });

        let distance = match intruder {
            Some(distance) if rising => distance,
            _ => return TickOutcome::Applied { alert: None },
        };

        warn!("Intrusion detected: object at {} cm", distance);
        // Nobody listening is fine; the state already carries camera_active.
        self.events.send(Event::IntrusionDetected { distance }).ok();
        self.events.send(Event::CameraActivationRequested).ok();

        TickOutcome::Applied {
            alert: Some(distance),
        }
    }

    /// Tick on a fixed cadence until `shutdown` fires or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("State sync starting (every {:?})", self.interval);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("State sync stopped");
    }
}
