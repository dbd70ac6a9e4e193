use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use super::state::intensity_from_slider;
use super::state::ControlError;
use super::store::SharedState;
use crate::device::Actuator;
use crate::device::Command;
use crate::device::DeviceApi;

/// Handle to a command in flight. Dropping it detaches the command.
pub type DispatchHandle = JoinHandle<()>;

/// Applies user intents locally first, then tells the service in the
/// background.
///
/// There is no rollback and no de-duplication: every intent sends its own
/// command and the next successful poll is what makes the panel agree with
/// the service again. A command task only holds the client, so a late
/// response never touches a state that has gone away.
#[derive(Clone)]
pub struct OptimisticControlDispatcher {
    api: Arc<dyn DeviceApi>,
    state: SharedState,
}

impl OptimisticControlDispatcher {
    pub fn new(api: Arc<dyn DeviceApi>, state: SharedState) -> Self {
        Self { api, state }
    }

    pub fn toggle_alarm(&self, enabled: bool) -> DispatchHandle {
        self.state.update(|s| s.alarm_enabled = enabled);
        self.send(Command::Set {
            actuator: Actuator::Ultrasonic,
            on: enabled,
        })
    }

    pub fn toggle_door(&self, open: bool) -> DispatchHandle {
        self.state.update(|s| s.door_open = open);
        self.send(Command::Set {
            actuator: Actuator::Door,
            on: open,
        })
    }

    pub fn toggle_garage(&self, open: bool) -> DispatchHandle {
        self.state.update(|s| s.garage_open = open);
        self.send(Command::Set {
            actuator: Actuator::Garage,
            on: open,
        })
    }

    /// Switch a light to `on` (full brightness) or off.
    pub fn set_light(&self, room_id: u32, on: bool) -> Result<DispatchHandle, ControlError> {
        let command = self.state.update(|s| {
            s.set_light_on(room_id, on).map(|room| Command::SetLight {
                index: room.source_index,
                intensity: room.brightness,
            })
        })?;
        Ok(self.send(command))
    }

    /// Flip a light relative to what the panel currently shows.
    pub fn toggle_light(&self, room_id: u32) -> Result<DispatchHandle, ControlError> {
        let command = self.state.update(|s| {
            let on = !s
                .room(room_id)
                .ok_or(ControlError::UnknownRoom(room_id))?
                .is_on;
            s.set_light_on(room_id, on).map(|room| Command::SetLight {
                index: room.source_index,
                intensity: room.brightness,
            })
        })?;
        Ok(self.send(command))
    }

    /// Slider is moving: local only, nothing goes on the wire.
    pub fn change_brightness(&self, room_id: u32, value: f64) -> Result<u8, ControlError> {
        let intensity = intensity_from_slider(value);
        self.state
            .update(|s| s.set_brightness(room_id, intensity).map(|r| r.brightness))
    }

    /// Slider released: one command with the final value.
    pub fn commit_brightness(
        &self,
        room_id: u32,
        value: f64,
    ) -> Result<DispatchHandle, ControlError> {
        let intensity = intensity_from_slider(value);
        let command = self.state.update(|s| {
            s.set_brightness(room_id, intensity)
                .map(|room| Command::SetLight {
                    index: room.source_index,
                    intensity: room.brightness,
                })
        })?;
        Ok(self.send(command))
    }

    /// Show or hide the camera view. Purely local.
    pub fn set_camera_active(&self, active: bool) {
        self.state.update(|s| s.camera_active = active);
    }

    fn send(&self, command: Command) -> DispatchHandle {
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            let path = command.path();
            debug!("Sending command {}", path);
            if let Err(e) = api.send_command(&command).await {
                warn!("Command {} failed: {}", path, e);
            }
        })
    }
}
