use serde::Serialize;

use crate::config::RoomConfig;

/// Highest light intensity the service understands
pub const MAX_INTENSITY: u8 = 100;

/// One decoded `full_state` poll. Replaced wholesale every tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceSnapshot {
    /// Degrees Celsius
    pub temperature: Option<f64>,

    /// Relative humidity, percent
    pub humidity: Option<f64>,

    /// Proximity reading in cm; 0 means no reading
    pub distance: Option<f64>,

    pub proximity_alarm_enabled: bool,
    pub main_door_open: bool,
    pub garage_door_open: bool,

    /// Index-addressed intensities, 0-100
    pub light_intensities: Vec<u8>,
}

impl DeviceSnapshot {
    /// Intensity at `index`; a missing entry reads as off.
    pub fn intensity(&self, index: usize) -> u8 {
        self.light_intensities
            .get(index)
            .copied()
            .unwrap_or(0)
            .min(MAX_INTENSITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SensorReadings {
    pub temperature: f64,
    pub humidity: f64,
    pub distance: f64,
}

/// A light fixture as shown on the panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomLight {
    pub id: u32,
    pub name: String,
    pub source_index: usize,
    pub is_on: bool,
    pub brightness: u8,
}

impl RoomLight {
    pub fn new(config: &RoomConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            source_index: config.led_index,
            is_on: false,
            brightness: 0,
        }
    }

    /// Overwrite with the intensity the server reports for this fixture.
    pub fn reconcile(&mut self, snapshot: &DeviceSnapshot) {
        let intensity = snapshot.intensity(self.source_index);
        self.brightness = intensity;
        self.is_on = intensity > 0;
    }
}

/// Intents that cannot be applied to the local state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("no room with id {0}")]
    UnknownRoom(u32),

    #[error("light in room {0} is off")]
    LightOff(u32),
}

/// Local mirror of the remote installation, owned by the dashboard.
///
/// Every method is a plain state transition; none of them touch the network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelState {
    pub sensors: SensorReadings,
    pub alarm_enabled: bool,
    pub door_open: bool,
    pub garage_open: bool,
    pub rooms: Vec<RoomLight>,
    pub camera_active: bool,

    /// Whether the most recent poll succeeded
    pub online: bool,
}

impl PanelState {
    pub fn new(rooms: &[RoomConfig]) -> Self {
        Self {
            sensors: SensorReadings::default(),
            alarm_enabled: false,
            door_open: false,
            garage_open: false,
            rooms: rooms.iter().map(RoomLight::new).collect(),
            camera_active: false,
            online: false,
        }
    }

    /// Replace everything the server is authoritative for. A reading the
    /// sensor has not reported keeps its previous value.
    pub fn apply_snapshot(&mut self, snapshot: &DeviceSnapshot) {
        let sensors = &mut self.sensors;
        sensors.temperature = snapshot.temperature.unwrap_or(sensors.temperature);
        sensors.humidity = snapshot.humidity.unwrap_or(sensors.humidity);
        sensors.distance = snapshot.distance.unwrap_or(sensors.distance);
        self.alarm_enabled = snapshot.proximity_alarm_enabled;
        self.door_open = snapshot.main_door_open;
        self.garage_open = snapshot.garage_door_open;
        for room in &mut self.rooms {
            room.reconcile(snapshot);
        }
        self.online = true;
    }

    /// A poll failed; mirrored values stay as they were.
    pub fn mark_offline(&mut self) {
        self.online = false;
    }

    pub fn room(&self, id: u32) -> Option<&RoomLight> {
        self.rooms.iter().find(|r| r.id == id)
    }

    fn room_mut(&mut self, id: u32) -> Result<&mut RoomLight, ControlError> {
        self.rooms
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ControlError::UnknownRoom(id))
    }

    /// Switch a light; on means full brightness, off means zero.
    pub fn set_light_on(&mut self, id: u32, on: bool) -> Result<&RoomLight, ControlError> {
        let room = self.room_mut(id)?;
        room.is_on = on;
        room.brightness = if on { MAX_INTENSITY } else { 0 };
        Ok(room)
    }

    /// Adjust brightness of a light that is on. `is_on` is left alone, so a
    /// drag down to 0 only turns the light off once the server agrees.
    pub fn set_brightness(&mut self, id: u32, value: u8) -> Result<&RoomLight, ControlError> {
        let room = self.room_mut(id)?;
        if !room.is_on {
            return Err(ControlError::LightOff(id));
        }
        room.brightness = value.min(MAX_INTENSITY);
        Ok(room)
    }
}

/// Slider position to a wire intensity.
pub fn intensity_from_slider(value: f64) -> u8 {
    value.round().clamp(0.0, f64::from(MAX_INTENSITY)) as u8
}
