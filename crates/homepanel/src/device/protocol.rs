//! Wire format of the home-automation service.
//!
//! The service speaks plain JSON over HTTP GET. Flags are integers and only
//! the value `1` means "on".

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::engine::DeviceSnapshot;
use crate::engine::MAX_INTENSITY;

/// Body of `GET /api/full_state`.
///
/// Unknown fields (`last_seen` and friends) are ignored. Sensor readings are
/// `null` until the sensor node has posted one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FullState {
    pub temp: Option<f64>,
    pub humedad: Option<f64>,
    pub distancia: Option<f64>,
    pub ultrasonic_active: i64,
    pub door_open: i64,
    pub garage_open: i64,
    #[serde(deserialize_with = "levels")]
    pub led_intensities: Vec<i64>,
}

/// Any JSON number per entry; fractional levels round to the nearest integer.
fn levels<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
    let raw = Vec::<f64>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|level| level.round() as i64).collect())
}

impl From<FullState> for DeviceSnapshot {
    fn from(state: FullState) -> Self {
        Self {
            temperature: state.temp,
            humidity: state.humedad,
            distance: state.distancia,
            proximity_alarm_enabled: state.ultrasonic_active == 1,
            main_door_open: state.door_open == 1,
            garage_door_open: state.garage_open == 1,
            light_intensities: state
                .led_intensities
                .into_iter()
                .map(|level| level.clamp(0, i64::from(MAX_INTENSITY)) as u8)
                .collect(),
        }
    }
}

/// Switchable actuators addressed as `/control/<name>?set=<0|1>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Actuator {
    /// Proximity (ultrasonic) alarm arming
    Ultrasonic,
    Door,
    Garage,
}

/// A control request sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { actuator: Actuator, on: bool },
    SetLight { index: usize, intensity: u8 },
}

impl Command {
    /// Path and query of the request, relative to the service base URL
    pub fn path(&self) -> String {
        match self {
            Command::Set { actuator, on } => {
                format!("/control/{}?set={}", actuator, u8::from(*on))
            }
            Command::SetLight { index, intensity } => {
                format!("/control/leds/{}/{}", index, intensity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_state() {
        let body = r#"{
            "temp": 23.5, "humedad": 41.0, "distancia": 15,
            "last_seen": "12:00:01",
            "ultrasonic_active": 1, "door_open": 0, "garage_open": 1,
            "led_intensities": [0, 100, 35, 0, 0, 0, 0, 0]
        }"#;

        let state: FullState = serde_json::from_str(body).unwrap();
        let snapshot = DeviceSnapshot::from(state);

        assert_eq!(snapshot.temperature, Some(23.5));
        assert_eq!(snapshot.humidity, Some(41.0));
        assert_eq!(snapshot.distance, Some(15.0));
        assert!(snapshot.proximity_alarm_enabled);
        assert!(!snapshot.main_door_open);
        assert!(snapshot.garage_door_open);
        assert_eq!(snapshot.light_intensities, vec![0, 100, 35, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_out_of_range_levels_clamped() {
        let body = r#"{
            "temp": 20, "humedad": 40, "distancia": 90,
            "ultrasonic_active": 0, "door_open": 1, "garage_open": 0,
            "led_intensities": [300, -5, 40, 12.6]
        }"#;

        let state: FullState = serde_json::from_str(body).unwrap();
        let snapshot = DeviceSnapshot::from(state);

        assert!(snapshot.main_door_open);
        assert_eq!(snapshot.light_intensities, vec![100, 0, 40, 13]);
    }

    #[test]
    fn test_null_readings_keep_the_rest() {
        let body = r#"{
            "temp": null, "humedad": 38.5, "distancia": null,
            "ultrasonic_active": 1, "door_open": 1, "garage_open": 1,
            "led_intensities": [0, 70]
        }"#;

        let state: FullState = serde_json::from_str(body).unwrap();
        let snapshot = DeviceSnapshot::from(state);

        assert_eq!(snapshot.temperature, None);
        assert_eq!(snapshot.humidity, Some(38.5));
        assert_eq!(snapshot.distance, None);
        assert!(snapshot.proximity_alarm_enabled);
        assert!(snapshot.main_door_open);
        assert_eq!(snapshot.light_intensities, vec![0, 70]);
    }

    #[test]
    fn test_flag_only_on_when_one() {
        let state = FullState {
            ultrasonic_active: 2,
            door_open: -1,
            garage_open: 1,
            ..FullState::default()
        };
        let snapshot = DeviceSnapshot::from(state);
        assert!(!snapshot.proximity_alarm_enabled);
        assert!(!snapshot.main_door_open);
        assert!(snapshot.garage_door_open);
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let body = r#"{"temp": 23.5}"#;
        assert!(serde_json::from_str::<FullState>(body).is_err());
    }

    #[test]
    fn test_command_paths() {
        let cases = [
            (
                Command::Set {
                    actuator: Actuator::Ultrasonic,
                    on: true,
                },
                "/control/ultrasonic?set=1",
            ),
            (
                Command::Set {
                    actuator: Actuator::Door,
                    on: false,
                },
                "/control/door?set=0",
            ),
            (
                Command::Set {
                    actuator: Actuator::Garage,
                    on: true,
                },
                "/control/garage?set=1",
            ),
            (
                Command::SetLight {
                    index: 3,
                    intensity: 42,
                },
                "/control/leds/3/42",
            ),
        ];

        for (command, path) in cases {
            assert_eq!(command.path(), path);
        }
    }
}
