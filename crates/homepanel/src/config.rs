//! Configuration file parsing and structures.
//!
//! homepanel reads a single TOML file. Every section has defaults, so an empty
//! file (or no file at all) yields a panel pointed at the default service with
//! the five stock rooms.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_rooms")]
    pub rooms: Vec<RoomConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"homepanel::engine" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

/// Remote home-automation service
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the service, e.g. "http://192.168.1.15:5000"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Interval between state snapshot fetches
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on any single request to the service
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// User-Agent sent with every request; reqwest's own when unset
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Extra headers sent with every request, e.g. for a tunnel in front of
    /// the service (`"ngrok-skip-browser-warning" = "true"`)
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ServiceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: None,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlarmConfig {
    /// A reading strictly below this distance (and above 0) is an intrusion
    #[serde(default = "default_proximity_threshold_cm")]
    pub proximity_threshold_cm: f64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_cm: default_proximity_threshold_cm(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Path of the still-image endpoint, relative to the service base URL
    #[serde(default = "default_camera_path")]
    pub path: String,

    /// Delay between frames while frames are arriving
    #[serde(default = "default_live_interval_ms")]
    pub live_interval_ms: u64,

    /// Delay before the next attempt after a failed frame
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl CameraConfig {
    pub fn live_interval(&self) -> Duration {
        Duration::from_millis(self.live_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            path: default_camera_path(),
            live_interval_ms: default_live_interval_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

/// Local panel API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
        }
    }
}

/// One light fixture shown on the panel
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomConfig {
    pub id: u32,
    pub name: String,

    /// Position of this fixture in the service's `led_intensities` array
    pub led_index: usize,
}

fn default_base_url() -> String {
    "http://192.168.1.15:5000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_proximity_threshold_cm() -> f64 {
    20.0
}

fn default_camera_path() -> String {
    "/get-image".to_string()
}

fn default_live_interval_ms() -> u64 {
    100
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

fn default_rooms() -> Vec<RoomConfig> {
    ["Living Room", "Bathroom", "Bedroom 1", "Bedroom 2", "Garage"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| RoomConfig {
            id: i as u32 + 1,
            name: name.to_string(),
            led_index: i,
        })
        .collect()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, as used when no config file is given
    pub fn builtin() -> Self {
        Self {
            rooms: default_rooms(),
            ..Self::default()
        }
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.service.base_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "service.base_url '{}' is not a valid URL: {}",
                self.service.base_url, e
            ))
        })?;

        if self.service.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "service.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.service.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "service.request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        for (name, value) in &self.service.headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ConfigError::Invalid(format!("service.headers: invalid header name '{}'", name))
            })?;
            reqwest::header::HeaderValue::from_str(value).map_err(|_| {
                ConfigError::Invalid(format!("service.headers: invalid value for '{}'", name))
            })?;
        }

        if self.camera.live_interval_ms == 0 || self.camera.retry_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "camera intervals must be greater than 0".to_string(),
            ));
        }

        if self.alarm.proximity_threshold_cm <= 0.0 {
            return Err(ConfigError::Invalid(
                "alarm.proximity_threshold_cm must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for room in &self.rooms {
            if !seen.insert(room.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate room id {}",
                    room.id
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
