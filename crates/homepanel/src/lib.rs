pub mod api;
pub mod camera;
pub mod config;
pub mod device;
pub mod engine;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use device::DeviceApi;
pub use device::HttpDeviceApi;
pub use engine::Dashboard;
pub use engine::Event;
pub use engine::PanelHandle;
pub use engine::PanelState;
