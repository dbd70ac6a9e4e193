mod alert;
mod dashboard;
mod dispatcher;
mod event;
mod state;
mod store;
mod sync;

pub use alert::intrusion_distance;
pub use alert::AlertSuppression;
pub use dashboard::Dashboard;
pub use dashboard::PanelHandle;
pub use dispatcher::DispatchHandle;
pub use dispatcher::OptimisticControlDispatcher;
pub use event::Event;
pub use state::ControlError;
pub use state::DeviceSnapshot;
pub use state::MAX_INTENSITY;
pub use state::PanelState;
pub use state::RoomLight;
pub use state::SensorReadings;
pub use store::SharedState;
pub use sync::StateSyncLoop;
pub use sync::TickOutcome;
