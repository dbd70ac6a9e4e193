//! Client side of the home-automation service.

mod client;
mod protocol;

pub use client::ClientError;
pub use client::DeviceApi;
pub use client::Frame;
pub use client::HttpDeviceApi;
#[cfg(test)]
pub use client::MockDeviceApi;
pub use protocol::Actuator;
pub use protocol::Command;
pub use protocol::FullState;
