use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::USER_AGENT;

use super::protocol::Command;
use super::protocol::FullState;
use crate::config::CameraConfig;
use crate::config::ServiceConfig;

/// Errors talking to the home-automation service
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service responded with status {0}")]
    Status(u16),

    #[error("invalid service URL '{0}'")]
    InvalidUrl(String),

    #[error("invalid request header '{0}'")]
    InvalidHeader(String),
}

/// Headers sent with every request to the service
fn default_headers(
    user_agent: Option<&str>,
    extra: &HashMap<String, String>,
) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();

    for (name, value) in extra {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader(name.clone()))?;
        headers.insert(header, value);
    }

    if let Some(agent) = user_agent {
        let value = HeaderValue::from_str(agent)
            .map_err(|_| ClientError::InvalidHeader(USER_AGENT.to_string()))?;
        headers.insert(USER_AGENT, value);
    }

    Ok(headers)
}

/// A single still image from the camera endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Trait for the remote service operations
///
/// This trait allows for mocking the service for testing purposes
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Fetch a full state snapshot
    async fn fetch_state(&self) -> Result<FullState, ClientError>;

    /// Send a control command; the response body is ignored
    async fn send_command(&self, command: &Command) -> Result<(), ClientError>;

    /// Fetch the current camera still
    async fn fetch_frame(&self) -> Result<Frame, ClientError>;
}

/// Real client implementation using reqwest
pub struct HttpDeviceApi {
    client: reqwest::Client,
    base_url: String,
    camera_path: String,
}

impl HttpDeviceApi {
    pub fn new(service: &ServiceConfig, camera: &CameraConfig) -> Result<Self, ClientError> {
        reqwest::Url::parse(&service.base_url)
            .map_err(|_| ClientError::InvalidUrl(service.base_url.clone()))?;

        let headers = default_headers(service.user_agent.as_deref(), &service.headers)?;
        let client = reqwest::Client::builder()
            .timeout(service.request_timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: service.base_url.trim_end_matches('/').to_string(),
            camera_path: camera.path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn get(&self, url: String) -> Result<reqwest::Response, ClientError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl DeviceApi for HttpDeviceApi {
    async fn fetch_state(&self) -> Result<FullState, ClientError> {
        let response = self.get(self.url("/api/full_state")).await?;
        Ok(response.json::<FullState>().await?)
    }

    async fn send_command(&self, command: &Command) -> Result<(), ClientError> {
        self.get(self.url(&command.path())).await?;
        Ok(())
    }

    async fn fetch_frame(&self) -> Result<Frame, ClientError> {
        // Cache-busting query so proxies never hand back a stale still
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let url = format!("{}?t={}", self.url(&self.camera_path), stamp);

        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let data = response.bytes().await?.to_vec();

        Ok(Frame { content_type, data })
    }
}

/// Mock service client for testing
///
/// Queued responses are served in order; once the queue runs dry every
/// fetch fails, which looks like a service that went away.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockDeviceApi {
    pub states: std::sync::Mutex<std::collections::VecDeque<Option<FullState>>>,
    pub frames: std::sync::Mutex<std::collections::VecDeque<Option<Frame>>>,
    pub commands: std::sync::Mutex<Vec<Command>>,
    pub fail_commands: std::sync::atomic::AtomicBool,
    pub state_fetches: std::sync::atomic::AtomicUsize,
    pub frame_fetches: std::sync::atomic::AtomicUsize,
    /// How long successive state fetches take; instant once empty
    pub fetch_delays: std::sync::Mutex<std::collections::VecDeque<std::time::Duration>>,
    pub in_flight: std::sync::atomic::AtomicUsize,
    pub max_in_flight: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockDeviceApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot, or a failed fetch for `None`
    pub fn push_state(&self, state: Option<FullState>) {
        self.states.lock().unwrap().push_back(state);
    }

    pub fn push_frame(&self, frame: Option<Frame>) {
        self.frames.lock().unwrap().push_back(frame);
    }

    pub fn sent(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl DeviceApi for MockDeviceApi {
    async fn fetch_state(&self) -> Result<FullState, ClientError> {
        use std::sync::atomic::Ordering;

        self.state_fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = self.fetch_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.states.lock().unwrap().pop_front() {
            Some(Some(state)) => Ok(state),
            _ => Err(ClientError::Status(503)),
        }
    }

    async fn send_command(&self, command: &Command) -> Result<(), ClientError> {
        use std::sync::atomic::Ordering;

        self.commands.lock().unwrap().push(command.clone());
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(ClientError::Status(500));
        }
        Ok(())
    }

    async fn fetch_frame(&self) -> Result<Frame, ClientError> {
        use std::sync::atomic::Ordering;

        self.frame_fetches.fetch_add(1, Ordering::SeqCst);
        match self.frames.lock().unwrap().pop_front() {
            Some(Some(frame)) => Ok(frame),
            _ => Err(ClientError::Status(404)),
        }
    }
}
