//! Camera view fed by polling the still-image endpoint.
//!
//! While the view is active a frame is requested every `live_interval` as
//! long as frames arrive, and every `retry_interval` while they do not.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use crate::config::CameraConfig;
use crate::device::DeviceApi;
use crate::device::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    /// View not shown, nothing is fetched
    #[default]
    Idle,
    /// Shown, no frame yet
    Connecting,
    Live,
    NoSignal,
}

#[derive(Debug, Clone, Default)]
pub struct CameraFeed {
    pub status: CameraStatus,
    pub frame: Option<Frame>,
}

/// Latest camera feed, shared with the API.
#[derive(Clone, Default)]
pub struct SharedFeed(Arc<Mutex<CameraFeed>>);

impl SharedFeed {
    fn lock(&self) -> MutexGuard<'_, CameraFeed> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> CameraFeed {
        self.lock().clone()
    }

    pub fn status(&self) -> CameraStatus {
        self.lock().status
    }

    fn set(&self, status: CameraStatus, frame: Option<Frame>) {
        let mut feed = self.lock();
        feed.status = status;
        feed.frame = frame;
    }
}

pub struct CameraViewer {
    api: Arc<dyn DeviceApi>,
    feed: SharedFeed,
    active: watch::Receiver<bool>,
    live_interval: Duration,
    retry_interval: Duration,
}

impl CameraViewer {
    pub fn new(
        api: Arc<dyn DeviceApi>,
        feed: SharedFeed,
        active: watch::Receiver<bool>,
        config: &CameraConfig,
    ) -> Self {
        Self {
            api,
            feed,
            active,
            live_interval: config.live_interval(),
            retry_interval: config.retry_interval(),
        }
    }

    /// Fetch one frame and return how long to wait before the next one.
    pub async fn poll_once(&self) -> Duration {
        match self.api.fetch_frame().await {
            Ok(frame) => {
                self.feed.set(CameraStatus::Live, Some(frame));
                self.live_interval
            }
            Err(e) => {
                debug!("Camera frame failed: {}", e);
                self.feed.set(CameraStatus::NoSignal, None);
                self.retry_interval
            }
        }
    }

    /// Poll while active, idle while not, until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Camera viewer ready");

        loop {
            while !*self.active.borrow_and_update() {
                if self.feed.status() != CameraStatus::Idle {
                    info!("Camera view closed");
                    self.feed.set(CameraStatus::Idle, None);
                }
                tokio::select! {
                    changed = self.active.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = shutdown.changed() => return,
                }
            }

            if self.feed.status() == CameraStatus::Idle {
                info!("Camera view opened");
                self.feed.set(CameraStatus::Connecting, None);
            }

            let delay = self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = self.active.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = shutdown.changed() => return,
            }
        }
    }
}
