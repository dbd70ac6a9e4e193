use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use super::dispatcher::OptimisticControlDispatcher;
use super::event::Event;
use super::state::PanelState;
use super::store::SharedState;
use super::sync::StateSyncLoop;
use crate::camera::CameraFeed;
use crate::camera::CameraViewer;
use crate::camera::SharedFeed;
use crate::config::Config;
use crate::config::RoomConfig;
use crate::device::DeviceApi;

/// Capacity of the event broadcast channel; slow subscribers lag past this
const EVENT_CHANNEL_SIZE: usize = 64;

/// Cloneable access to a mounted panel: read state, send intents.
#[derive(Clone)]
pub struct PanelHandle {
    state: SharedState,
    dispatcher: OptimisticControlDispatcher,
    feed: SharedFeed,
}

impl PanelHandle {
    pub fn new(rooms: &[RoomConfig], api: Arc<dyn DeviceApi>) -> Self {
        let state = SharedState::new(PanelState::new(rooms));
        let dispatcher = OptimisticControlDispatcher::new(api, state.clone());
        Self {
            state,
            dispatcher,
            feed: SharedFeed::default(),
        }
    }

    pub fn state(&self) -> PanelState {
        self.state.snapshot()
    }

    pub fn dispatcher(&self) -> &OptimisticControlDispatcher {
        &self.dispatcher
    }

    pub fn camera_feed(&self) -> CameraFeed {
        self.feed.snapshot()
    }

    pub(crate) fn feed(&self) -> SharedFeed {
        self.feed.clone()
    }
}

/// The mounted panel.
///
/// Mounting spawns the sync loop and the camera viewer; [`Dashboard::unmount`]
/// stops them and waits for them to finish. Dropping a dashboard without
/// unmounting aborts both tasks, so no poller outlives it.
pub struct Dashboard {
    handle: PanelHandle,
    events: broadcast::Sender<Event>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Dashboard {
    pub fn mount(config: &Config, api: Arc<dyn DeviceApi>) -> Self {
        info!(
            "Mounting dashboard for {} ({} rooms)",
            config.service.base_url,
            config.rooms.len()
        );

        let handle = PanelHandle::new(&config.rooms, Arc::clone(&api));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sync = StateSyncLoop::new(
            Arc::clone(&api),
            handle.state.clone(),
            events.clone(),
            &config.service,
            &config.alarm,
        );
        let viewer = CameraViewer::new(
            api,
            handle.feed.clone(),
            handle.state.camera_watch(),
            &config.camera,
        );

        let tasks = vec![
            tokio::spawn(sync.run(shutdown_rx.clone())),
            tokio::spawn(viewer.run(shutdown_rx)),
        ];

        Self {
            handle,
            events,
            shutdown_tx,
            tasks,
        }
    }

    pub fn handle(&self) -> PanelHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> PanelState {
        self.handle.state()
    }

    pub fn dispatcher(&self) -> &OptimisticControlDispatcher {
        self.handle.dispatcher()
    }

    pub fn camera_feed(&self) -> CameraFeed {
        self.handle.camera_feed()
    }

    /// Intrusion alerts and camera requests from the sync loop
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Stop polling and wait for the loops to exit.
    pub async fn unmount(mut self) {
        info!("Unmounting dashboard");
        self.shutdown_tx.send(true).ok();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Dashboard task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
