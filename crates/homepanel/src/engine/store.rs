use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tokio::sync::watch;

use super::state::PanelState;

/// Shared handle to the panel state.
///
/// The lock is only ever held inside [`SharedState::update`] and
/// [`SharedState::snapshot`], never across an await point, so every
/// transition is applied as a whole. Changes to `camera_active` are
/// published on a watch channel so the camera viewer can follow them.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<PanelState>>,
    camera: Arc<watch::Sender<bool>>,
}

impl SharedState {
    pub fn new(state: PanelState) -> Self {
        let (camera, _) = watch::channel(state.camera_active);
        Self {
            inner: Arc::new(Mutex::new(state)),
            camera: Arc::new(camera),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> PanelState {
        self.lock().clone()
    }

    /// Apply a transition and return whatever it returns.
    ///
    /// `camera_active` is published before the lock is released, so the
    /// watch never settles on a value the state no longer holds.
    pub fn update<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        let camera_active = state.camera_active;

        self.camera.send_if_modified(|current| {
            if *current == camera_active {
                false
            } else {
                *current = camera_active;
                true
            }
        });

        result
    }

    /// Follow camera activation
    pub fn camera_watch(&self) -> watch::Receiver<bool> {
        self.camera.subscribe()
    }
}
