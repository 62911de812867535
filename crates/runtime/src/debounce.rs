//! Single-window debounce for score file changes.
//!
//! There is at most one pending timer for the whole watched directory: a
//! notification for any file cancels whatever timer is pending and starts a
//! new one for the latest file.  A burst touching two games within one
//! window therefore only processes the game notified last.
//!
//! Expired timers hand the file name to one worker task, so processing
//! passes never overlap and run in the order their timers expired.  A pass
//! that has started is never cancelled.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

/// Receives the file name once its debounce window has elapsed.
#[async_trait]
pub trait ChangeHandler: Send + Sync + 'static {
    async fn handle(&self, file_name: String);
}

#[derive(Default)]
struct SchedulerState {
    pending: Option<AbortHandle>,
    /// `None` once the scheduler has been shut down.
    fire_tx: Option<mpsc::UnboundedSender<String>>,
}

pub struct DebounceScheduler {
    delay: Duration,
    state: Mutex<SchedulerState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceScheduler {
    /// Spawn the processing worker.  Must be called inside a tokio runtime.
    pub fn start<H: ChangeHandler>(delay: Duration, handler: Arc<H>) -> Self {
        let (fire_tx, mut fire_rx) = mpsc::unbounded_channel::<String>();
        let worker = tokio::spawn(async move {
            while let Some(file_name) = fire_rx.recv().await {
                info!(file = %file_name, "changes settled; processing");
                handler.handle(file_name).await;
            }
            debug!("debounce worker stopped");
        });

        Self {
            delay,
            state: Mutex::new(SchedulerState {
                pending: None,
                fire_tx: Some(fire_tx),
            }),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the settle window for `file_name`.  Returns `false` after
    /// [`shutdown`](Self::shutdown).
    pub fn notify(&self, file_name: impl Into<String>) -> bool {
        let file_name = file_name.into();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(fire_tx) = state.fire_tx.clone() else {
            debug!(file = %file_name, "scheduler stopped; ignoring change");
            return false;
        };

        if let Some(pending) = state.pending.take() {
            pending.abort();
        }

        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // No await between waking and sending: an abort either lands
            // before expiry or not at all.
            let _ = fire_tx.send(file_name);
        });
        state.pending = Some(timer.abort_handle());
        true
    }

    /// Cancel the pending timer, refuse further notifications, and wait for
    /// the worker to finish any pass already handed to it.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = state.pending.take() {
                pending.abort();
            }
            state.fire_tx = None;
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
    }
}
