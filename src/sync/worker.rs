//! Background task hosting a synchronization loop

use futures::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{LoopExit, LoopState, SyncLoop};
use crate::lights::LightController;
use crate::mapper::RpmMapper;
use crate::telemetry::TelemetrySource;
use crate::RigError;

/// Spawns synchronization loops onto the tokio runtime.
pub struct SyncWorker;

impl SyncWorker {
    /// Start `sync_loop` on its own task.
    ///
    /// The loop runs until [`SyncHandle::stop`] is called, the handle is dropped,
    /// or a fatal error ends it.
    pub fn spawn<S, L, M>(sync_loop: SyncLoop<S, L, M>) -> SyncHandle
    where
        S: TelemetrySource,
        L: LightController,
        M: RpmMapper,
    {
        let cancel = CancellationToken::new();
        let state = sync_loop.subscribe();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            info!(hz = sync_loop.tick_rate().hz(), "Synchronization loop started");
            sync_loop.run(task_cancel).await
        });

        SyncHandle { state, cancel, task }
    }
}

/// Control surface of a spawned loop.
pub struct SyncHandle {
    state: watch::Receiver<LoopState>,
    cancel: CancellationToken,
    task: JoinHandle<LoopExit>,
}

impl SyncHandle {
    /// Ask the loop to stop before its next tick. Idempotent.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping synchronization loop");
            self.cancel.cancel();
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Stream of state transitions, starting with the current state.
    pub fn state_updates(&self) -> impl Stream<Item = LoopState> + Send + Unpin + 'static {
        WatchStream::new(self.state.clone())
    }

    /// Token shared with the loop, for tying it into a wider shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end.
    ///
    /// Cancel safe; must not be polled again once it has returned.
    pub async fn wait(&mut self) -> LoopExit {
        match (&mut self.task).await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(error = %e, "Synchronization task did not complete");
                LoopExit::Failed(RigError::telemetry_failed(format!("synchronization task aborted: {}", e)))
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
