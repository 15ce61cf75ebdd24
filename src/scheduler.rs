//! Deferred deletion of sent messages.
//!
//! Every delivered file is removed from the chat after a fixed delay. Each
//! deletion is a tracked one-shot task; [`DeletionScheduler::shutdown`]
//! cancels the outstanding ones and waits for them to exit so nothing keeps
//! running after the dispatcher stops.

use crate::transport::ChatTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Owner of all pending message deletions
#[derive(Clone)]
pub struct DeletionScheduler {
    transport: Arc<dyn ChatTransport>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl DeletionScheduler {
    /// Create a scheduler that deletes through `transport`
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Delete `message_id` in `chat_id` once `delay` has elapsed.
    ///
    /// Best effort: a failed deletion is logged and never retried. Calls made
    /// after [`Self::shutdown`] are ignored.
    pub fn schedule(&self, chat_id: i64, message_id: i32, delay: Duration) {
        if self.cancel.is_cancelled() {
            debug!(chat_id, message_id, "Scheduler is shut down, not scheduling deletion");
            return;
        }

        let transport = Arc::clone(&self.transport);
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(chat_id, message_id, "Deletion cancelled by shutdown");
                }
                () = tokio::time::sleep(delay) => {
                    match transport.delete_message(chat_id, message_id).await {
                        Ok(()) => debug!(chat_id, message_id, "Deleted delivered message"),
                        Err(e) => warn!(chat_id, message_id, error = %e, "Failed to delete delivered message"),
                    }
                }
            }
        });
    }

    /// Number of deletions still waiting or running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel every outstanding deletion and wait for the tasks to exit
    pub async fn shutdown(&self) {
        info!(pending = self.pending(), "Shutting down deletion scheduler");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
