//! Best-effort activity log.
//!
//! Callers hand events to an [`ActivitySink`] and never wait for them. The channel sink
//! buffers events in a bounded queue drained by one writer task. When the queue is full
//! or the writer is gone the event is dropped, counted and logged at `warn`; a failed
//! store write is counted and logged the same way. Nothing is ever surfaced to the
//! operation that produced the event.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::ActivityLog;
use crate::services::metrics::record_activity;
use crate::services::store::Store;

pub trait ActivitySink: Send + Sync {
    /// Queue an event. Never blocks and never fails.
    fn record(&self, entry: ActivityLog);
}

enum Command {
    Record(Box<ActivityLog>),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct ChannelActivitySink {
    tx: mpsc::Sender<Command>,
}

impl ChannelActivitySink {
    /// Start the writer task. It exits once every sink clone has been dropped.
    pub fn spawn(store: Arc<dyn Store>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Record(entry) => match store.insert_activity(&entry).await {
                        Ok(()) => {
                            record_activity("written");
                            debug!(
                                order_id = %entry.order_id,
                                activity_type = entry.activity_type.as_str(),
                                "Activity recorded"
                            );
                        }
                        Err(e) => {
                            record_activity("failed");
                            warn!(
                                order_id = %entry.order_id,
                                activity_type = entry.activity_type.as_str(),
                                error = %e,
                                "Failed to write activity log entry"
                            );
                        }
                    },
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        (Self { tx }, handle)
    }

    /// Wait until every event queued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

impl ActivitySink for ChannelActivitySink {
    fn record(&self, entry: ActivityLog) {
        match self.tx.try_send(Command::Record(Box::new(entry))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(Command::Record(entry))) => {
                record_activity("dropped_full");
                warn!(
                    order_id = %entry.order_id,
                    activity_type = entry.activity_type.as_str(),
                    "Activity queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                record_activity("dropped_closed");
                warn!("Activity writer stopped, event dropped");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                record_activity("dropped_full");
            }
        }
    }
}
