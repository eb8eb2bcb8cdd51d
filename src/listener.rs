use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::reg::DataEvent;

/// Reacts to registry changes under a job's root.
///
/// Handlers must decide from the state they re-read at call time, not from
/// the history of events: events for different paths may arrive out of order,
/// twice, or not at all.
#[async_trait]
pub trait DataListener: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn data_changed(&self, event: &DataEvent) -> Result<()>;
}

/// Run `listener` for every event under `root` until `cancel` fires or the
/// event stream closes. Each listener gets its own task, so one slow handler
/// does not hold up the others.
pub fn spawn_listener(
    mut events: broadcast::Receiver<DataEvent>,
    root: String,
    listener: Arc<dyn DataListener>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let prefix = format!("{}/", root);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(listener = listener.name(), root = %root, "Listener stopped");
                    break;
                }
                received = events.recv() => {
                    match received {
                        Ok(event) => {
                            if event.path != root && !event.path.starts_with(&prefix) {
                                continue;
                            }
                            if let Err(e) = listener.data_changed(&event).await {
                                tracing::warn!(
                                    listener = listener.name(),
                                    path = %event.path,
                                    kind = %event.kind,
                                    error = %e,
                                    "Listener failed to handle event"
                                );
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(listener = listener.name(), skipped, "Listener lagged, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    })
}
