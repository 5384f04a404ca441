//! Event ingestion.
//!
//! One background task owns the write side of the store: it drains the
//! channel fed by an [`EventSource`] and applies every event in arrival
//! order.

mod docker;

pub use docker::{DockerEventSource, parse_event_line, state_for_action, state_for_status};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::{ContainerEvent, ContainerStore};

/// Channel capacity between a source and the ingester.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Delay before a failed or finished source is started again.
pub const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Producer of container lifecycle events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Push events into `tx` until the source ends or `tx` is closed.
    async fn run(&self, tx: mpsc::Sender<ContainerEvent>) -> anyhow::Result<()>;
}

/// Apply events to the store until every sender is dropped.
pub async fn run_ingester(store: ContainerStore, mut rx: mpsc::Receiver<ContainerEvent>) {
    info!("Ingester: waiting for container events");

    while let Some(event) = rx.recv().await {
        if store.apply(&event) {
            debug!(
                container_id = %event.id,
                state = %event.state,
                pid = ?event.pid,
                "Applied container event"
            );
        } else {
            debug!(container_id = %event.id, state = %event.state, "Dropped stale container event");
        }
    }

    info!("Ingester: event channel closed");
}

/// Keep `source` running, restarting it after [`RESTART_DELAY`].
///
/// The task ends once the receiving side of `tx` is gone.
pub fn spawn_source(
    source: Arc<dyn EventSource>,
    tx: mpsc::Sender<ContainerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match source.run(tx.clone()).await {
                Ok(()) => info!(source = source.name(), "Event source ended, restarting"),
                Err(e) => {
                    error!(source = source.name(), error = %e, "Event source failed, restarting")
                }
            }
            if tx.is_closed() {
                break;
            }
            tokio::time::sleep(RESTART_DELAY).await;
        }
    })
}
