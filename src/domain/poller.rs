//! Per-service polling tasks and the single status-event consumer.
//!
//! Each registered service gets one task that repeatedly computes a status
//! snapshot and emits it over the bounded event channel (producers block on
//! a full channel rather than dropping). Exactly one consumer merges events
//! back into the registry; only the consumer ever replaces a service's
//! status, so polling tasks never mutate shared state directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::registry::{Registry, StatusEvent};

/// Spawn the polling task for one service generation.
pub fn spawn(registry: Arc<Registry>, service: String, epoch: u64) {
    tokio::spawn(poll_loop(registry, service, epoch));
}

/// Merge status events into the registry until every sender is gone.
/// Events for services that no longer exist are dropped silently.
pub async fn consume(registry: Arc<Registry>, mut events: mpsc::Receiver<StatusEvent>) {
    while let Some(event) = events.recv().await {
        if !registry.apply_status(&event.service, event.status).await {
            debug!(service = %event.service, "dropping status event for unknown service");
        }
    }
}

async fn poll_loop(registry: Arc<Registry>, service: String, epoch: u64) {
    // Best-effort start for bound nodes flagged start-immediately.
    for node in registry.start_flagged(&service).await {
        if let Err(err) = registry.start_service(&node, &service).await {
            warn!(service = %service, node = %node, error = %err, "start-immediately failed");
        }
    }

    let events = registry.event_sender();
    loop {
        let Some((status, interval)) = registry.poll_once(&service, epoch).await else {
            debug!(service = %service, "polling task terminating");
            return;
        };
        if events
            .send(StatusEvent {
                service: service.clone(),
                status,
            })
            .await
            .is_err()
        {
            // Consumer gone: the daemon is shutting down.
            return;
        }
        if interval <= 0 {
            debug!(service = %service, "one-shot poll complete");
            return;
        }
        tokio::time::sleep(Duration::from_secs(interval as u64)).await;
    }
}
