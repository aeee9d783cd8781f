use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use trailkeeper_core::{AppError, AppResult};
use trailkeeper_domain::AuditEvent;

use crate::audit_ports::AuditStore;

/// Work items delivered to the drain worker over the bounded queue.
pub(super) enum WorkerMessage {
    /// One validated event to accumulate.
    Event(AuditEvent),
    /// Drain the accumulator and acknowledge with the store result.
    Flush(oneshot::Sender<AppResult<()>>),
    /// Final flush, acknowledge, then exit.
    Shutdown(oneshot::Sender<()>),
}

/// Single-consumer drain loop.
///
/// The batch accumulator is owned exclusively by this task; producers only
/// ever touch the bounded queue.
pub(super) async fn run(
    mut receiver: mpsc::Receiver<WorkerMessage>,
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
    flush_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut batch: Vec<AuditEvent> = Vec::with_capacity(buffer_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so the timer measures
    // a full interval from startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(WorkerMessage::Event(event)) => {
                    batch.push(event);
                    if batch.len() >= buffer_size {
                        flush_or_drop(store.as_ref(), &mut batch).await;
                    }
                }
                Some(WorkerMessage::Flush(ack)) => {
                    let result = write_batch(store.as_ref(), &mut batch).await;
                    let _ = ack.send(result);
                }
                Some(WorkerMessage::Shutdown(ack)) => {
                    flush_or_drop(store.as_ref(), &mut batch).await;
                    let _ = ack.send(());
                    break;
                }
                None => {
                    flush_or_drop(store.as_ref(), &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush_or_drop(store.as_ref(), &mut batch).await;
            }
            () = shutdown.cancelled() => {
                debug!("ingestion worker observed shutdown signal");
                drain_pending(&mut receiver, &mut batch);
                flush_or_drop(store.as_ref(), &mut batch).await;
                break;
            }
        }
    }
}

/// Writes the accumulated batch; an empty accumulator is a no-op.
async fn write_batch(store: &dyn AuditStore, batch: &mut Vec<AuditEvent>) -> AppResult<()> {
    if batch.is_empty() {
        return Ok(());
    }

    store.create_event_batch(std::mem::take(batch)).await
}

/// Background-path flush: failures are logged with enough context to
/// identify the lost batch, and the batch is dropped rather than requeued.
/// In-process retry would risk unbounded memory growth during a store outage.
async fn flush_or_drop(store: &dyn AuditStore, batch: &mut Vec<AuditEvent>) {
    let dropped_events = batch.len();
    let tenants = batch
        .iter()
        .map(|event| event.tenant_id)
        .collect::<HashSet<_>>()
        .len();

    if let Err(error) = write_batch(store, batch).await {
        warn!(
            dropped_events,
            tenants,
            error = %error,
            "audit batch flush failed; batch dropped"
        );
    }
}

/// Moves whatever is still sitting in the queue into the accumulator so the
/// final flush covers it; outstanding control messages are answered.
fn drain_pending(receiver: &mut mpsc::Receiver<WorkerMessage>, batch: &mut Vec<AuditEvent>) {
    while let Ok(message) = receiver.try_recv() {
        match message {
            WorkerMessage::Event(event) => batch.push(event),
            WorkerMessage::Flush(ack) => {
                let _ = ack.send(Err(AppError::Conflict(
                    "ingestion worker is shutting down".to_owned(),
                )));
            }
            WorkerMessage::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
