use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use trailkeeper_core::{AppError, AppResult};
use trailkeeper_domain::{AuditEvent, AuditEventInput};

use crate::audit_ports::AuditStore;
use self::worker::WorkerMessage;

mod queries;
mod worker;

/// Configuration for the buffered ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Capacity of the bounded producer queue; the sole backpressure control.
    pub queue_capacity: usize,
    /// Accumulated events that trigger an immediate batch flush.
    pub buffer_size: usize,
    /// Interval at which a partially filled accumulator is flushed anyway.
    pub flush_interval: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            buffer_size: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

impl IngestionConfig {
    fn validate(&self) -> AppResult<()> {
        if self.queue_capacity == 0 {
            return Err(AppError::Validation(
                "queue_capacity must be greater than zero".to_owned(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(AppError::Validation(
                "buffer_size must be greater than zero".to_owned(),
            ));
        }

        if self.flush_interval.is_zero() {
            return Err(AppError::Validation(
                "flush_interval must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Buffered, non-blocking front-end for audit event ingestion.
///
/// Producers enqueue validated events onto a bounded queue; a single
/// background worker accumulates them and writes batches to the store when
/// the accumulator fills or a recurring timer fires. A full queue degrades
/// the caller to a synchronous single write instead of dropping the event.
pub struct IngestionService {
    store: Arc<dyn AuditStore>,
    sender: mpsc::Sender<WorkerMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl IngestionService {
    /// Validates the configuration and spawns the background drain worker.
    ///
    /// The worker exits on [`IngestionService::close`] or when the provided
    /// cancellation token fires; either way it attempts one final flush of
    /// accumulated events first.
    pub fn start(
        store: Arc<dyn AuditStore>,
        config: IngestionConfig,
        shutdown: CancellationToken,
    ) -> AppResult<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let worker = tokio::spawn(worker::run(
            receiver,
            Arc::clone(&store),
            config.buffer_size,
            config.flush_interval,
            shutdown,
        ));

        Ok(Self {
            store,
            sender,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        })
    }

    /// Validates and enqueues one event without blocking the caller.
    ///
    /// When the queue is full the event is written synchronously instead:
    /// slow storage adds latency on this call path but never silently loses
    /// an event under load.
    pub async fn log_event(&self, input: AuditEventInput) -> AppResult<()> {
        self.ensure_open()?;
        let event = AuditEvent::new(input)?;

        match self.sender.try_reserve() {
            Ok(permit) => {
                permit.send(WorkerMessage::Event(event));
                Ok(())
            }
            Err(TrySendError::Full(())) => self.store.create_event(event).await,
            Err(TrySendError::Closed(())) => Err(AppError::Conflict(
                "ingestion worker is no longer running".to_owned(),
            )),
        }
    }

    /// Validates and writes one event directly through the store.
    pub async fn log_event_sync(&self, input: AuditEventInput) -> AppResult<()> {
        self.ensure_open()?;
        let event = AuditEvent::new(input)?;
        self.store.create_event(event).await
    }

    /// Validates every input, then writes the whole batch in one store call.
    ///
    /// Any invalid entry rejects the entire batch before the store is touched.
    pub async fn log_event_batch(&self, inputs: Vec<AuditEventInput>) -> AppResult<()> {
        self.ensure_open()?;
        let events = inputs
            .into_iter()
            .map(AuditEvent::new)
            .collect::<AppResult<Vec<_>>>()?;

        if events.is_empty() {
            return Ok(());
        }

        self.store.create_event_batch(events).await
    }

    /// Drains all currently queued events to the store and waits for the
    /// write to complete. The service keeps running afterwards.
    pub async fn flush(&self) -> AppResult<()> {
        self.ensure_open()?;

        let (ack, done) = oneshot::channel();
        self.sender
            .send(WorkerMessage::Flush(ack))
            .await
            .map_err(|_| {
                AppError::Conflict("ingestion worker is no longer running".to_owned())
            })?;

        done.await.map_err(|_| {
            AppError::Internal("ingestion worker dropped the flush acknowledgement".to_owned())
        })?
    }

    /// Stops intake, flushes any remaining queued events and waits for the
    /// worker to exit. Idempotent; mutating calls after close are rejected.
    pub async fn close(&self) -> AppResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (ack, done) = oneshot::channel();
        if self
            .sender
            .send(WorkerMessage::Shutdown(ack))
            .await
            .is_ok()
        {
            // The worker may already be gone when the parent token fired.
            let _ = done.await;
        }

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.await.map_err(|error| {
                AppError::Internal(format!("ingestion worker task failed: {error}"))
            })?;
        }

        Ok(())
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Conflict(
                "ingestion service is closed".to_owned(),
            ));
        }

        Ok(())
    }
}
