//! Persistence pipeline
//!
//! The [`Tracker`] turns captured payloads into stored records. `submit`
//! never fails: in async mode payloads go onto a bounded queue drained by a
//! fixed pool of workers; in sync mode they are persisted inline. Transient
//! storage errors are retried with exponential backoff, and every payload the
//! tracker gives up on is reported to the [`DiagnosticSink`] exactly once.

mod error;
mod sink;
mod stats;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{PersistFailure, TrackerError};
pub use sink::{DiagnosticSink, TracingSink};
pub use stats::{TrackerStats, TrackerStatsSnapshot};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::capture::{is_suppressed, panic_message, suppressed};
use crate::core::config::TrackerConfig;
use crate::data::types::{PersistOutcome, TrackingPayload};
use crate::data::{DataError, TelemetryRepository};
use crate::utils::retry::{RetryPolicy, retry_transient};

/// Tracker dispatch settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOptions {
    /// Persist on background workers instead of inline
    pub async_mode: bool,
    pub queue_capacity: usize,
    pub workers: usize,
    pub retry: RetryPolicy,
    /// Time allowed for draining the queue on shutdown
    pub shutdown_timeout: Duration,
}

impl TrackerOptions {
    pub fn from_config(config: &TrackerConfig, async_mode: bool) -> Self {
        Self {
            async_mode,
            queue_capacity: config.queue_capacity.max(1),
            workers: config.workers.max(1),
            retry: config.retry_policy(),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        }
    }

    /// Inline persistence with millisecond backoff
    #[cfg(test)]
    pub fn sync_for_test() -> Self {
        Self {
            async_mode: false,
            retry: RetryPolicy::new(3, 1),
            ..Self::from_config(&TrackerConfig::default(), false)
        }
    }

    #[cfg(test)]
    pub fn async_for_test(queue_capacity: usize, workers: usize) -> Self {
        Self {
            async_mode: true,
            queue_capacity,
            workers,
            retry: RetryPolicy::new(3, 1),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

struct TrackerInner {
    repository: Arc<dyn TelemetryRepository>,
    sink: Arc<dyn DiagnosticSink>,
    options: TrackerOptions,
    sender: mpsc::Sender<TrackingPayload>,
    receiver: Mutex<Option<mpsc::Receiver<TrackingPayload>>>,
    stats: TrackerStats,
}

/// Persistence pipeline handle (cheap to clone)
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        sink: Arc<dyn DiagnosticSink>,
        options: TrackerOptions,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(options.queue_capacity.max(1));
        Self {
            inner: Arc::new(TrackerInner {
                repository,
                sink,
                options,
                sender,
                receiver: Mutex::new(Some(receiver)),
                stats: TrackerStats::default(),
            }),
        }
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.inner.options
    }

    pub fn stats(&self) -> TrackerStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Hand a payload to the pipeline
    ///
    /// Returns once the payload is queued (async mode) or persisted (sync
    /// mode). Failures are reported to the sink, never to the caller.
    pub async fn submit(&self, payload: TrackingPayload) {
        if is_suppressed() {
            self.inner.stats.incr_suppressed();
            tracing::trace!(unique_id = %payload.unique_id(), "Dropping self-captured payload");
            return;
        }
        self.inner.stats.incr_submitted();

        if !self.inner.options.async_mode {
            self.persist_reporting(payload).await;
            return;
        }

        match self.inner.sender.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => {
                self.inner.stats.incr_dropped();
                let capacity = self.inner.options.queue_capacity;
                self.report(&payload, 0, TrackerError::QueueFull { capacity });
            }
            Err(TrySendError::Closed(payload)) => {
                self.inner.stats.incr_dropped();
                self.report(&payload, 0, TrackerError::Closed);
            }
        }
    }

    /// Persist one payload and convert any failure into a sink report
    ///
    /// This is the single boundary where pipeline errors stop: the outcome is
    /// returned for callers that care, `None` meaning the payload was dropped.
    pub async fn persist_reporting(&self, payload: TrackingPayload) -> Option<PersistOutcome> {
        match self.persist(&payload).await {
            Ok((outcome, attempts)) => {
                match outcome {
                    PersistOutcome::Created { id, operations } => {
                        self.inner.stats.incr_persisted();
                        tracing::debug!(
                            kind = payload.kind(),
                            unique_id = %payload.unique_id(),
                            id,
                            operations,
                            attempts,
                            "Persisted unit of work"
                        );
                    }
                    PersistOutcome::Duplicate => {
                        self.inner.stats.incr_duplicates();
                        tracing::debug!(
                            kind = payload.kind(),
                            unique_id = %payload.unique_id(),
                            "Unit of work already stored"
                        );
                    }
                }
                Some(outcome)
            }
            Err((error, attempts)) => {
                self.inner.stats.incr_failed();
                self.report(&payload, attempts, error);
                None
            }
        }
    }

    async fn persist(
        &self,
        payload: &TrackingPayload,
    ) -> Result<(PersistOutcome, u32), (TrackerError, u32)> {
        payload
            .validate()
            .map_err(|e| (TrackerError::Validation(e), 0))?;

        let repository = self.inner.repository.as_ref();
        let work = suppressed(retry_transient(
            self.inner.options.retry,
            DataError::is_transient,
            || persist_once(repository, payload),
        ));

        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err((e, attempts))) => Err((TrackerError::Storage(e), attempts)),
            Err(panic) => Err((TrackerError::Panicked(panic_message(&*panic)), 1)),
        }
    }

    fn report(&self, payload: &TrackingPayload, attempts: u32, error: TrackerError) {
        let failure = PersistFailure {
            kind: payload.kind(),
            unique_id: payload.unique_id().to_string(),
            attempts,
            error,
        };
        self.inner.sink.report(&failure);
    }

    /// Storage liveness; false on any failure
    pub async fn healthy(&self) -> bool {
        match suppressed(self.inner.repository.ping()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Storage health check failed");
                false
            }
        }
    }

    /// Start the background dispatcher (async mode only)
    ///
    /// Returns `None` in sync mode or if the dispatcher is already running.
    /// On shutdown the queue is closed and drained within the configured
    /// timeout; payloads still queued after that are lost.
    pub fn start(&self, mut shutdown_rx: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        if !self.inner.options.async_mode {
            return None;
        }
        let mut rx = self.inner.receiver.lock().take()?;
        let tracker = self.clone();
        let workers = Arc::new(Semaphore::new(self.inner.options.workers.max(1)));

        Some(tokio::spawn(async move {
            let mut tasks = JoinSet::new();

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("Tracker received shutdown, draining...");
                            break;
                        }
                    }
                    Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                        log_worker_result(result);
                    }
                    received = rx.recv() => match received {
                        Some(payload) => tracker.dispatch(&mut tasks, &workers, payload).await,
                        None => break,
                    },
                }
            }

            rx.close();
            let timeout = tracker.inner.options.shutdown_timeout;
            let drained = tokio::time::timeout(timeout, async {
                while let Some(payload) = rx.recv().await {
                    tracker.dispatch(&mut tasks, &workers, payload).await;
                }
                while let Some(result) = tasks.join_next().await {
                    log_worker_result(result);
                }
            })
            .await;

            if drained.is_err() {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    in_flight = tasks.len(),
                    "Tracker drain timed out, abandoning queued payloads"
                );
                tasks.abort_all();
            }
            tracing::debug!("Tracker shutdown complete");
        }))
    }

    async fn dispatch(
        &self,
        tasks: &mut JoinSet<()>,
        workers: &Arc<Semaphore>,
        payload: TrackingPayload,
    ) {
        let Ok(permit) = Arc::clone(workers).acquire_owned().await else {
            return;
        };
        let tracker = self.clone();
        tasks.spawn(async move {
            let _permit = permit;
            tracker.persist_reporting(payload).await;
        });
    }
}

async fn persist_once(
    repository: &dyn TelemetryRepository,
    payload: &TrackingPayload,
) -> Result<PersistOutcome, DataError> {
    match payload {
        TrackingPayload::Request(request) => repository.persist_request(request).await,
        TrackingPayload::JobRun(run) => repository.persist_job_run(run).await,
    }
}

fn log_worker_result(result: Result<(), JoinError>) {
    if let Err(e) = result
        && e.is_panic()
    {
        tracing::warn!("Tracker worker panicked: {}", e);
    }
}
