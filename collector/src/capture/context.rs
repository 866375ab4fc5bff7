//! Per-unit-of-work capture context
//!
//! A [`CaptureContext`] is installed as a task-local for the duration of one
//! request or job. Instrumentation points call [`record_operation`] (or
//! [`time_operation`]) and the event lands in whichever context the current
//! task belongs to. Concurrent units of work never see each other's events.
//!
//! Sub-tasks spawned by the host do not inherit task-locals; pass
//! [`CaptureContext::current`] into them and re-enter with
//! [`CaptureContext::scope`].

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;

use super::guard::is_suppressed;
use crate::data::types::{OperationEvent, OperationKind};
use crate::utils::time::elapsed_ms;

tokio::task_local! {
    static CURRENT: Arc<CaptureContext>;
}

/// Ordered scratch list of operations for one unit of work
#[derive(Debug, Default)]
pub struct CaptureContext {
    operations: Mutex<Vec<OperationEvent>>,
    closed: AtomicBool,
}

impl CaptureContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Context of the current task, if any
    pub fn current() -> Option<Arc<Self>> {
        CURRENT.try_with(Arc::clone).ok()
    }

    /// Run a future with this context installed
    pub async fn scope<F: Future>(self: Arc<Self>, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// Append an event; returns false once the context is closed or while
    /// capture is suppressed
    pub fn record(&self, event: OperationEvent) -> bool {
        if self.closed.load(Ordering::Acquire) || is_suppressed() {
            return false;
        }
        self.operations.lock().push(event);
        true
    }

    pub fn len(&self) -> usize {
        self.operations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the context and take its events in capture order
    ///
    /// Late writers holding a clone of the context are rejected from here on,
    /// so the returned list is never mutated afterwards.
    pub fn close(&self) -> Vec<OperationEvent> {
        self.closed.store(true, Ordering::Release);
        std::mem::take(&mut *self.operations.lock())
    }
}

/// Closes a context on drop so every exit path tears it down
pub(crate) struct ContextTeardown {
    context: Arc<CaptureContext>,
}

impl ContextTeardown {
    pub(crate) fn new(context: Arc<CaptureContext>) -> Self {
        Self { context }
    }

    /// Close now and hand back the captured events
    pub(crate) fn finish(self) -> Vec<OperationEvent> {
        self.context.close()
    }
}

impl Drop for ContextTeardown {
    fn drop(&mut self) {
        if !self.context.is_closed() {
            self.context.close();
        }
    }
}

/// Record one sub-operation into the current unit of work
///
/// Returns false when no capture is active (ignored route, capture disabled,
/// or called outside any unit of work).
pub fn record_operation(event: OperationEvent) -> bool {
    match CaptureContext::current() {
        Some(context) => context.record(event),
        None => false,
    }
}

/// Time an async sub-operation and record it with the caller's location
#[track_caller]
pub fn time_operation<F>(
    kind: OperationKind,
    label: impl Into<String>,
    fut: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let location = Location::caller();
    let label = label.into();
    async move {
        let occurred_at = Utc::now();
        let start = Instant::now();
        let output = fut.await;
        let event = OperationEvent::new(kind, label, elapsed_ms(start))
            .with_occurred_at(occurred_at)
            .with_location(format!("{}:{}", location.file(), location.line()));
        record_operation(event);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::guard::suppressed;

    fn sql(label: &str) -> OperationEvent {
        OperationEvent::new(OperationKind::Sql, label, 1.0)
    }

    #[tokio::test]
    async fn test_record_outside_scope_is_noop() {
        assert!(CaptureContext::current().is_none());
        assert!(!record_operation(sql("SELECT 1")));
    }

    #[tokio::test]
    async fn test_records_in_capture_order() {
        let context = CaptureContext::new();
        Arc::clone(&context)
            .scope(async {
                assert!(record_operation(sql("SELECT 1")));
                assert!(record_operation(sql("SELECT 2")));
            })
            .await;

        let events = context.close();
        let labels: Vec<_> = events.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["SELECT 1", "SELECT 2"]);
    }

    #[tokio::test]
    async fn test_closed_context_rejects_late_writes() {
        let context = CaptureContext::new();
        assert!(context.record(sql("SELECT 1")));
        let snapshot = context.close();
        assert!(!context.record(sql("SELECT 2")));
        assert_eq!(snapshot.len(), 1);
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_suppressed_records_dropped() {
        let context = CaptureContext::new();
        Arc::clone(&context)
            .scope(suppressed(async {
                assert!(!record_operation(sql("SELECT 1")));
            }))
            .await;
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_contexts_isolated() {
        let mut handles = Vec::new();
        for i in 0..8 {
            handles.push(tokio::spawn(async move {
                let context = CaptureContext::new();
                Arc::clone(&context)
                    .scope(async move {
                        for _ in 0..=i {
                            record_operation(sql("SELECT 1"));
                            tokio::task::yield_now().await;
                        }
                    })
                    .await;
                (i, context.close().len())
            }));
        }
        for handle in handles {
            let (i, count) = handle.await.unwrap();
            assert_eq!(count, i + 1);
        }
    }

    #[tokio::test]
    async fn test_teardown_closes_on_drop() {
        let context = CaptureContext::new();
        {
            let _teardown = ContextTeardown::new(Arc::clone(&context));
            context.record(sql("SELECT 1"));
        }
        assert!(context.is_closed());
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_time_operation_records_location() {
        let context = CaptureContext::new();
        let value = Arc::clone(&context)
            .scope(time_operation(OperationKind::CacheRead, "users/1", async { 42 }))
            .await;
        assert_eq!(value, 42);

        let events = context.close();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, OperationKind::CacheRead);
        let location = events[0].codebase_location.as_deref().unwrap();
        assert!(location.contains("context.rs"));
    }

    #[tokio::test]
    async fn test_explicit_handle_reentered_in_subtask() {
        let context = CaptureContext::new();
        Arc::clone(&context)
            .scope(async {
                let handle = CaptureContext::current().unwrap();
                tokio::spawn(handle.scope(async {
                    record_operation(sql("SELECT from_subtask"));
                }))
                .await
                .unwrap();
            })
            .await;
        assert_eq!(context.close().len(), 1);
    }
}
