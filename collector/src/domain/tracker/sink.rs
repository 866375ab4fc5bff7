//! Diagnostic sink for dropped payloads

use super::error::PersistFailure;

/// Receives exactly one report per payload the tracker gives up on
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, failure: &PersistFailure);
}

/// Default sink: logs at `error` level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, failure: &PersistFailure) {
        tracing::error!(
            kind = failure.kind,
            unique_id = %failure.unique_id,
            attempts = failure.attempts,
            error = %failure.error,
            "Dropped telemetry payload"
        );
    }
}
