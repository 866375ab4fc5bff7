//! Query dedup maintenance task
//!
//! Runs `merge_duplicate_queries` on an interval for stores that receive
//! rows written outside the tracker (imports, older collector versions).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::capture::suppressed;
use crate::data::types::MergeReport;
use crate::data::{DataError, TelemetryRepository};

pub struct QueryMergeTask {
    repository: Arc<dyn TelemetryRepository>,
}

impl QueryMergeTask {
    pub fn new(repository: Arc<dyn TelemetryRepository>) -> Self {
        Self { repository }
    }

    /// Merge once
    pub async fn run_once(&self) -> Result<MergeReport, DataError> {
        suppressed(self.repository.merge_duplicate_queries()).await
    }

    /// Start the recurring merge; `None` when the interval is 0 (disabled)
    pub fn start(
        self,
        interval_minutes: u64,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if interval_minutes == 0 {
            tracing::debug!("Query merge task disabled");
            return None;
        }
        let period = Duration::from_secs(interval_minutes.saturating_mul(60));

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("Query merge task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::warn!("Query merge failed: {}", e);
                        }
                    }
                }
            }
        }))
    }
}
