//! Tracker error types

use thiserror::Error;

use crate::data::DataError;
use crate::data::types::PayloadError;

/// Why a payload was not persisted
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid payload: {0}")]
    Validation(#[from] PayloadError),

    #[error("Storage error: {0}")]
    Storage(#[from] DataError),

    #[error("Tracker queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Tracker is shut down")]
    Closed,

    #[error("Persistence panicked: {0}")]
    Panicked(String),
}

/// One dropped payload, as handed to the diagnostic sink
#[derive(Debug)]
pub struct PersistFailure {
    /// `request` or `job_run`
    pub kind: &'static str,
    pub unique_id: String,
    /// Storage attempts made before giving up (0 when never attempted)
    pub attempts: u32,
    pub error: TrackerError,
}
