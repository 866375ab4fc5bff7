//! Row types shared by the SQLite and PostgreSQL backends
//!
//! Timestamps are stored as milliseconds since the Unix epoch.

use serde::{Deserialize, Serialize};

use super::payload::{JobRunStatus, OperationKind};

// ============================================================================
// Route / Request
// ============================================================================

/// Route row: one `(method, path)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRow {
    pub id: i64,
    pub method: String,
    pub path: String,
    pub created_at: i64,
}

/// Request row: one captured inbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRow {
    pub id: i64,
    pub route_id: i64,
    pub request_uuid: String,
    pub method: String,
    pub path: String,
    pub duration_ms: f64,
    pub status: i32,
    pub is_error: bool,
    pub label: Option<String>,
    pub occurred_at: i64,
}

// ============================================================================
// Job / JobRun
// ============================================================================

/// Job row: one `(name, queue)` identity; an absent queue is stored as `''`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub id: i64,
    pub name: String,
    pub queue: String,
    pub created_at: i64,
}

/// Job run row: one background job execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunRow {
    pub id: i64,
    pub job_id: i64,
    pub run_id: String,
    pub duration_ms: f64,
    pub status: JobRunStatus,
    pub error_class: Option<String>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub enqueued_at: Option<i64>,
    pub occurred_at: i64,
    pub adapter: Option<String>,
}

// ============================================================================
// Operation / Query
// ============================================================================

/// The unit of work an operation belongs to.
///
/// Exactly one owner per operation; storage enforces the same with a CHECK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "owner", content = "id", rename_all = "snake_case")]
pub enum OperationOwner {
    Request(i64),
    JobRun(i64),
}

impl OperationOwner {
    /// Split into `(request_id, job_run_id)` column values
    pub fn columns(&self) -> (Option<i64>, Option<i64>) {
        match *self {
            Self::Request(id) => (Some(id), None),
            Self::JobRun(id) => (None, Some(id)),
        }
    }
}

/// Operation row: one persisted sub-event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRow {
    pub id: i64,
    pub owner: OperationOwner,
    pub position: i32,
    pub operation_type: OperationKind,
    pub label: String,
    pub duration_ms: f64,
    pub codebase_location: Option<String>,
    pub occurred_at: i64,
    pub query_id: Option<i64>,
}

/// Query row: one fingerprinted statement shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRow {
    pub id: i64,
    pub normalized_sql: String,
    pub hashed_sql: String,
    pub created_at: i64,
}

// ============================================================================
// Results
// ============================================================================

/// Result of persisting one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PersistOutcome {
    /// A new record was written
    Created { id: i64, operations: usize },
    /// The unique id was already stored; nothing was written
    Duplicate,
}

/// Summary of a duplicate-query merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Groups of rows sharing one normalized statement
    pub groups: u64,
    /// Query rows deleted
    pub merged_rows: u64,
    /// Operations pointed at a surviving row
    pub operations_repointed: u64,
    /// Survivors whose digest was rewritten to the canonical value
    pub hashes_rewritten: u64,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.merged_rows == 0 && self.hashes_rewritten == 0
    }
}
