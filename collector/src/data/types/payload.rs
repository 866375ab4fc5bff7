//! Tracking payloads handed from the interception layer to the tracker
//!
//! A payload is the complete, self-contained description of one captured unit
//! of work: its timing, outcome and the ordered sub-operations recorded while
//! it ran.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Operation kinds
// ============================================================================

/// Type tag of a captured sub-operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Sql,
    Controller,
    Template,
    Partial,
    Layout,
    Collection,
    CacheRead,
    CacheWrite,
    Http,
    Job,
    Mailer,
    Storage,
}

impl OperationKind {
    pub const ALL: [OperationKind; 12] = [
        Self::Sql,
        Self::Controller,
        Self::Template,
        Self::Partial,
        Self::Layout,
        Self::Collection,
        Self::CacheRead,
        Self::CacheWrite,
        Self::Http,
        Self::Job,
        Self::Mailer,
        Self::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Controller => "controller",
            Self::Template => "template",
            Self::Partial => "partial",
            Self::Layout => "layout",
            Self::Collection => "collection",
            Self::CacheRead => "cache_read",
            Self::CacheWrite => "cache_write",
            Self::Http => "http",
            Self::Job => "job",
            Self::Mailer => "mailer",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PayloadError::UnknownValue {
                field: "operation_type",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Job run status
// ============================================================================

/// Outcome of one background job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    Success,
    Failed,
    Retried,
    Discarded,
}

impl JobRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Retried => "retried",
            Self::Discarded => "discarded",
        }
    }
}

impl fmt::Display for JobRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobRunStatus {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "retried" => Ok(Self::Retried),
            "discarded" => Ok(Self::Discarded),
            _ => Err(PayloadError::UnknownValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} must be a finite, non-negative number of milliseconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },

    #[error("Unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: String },
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        return Err(PayloadError::EmptyField(field));
    }
    Ok(())
}

fn require_duration(field: &'static str, value: f64) -> Result<(), PayloadError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PayloadError::InvalidDuration { field, value });
    }
    Ok(())
}

// ============================================================================
// Operation event
// ============================================================================

/// One sub-event recorded inside a unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEvent {
    pub kind: OperationKind,
    pub label: String,
    pub duration_ms: f64,
    pub codebase_location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl OperationEvent {
    /// Create an event that occurred now
    pub fn new(kind: OperationKind, label: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            kind,
            label: label.into(),
            duration_ms,
            codebase_location: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.codebase_location = Some(location.into());
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        require_duration("operation.duration_ms", self.duration_ms)
    }
}

// ============================================================================
// Request payload
// ============================================================================

/// Captured inbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub method: String,
    pub path: String,
    pub duration_ms: f64,
    pub status: u16,
    pub is_error: bool,
    pub unique_id: String,
    pub label: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub operations: Vec<OperationEvent>,
}

impl RequestPayload {
    /// Build a payload; `is_error` is derived from the status (>= 500)
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        duration_ms: f64,
        unique_id: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            duration_ms,
            status,
            is_error: status >= 500,
            unique_id: unique_id.into(),
            label: None,
            occurred_at: Utc::now(),
            operations: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn with_operations(mut self, operations: Vec<OperationEvent>) -> Self {
        self.operations = operations;
        self
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        require_non_empty("method", &self.method)?;
        require_non_empty("path", &self.path)?;
        require_non_empty("unique_id", &self.unique_id)?;
        require_duration("duration_ms", self.duration_ms)?;
        self.operations.iter().try_for_each(OperationEvent::validate)
    }
}

// ============================================================================
// Job run payload
// ============================================================================

/// Captured background job execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunPayload {
    pub job_name: String,
    pub queue: Option<String>,
    pub run_id: String,
    pub duration_ms: f64,
    pub status: JobRunStatus,
    pub error_class: Option<String>,
    pub error_message: Option<String>,
    pub attempts: u32,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
    pub adapter: Option<String>,
    pub operations: Vec<OperationEvent>,
}

impl JobRunPayload {
    pub fn new(
        job_name: impl Into<String>,
        run_id: impl Into<String>,
        status: JobRunStatus,
        duration_ms: f64,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            queue: None,
            run_id: run_id.into(),
            duration_ms,
            status,
            error_class: None,
            error_message: None,
            attempts: 1,
            enqueued_at: None,
            occurred_at: Utc::now(),
            adapter: None,
            operations: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        require_non_empty("job_name", &self.job_name)?;
        require_non_empty("run_id", &self.run_id)?;
        require_duration("duration_ms", self.duration_ms)?;
        self.operations.iter().try_for_each(OperationEvent::validate)
    }
}

// ============================================================================
// Tracking payload
// ============================================================================

/// Anything the tracker can persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingPayload {
    Request(RequestPayload),
    JobRun(JobRunPayload),
}

impl TrackingPayload {
    /// Idempotency key of the unit of work
    pub fn unique_id(&self) -> &str {
        match self {
            Self::Request(r) => &r.unique_id,
            Self::JobRun(j) => &j.run_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::JobRun(_) => "job_run",
        }
    }

    pub fn operations(&self) -> &[OperationEvent] {
        match self {
            Self::Request(r) => &r.operations,
            Self::JobRun(j) => &j.operations,
        }
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        match self {
            Self::Request(r) => r.validate(),
            Self::JobRun(j) => j.validate(),
        }
    }
}

impl From<RequestPayload> for TrackingPayload {
    fn from(payload: RequestPayload) -> Self {
        Self::Request(payload)
    }
}

impl From<JobRunPayload> for TrackingPayload {
    fn from(payload: JobRunPayload) -> Self {
        Self::JobRun(payload)
    }
}
