//! Shared data types for the SQLite and PostgreSQL backends
//!
//! `payload` holds what the capture layer produces, `rows` holds what the
//! repositories read and write.

mod payload;
mod rows;

pub use payload::{
    JobRunPayload, JobRunStatus, OperationEvent, OperationKind, PayloadError, RequestPayload,
    TrackingPayload,
};

pub use rows::{
    JobRow, JobRunRow, MergeReport, OperationOwner, OperationRow, PersistOutcome, QueryRow,
    RequestRow, RouteRow,
};
