//! Domain logic for the capture-and-persist pipeline
//!
//! - `tracker` - Persistence pipeline (queue, workers, retry, diagnostics)
//! - `maintenance` - Recurring query dedup merge

pub mod maintenance;
pub mod tracker;

pub use maintenance::QueryMergeTask;
pub use tracker::{DiagnosticSink, Tracker, TrackerOptions, TracingSink};
