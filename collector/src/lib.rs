//! In-process performance telemetry collector
//!
//! Wraps request handlers and background jobs, records the operations they
//! perform, and persists one aggregated record per unit of work.

pub mod api;
pub mod app;
pub mod capture;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
