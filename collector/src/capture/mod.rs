//! Capture layer
//!
//! Interception of units of work (inbound requests and job executions), the
//! task-local capture context that collects their sub-operations, ignore
//! rules, and the recursion guard that keeps the collector from capturing
//! itself.

mod context;
mod guard;
mod ignore;
mod job;
mod request;

pub use context::{CaptureContext, record_operation, time_operation};
pub use guard::{is_suppressed, suppressed};
pub use ignore::{IgnoreRule, IgnoreRules};
pub use job::{JobDescriptor, JobInterceptor};
pub use request::{
    CaptureSettings, CapturedResponse, RequestDescriptor, RequestInterceptor, RouteLabel,
};

use std::any::Any;

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
