//! Recursion guard
//!
//! Work running inside [`suppressed`] is never captured: the tracker wraps its
//! own persistence in it so storage activity cannot feed back into capture.
//! The flag is task-local and is restored when the scope's future completes
//! or is dropped, including on panic.

use std::future::Future;

tokio::task_local! {
    static SELF_CAPTURE: ();
}

/// Whether the current task is inside a self-capture scope
pub fn is_suppressed() -> bool {
    SELF_CAPTURE.try_with(|_| ()).is_ok()
}

/// Run a future with capture suppressed
pub async fn suppressed<F: Future>(fut: F) -> F::Output {
    SELF_CAPTURE.scope((), fut).await
}
