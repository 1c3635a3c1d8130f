//! Human-readable names for units of work.
//!
//! The session runtime spawns several tasks per live session (the render
//! loop plus one short-lived task per delivered event) and tags every log
//! line with the name of the task that emitted it.  Tokio has no stable way
//! to name a task, so the name travels in a task-local set by [`named`]:
//! the runtime wraps each future it spawns, and application code may do the
//! same for its own background work.
//!
//! [`current_task_name`] reads the name back.  Outside any named scope it
//! falls back to `Unknown-<n>`, where `<n>` comes from a process-wide
//! counter, so two anonymous call sites never produce the same name in
//! logs.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::futures::TaskLocalFuture;

tokio::task_local! {
    static TASK_NAME: String;
}

/// Process-wide counter backing the `Unknown-<n>` fallback. Starts at zero
/// and is only ever incremented; the first fallback name is `Unknown-1`.
static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(0);

/// Run `future` with `name` as its unit-of-work name.
///
/// Any call to [`current_task_name`] made while polling `future` (including
/// from functions it awaits) resolves to `name`.  Scopes nest: the innermost
/// enclosing [`named`] wins.
///
/// # Example
///
/// ```
/// use mirador_core::task::{current_task_name, named};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let name = named("worker-1", async { current_task_name() }).await;
/// assert_eq!(name, "worker-1");
/// # }
/// ```
pub fn named<F: Future>(name: impl Into<String>, future: F) -> TaskLocalFuture<String, F> {
    TASK_NAME.scope(name.into(), future)
}

/// The name of the currently executing unit of work.
///
/// Returns the innermost [`named`] scope's name, or `Unknown-<n>` with a
/// process-unique `n` when called outside any scope.  This function never
/// fails; a missing scope is the fallback path, not an error.
pub fn current_task_name() -> String {
    TASK_NAME
        .try_with(|name| name.clone())
        .unwrap_or_else(|_| format!("Unknown-{}", next_anonymous_id()))
}

fn next_anonymous_id() -> u64 {
    NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed) + 1
}
