//! Per-event processing context and the user-notification suppression API.
//!
//! The host dispatcher runs every inbound event inside
//! [`scope_processing_context`], so each event task owns exactly one
//! [`ProcessingContext`]. Application handlers that already answered the user
//! call [`mark_user_notified`] before failing; the fault reporter then skips
//! its own apology while the operator report still goes out.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

tokio::task_local! {
    static PROCESSING_CONTEXT: Arc<ProcessingContext>;
}

#[derive(Debug, Default)]
/// Notification state for one inbound event.
pub struct ProcessingContext {
    user_notified: AtomicBool,
}

impl ProcessingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_notified(&self) -> bool {
        self.user_notified.load(Ordering::Acquire)
    }

    /// Sets the flag. Returns `true` only for the call that flipped it.
    pub fn mark_notified(&self) -> bool {
        !self.user_notified.swap(true, Ordering::AcqRel)
    }
}

/// Runs `future` with a fresh [`ProcessingContext`] bound to the current task.
pub async fn scope_processing_context<F>(context: Arc<ProcessingContext>, future: F) -> F::Output
where
    F: Future,
{
    PROCESSING_CONTEXT.scope(context, future).await
}

/// Returns the context of the event task currently running, if any.
pub fn current_processing_context() -> Option<Arc<ProcessingContext>> {
    PROCESSING_CONTEXT.try_with(Arc::clone).ok()
}

/// Records that the current event's user has already been told about a failure.
///
/// Outside of an event task this is a no-op and returns `false`.
pub fn mark_user_notified() -> bool {
    match current_processing_context() {
        Some(context) => {
            context.mark_notified();
            true
        }
        None => {
            tracing::debug!("mark_user_notified called outside of an event processing context");
            false
        }
    }
}
