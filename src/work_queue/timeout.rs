//! Deadline guard that always yields a tagged outcome.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Outcome of a guarded operation.
///
/// The operation's own error is captured here rather than propagated, so callers
/// always get a value back and decide for themselves what a failure means.
#[derive(Debug)]
pub enum Guarded<T, E> {
    /// The operation settled first with a value.
    Completed(T),
    /// The operation settled first with an error.
    Failed(E),
    /// The deadline fired first. The operation has been dropped.
    TimedOut { label: String, after: Duration },
}

impl<T, E> Guarded<T, E> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Guarded::TimedOut { .. })
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Guarded::Completed(value) => Some(value),
            _ => None,
        }
    }
}

impl<T, E: fmt::Display> Guarded<T, E> {
    /// Human readable reason for a non-completed outcome.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Guarded::Completed(_) => None,
            Guarded::Failed(err) => Some(err.to_string()),
            Guarded::TimedOut { label, after } => {
                Some(format!("{} timed out after {}ms", label, after.as_millis()))
            }
        }
    }
}

/// Race `operation` against a `deadline`.
///
/// Whichever settles first decides the outcome. The timer is owned by this call and
/// dropped on return, so nothing outlives settlement. A timed-out operation is dropped
/// too, which for child processes spawned with `kill_on_drop` also reaps them.
pub async fn guard<T, E, Fut>(operation: Fut, deadline: Duration, label: &str) -> Guarded<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(Ok(value)) => Guarded::Completed(value),
        Ok(Err(err)) => Guarded::Failed(err),
        Err(_) => {
            debug!("{} exceeded its {}ms deadline", label, deadline.as_millis());
            Guarded::TimedOut {
                label: label.to_string(),
                after: deadline,
            }
        }
    }
}
