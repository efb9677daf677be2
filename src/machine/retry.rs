//! Bounded retry around conflicting writes.
//!
//! A conflict means another writer won the ordering slot for the same
//! entity — transient contention, not a logical failure. Re-running the
//! transition against the refreshed history usually succeeds.

use super::error::TransitionError;
use crate::config;

/// Run `op`, re-invoking it while it fails with a retryable conflict, up to
/// `max_attempts` invocations in total.
///
/// `op` always runs at least once. Every non-conflict outcome — success,
/// rejection, or any other error — is returned immediately.
///
/// # Example
///
/// ```rust
/// use waymark::machine::retry_on_conflict;
/// use waymark::{StorageError, TransitionError};
///
/// let mut calls = 0;
/// let outcome = retry_on_conflict(3, || {
///     calls += 1;
///     if calls < 3 {
///         Err(TransitionError::Storage(StorageError::Conflict {
///             entity: "order".to_string(),
///             sort_key: 20,
///         }))
///     } else {
///         Ok("approved")
///     }
/// });
///
/// assert_eq!(outcome.unwrap(), "approved");
/// assert_eq!(calls, 3);
/// ```
pub fn retry_on_conflict<T, F>(max_attempts: usize, mut op: F) -> Result<T, TransitionError>
where
    F: FnMut() -> Result<T, TransitionError>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, "conflicting write, retrying transition");
            }
            outcome => return outcome,
        }
    }
}

/// [`retry_on_conflict`] with the attempt count from the process-wide
/// [`config`](crate::config).
pub fn retry_conflicts<T, F>(op: F) -> Result<T, TransitionError>
where
    F: FnMut() -> Result<T, TransitionError>,
{
    retry_on_conflict(config::current().max_transition_attempts, op)
}
