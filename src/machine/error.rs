//! Engine-level transition errors.

use crate::graph::GuardFailed;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by a transition attempt.
///
/// The first three variants are *rejections* — the expected failure kinds a
/// caller probes for, which the lenient APIs convert to `Ok(false)`.
/// [`TransitionError::Storage`] wraps adapter failures; of those only a
/// conflict is retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The graph declares no edge from the current state to the target.
    #[error("no transition from '{from}' to '{to}'")]
    TransitionFailed { from: String, to: String },

    /// An applicable guard returned false.
    #[error(transparent)]
    GuardFailed(#[from] GuardFailed),

    /// The event is unknown or has no mapping from the current state.
    #[error("event '{event}' has no transition from '{from}'")]
    EventFailed { event: String, from: String },

    /// The storage adapter failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TransitionError {
    /// Whether this is one of the expected failure kinds (missing edge,
    /// rejecting guard, unresolved event) rather than an unexpected error.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TransitionError::TransitionFailed { .. }
                | TransitionError::GuardFailed(_)
                | TransitionError::EventFailed { .. }
        )
    }

    /// Whether this is a lost race against a concurrent writer, safe to
    /// retry with [`retry_on_conflict`](crate::machine::retry_on_conflict).
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransitionError::Storage(err) if err.is_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_classified() {
        let failed = TransitionError::TransitionFailed {
            from: "a".to_string(),
            to: "b".to_string(),
        };
        assert!(failed.is_rejection());
        assert!(!failed.is_conflict());

        let guard = TransitionError::GuardFailed(GuardFailed {
            from: "a".to_string(),
            to: "b".to_string(),
        });
        assert!(guard.is_rejection());

        let event = TransitionError::EventFailed {
            event: "approve".to_string(),
            from: "a".to_string(),
        };
        assert!(event.is_rejection());
    }

    #[test]
    fn conflicts_are_retryable_but_not_rejections() {
        let conflict = TransitionError::Storage(StorageError::Conflict {
            entity: "e".to_string(),
            sort_key: 20,
        });
        assert!(conflict.is_conflict());
        assert!(!conflict.is_rejection());
    }

    #[test]
    fn backend_failures_are_neither() {
        let outage = TransitionError::Storage(StorageError::Backend("connection reset".to_string()));
        assert!(!outage.is_conflict());
        assert!(!outage.is_rejection());
    }
}
