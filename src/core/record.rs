//! Persisted transition records.
//!
//! A [`TransitionRecord`] is the immutable value a storage adapter commits
//! for every state change. Records for one entity are totally ordered by
//! `sort_key`; the current state of an entity is always derived from the
//! record with the highest key.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured metadata attached to a transition.
///
/// An opaque string-keyed bag of JSON values. The engine never inspects it;
/// storage adapters serialize it whole and must return it deep-equal on read.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Sort key assigned to the first transition of an entity.
pub const FIRST_SORT_KEY: u64 = 10;

/// Gap between consecutive sort keys.
///
/// Keys are spaced so a record can later be inserted between two existing
/// ones without renumbering the history.
pub const SORT_KEY_GAP: u64 = 10;

/// Compute the sort key for the transition following `last`.
///
/// # Example
///
/// ```rust
/// use waymark::core::next_sort_key;
///
/// assert_eq!(next_sort_key(None), 10);
/// assert_eq!(next_sort_key(Some(10)), 20);
/// assert_eq!(next_sort_key(Some(40)), 50);
/// ```
pub fn next_sort_key(last: Option<u64>) -> u64 {
    match last {
        Some(key) => key + SORT_KEY_GAP,
        None => FIRST_SORT_KEY,
    }
}

/// Record of a single committed state change.
///
/// Records are append-only: once an adapter commits one, it is never
/// mutated, except for the `most_recent` flag which the store flips to
/// `false` when a newer record is committed for the same entity.
///
/// # Example
///
/// ```rust
/// use waymark::{Metadata, TransitionRecord};
/// use waymark::state_enum;
///
/// state_enum! {
///     pub enum TaskState {
///         Queued,
///         Running,
///     }
/// }
///
/// let record = TransitionRecord::new(TaskState::Running, Metadata::new(), 10);
/// assert_eq!(record.to_state, TaskState::Running);
/// assert!(record.most_recent);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionRecord<S: State> {
    /// The state this transition moved the entity into
    pub to_state: S,
    /// Structured metadata supplied by the caller
    pub metadata: Metadata,
    /// Per-entity ordering key, strictly increasing
    pub sort_key: u64,
    /// When the record was built
    pub created_at: DateTime<Utc>,
    /// When the record was last touched (flag flips update this)
    pub updated_at: DateTime<Utc>,
    /// Whether this is the entity's most recent transition
    pub most_recent: bool,
}

impl<S: State> TransitionRecord<S> {
    /// Build a new record, timestamped now and flagged most recent.
    ///
    /// The flag is provisional until the record is committed; the store
    /// clears it on the previous holder inside the same commit.
    pub fn new(to_state: S, metadata: Metadata, sort_key: u64) -> Self {
        let now = Utc::now();
        Self {
            to_state,
            metadata,
            sort_key,
            created_at: now,
            updated_at: now,
            most_recent: true,
        }
    }
}
