//! Storage-layer errors.

use thiserror::Error;

/// Errors raised by storage adapters.
///
/// Only [`StorageError::Conflict`] is retryable: it means another writer won
/// the ordering slot for the same entity and the caller should re-read and
/// try again. Every other variant propagates unchanged and is never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A concurrent writer committed a transition with the same sort key.
    #[error("conflicting transition write for entity '{entity}' at sort key {sort_key}")]
    Conflict { entity: String, sort_key: u64 },

    /// The backing store's metadata field cannot hold structured data.
    /// Raised at adapter construction, before any transition is attempted.
    #[error("metadata field is not configured for structured serialization")]
    UnserializedMetadata,

    /// The store has no record of the entity.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// Opaque backend failure (connection loss, disk error, ...).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the error marks a lost race that a caller may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}
