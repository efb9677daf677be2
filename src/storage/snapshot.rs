//! Store snapshots.
//!
//! A snapshot captures every entity's transition history in one versioned,
//! serializable value, so a process can persist its in-memory store across
//! restarts. Restoring validates the history invariants before any record
//! becomes visible.

use super::memory::{EntityId, MemoryStore};
use crate::core::{State, TransitionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Version identifier for the snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised while taking or restoring snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("unsupported snapshot version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("snapshot validation failed: {0}")]
    ValidationFailed(String),
}

/// One entity's captured history.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EntitySnapshot<S: State> {
    pub entity: EntityId,
    pub records: Vec<TransitionRecord<S>>,
}

/// Serializable capture of a whole [`MemoryStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StoreSnapshot<S: State> {
    /// Snapshot format version
    pub version: u32,

    /// Unique snapshot identifier
    pub id: Uuid,

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,

    /// Every registered entity with its full history
    pub entities: Vec<EntitySnapshot<S>>,
}

impl<S: State> StoreSnapshot<S> {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }
}

impl<S: State> MemoryStore<S> {
    /// Capture the store.
    ///
    /// Entities are ordered by id so two snapshots of the same store
    /// serialize identically.
    pub fn snapshot(&self) -> StoreSnapshot<S> {
        let mut ids = self.entities();
        ids.sort();
        let entities = ids
            .into_iter()
            .map(|entity| EntitySnapshot {
                records: self.history(entity).unwrap_or_default(),
                entity,
            })
            .collect();

        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4(),
            taken_at: Utc::now(),
            entities,
        }
    }

    /// Rebuild a store from a snapshot.
    ///
    /// Validates before committing anything: the version must be supported,
    /// each entity's sort keys must be strictly ascending, and the
    /// most-recent flag must sit on exactly the last record of each
    /// non-empty history.
    pub fn restore(snapshot: &StoreSnapshot<S>) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        for entry in &snapshot.entities {
            validate_history(entry)?;
        }

        let store = MemoryStore::new();
        for entry in &snapshot.entities {
            store.load_history(entry.entity, entry.records.clone());
        }
        Ok(store)
    }
}

fn validate_history<S: State>(entry: &EntitySnapshot<S>) -> Result<(), SnapshotError> {
    for window in entry.records.windows(2) {
        if window[1].sort_key <= window[0].sort_key {
            return Err(SnapshotError::ValidationFailed(format!(
                "entity '{}' has non-ascending sort keys {} and {}",
                entry.entity, window[0].sort_key, window[1].sort_key
            )));
        }
    }

    let flagged: Vec<usize> = entry
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.most_recent)
        .map(|(i, _)| i)
        .collect();
    match (entry.records.len(), flagged.as_slice()) {
        (0, []) => Ok(()),
        (len, [only]) if *only == len - 1 => Ok(()),
        _ => Err(SnapshotError::ValidationFailed(format!(
            "entity '{}' does not have exactly one most-recent record at the end of its history",
            entry.entity
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Metadata;
    use serde_json::json;

    crate::state_enum! {
        enum TestState {
            Pending,
            Approved,
            Rejected,
        }
    }

    fn record(to: TestState, sort_key: u64) -> TransitionRecord<TestState> {
        TransitionRecord::new(to, Metadata::new(), sort_key)
    }

    fn populated_store() -> (MemoryStore<TestState>, EntityId, EntityId) {
        let store = MemoryStore::new();

        let first = EntityId::new();
        store.register(first);
        let mut metadata = Metadata::new();
        metadata.insert("actor".to_string(), json!("reviewer"));
        store
            .append(first, TransitionRecord::new(TestState::Approved, metadata, 10))
            .unwrap();

        let second = EntityId::new();
        store.register(second);

        (store, first, second)
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let (store, first, second) = populated_store();

        let snapshot = store.snapshot();
        let json = snapshot.to_json().unwrap();
        let decoded: StoreSnapshot<TestState> = StoreSnapshot::from_json(&json).unwrap();
        let restored = MemoryStore::restore(&decoded).unwrap();

        assert_eq!(
            restored.history(first).unwrap(),
            store.history(first).unwrap()
        );
        assert_eq!(restored.history(second).unwrap().len(), 0);

        let mut original_ids = store.entities();
        original_ids.sort();
        let mut restored_ids = restored.entities();
        restored_ids.sort();
        assert_eq!(original_ids, restored_ids);
    }

    #[test]
    fn restore_is_byte_faithful_for_longer_histories() {
        let (store, first, _) = populated_store();
        store.append(first, record(TestState::Rejected, 20)).unwrap();

        let restored = MemoryStore::restore(&store.snapshot()).unwrap();
        assert_eq!(
            restored.history(first).unwrap(),
            store.history(first).unwrap()
        );

        let history = restored.history(first).unwrap();
        let flagged: Vec<u64> = history
            .iter()
            .filter(|r| r.most_recent)
            .map(|r| r.sort_key)
            .collect();
        assert_eq!(flagged, vec![20]);
    }

    #[test]
    fn future_version_is_rejected() {
        let (store, _, _) = populated_store();
        let mut snapshot = store.snapshot();
        snapshot.version = SNAPSHOT_VERSION + 1;

        let err = MemoryStore::restore(&snapshot).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion { .. }));
    }

    #[test]
    fn unordered_history_is_rejected() {
        let (store, first, _) = populated_store();
        let mut snapshot = store.snapshot();
        let entry = snapshot
            .entities
            .iter_mut()
            .find(|e| e.entity == first)
            .unwrap();
        let mut stale = record(TestState::Rejected, 5);
        stale.most_recent = false;
        entry.records.push(stale);

        let err = MemoryStore::restore(&snapshot).unwrap_err();
        assert!(matches!(err, SnapshotError::ValidationFailed(_)));
    }

    #[test]
    fn misplaced_most_recent_flag_is_rejected() {
        let (store, first, _) = populated_store();
        let mut snapshot = store.snapshot();
        let entry = snapshot
            .entities
            .iter_mut()
            .find(|e| e.entity == first)
            .unwrap();
        entry.records[0].most_recent = false;

        let err = MemoryStore::restore(&snapshot).unwrap_err();
        assert!(matches!(err, SnapshotError::ValidationFailed(_)));
    }

    #[test]
    fn corrupt_json_is_rejected() {
        let err = StoreSnapshot::<TestState>::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SnapshotError::DeserializationFailed(_)));
    }
}
