//! In-memory reference backend.
//!
//! [`MemoryStore`] is a process-local transition store shared by any number
//! of adapters and threads. It gives the same external guarantees a
//! database-backed adapter gets from uniqueness constraints and
//! transactions: appends for one entity are serialized through a single
//! commit section, a lost race surfaces as [`StorageError::Conflict`], and
//! exactly one record per entity is flagged most recent at any committed
//! point.

use super::error::StorageError;
use super::{Adapter, Observer};
use crate::core::{next_sort_key, Metadata, State, TransitionRecord};
use crate::graph::{CallbackPhase, Graph};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity the store keys transition history by.
///
/// The engine never inspects entities; this id is all the reference store
/// needs of one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Mint a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the store's metadata field is declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataColumn {
    /// The field holds structured data; metadata round-trips deep-equal.
    Structured,
    /// A plain text field. Structured metadata would be silently flattened,
    /// so adapters refuse to attach to such a store.
    Text,
}

/// Declared shape of the store's transition records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreSchema {
    pub metadata: MetadataColumn,
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self {
            metadata: MetadataColumn::Structured,
        }
    }
}

#[derive(Debug)]
struct EntityLog<S: State> {
    records: Vec<TransitionRecord<S>>,
}

impl<S: State> Default for EntityLog<S> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<S: State> EntityLog<S> {
    /// The maintained most-recent record. Records are kept sorted by
    /// `sort_key`, and the commit section keeps the flag pinned to the last
    /// entry, so this is an index lookup, not a history scan.
    fn most_recent(&self) -> Option<&TransitionRecord<S>> {
        let record = self.records.last();
        debug_assert!(record.is_none_or(|r| r.most_recent));
        record
    }
}

#[derive(Debug)]
struct StoreInner<S: State> {
    schema: StoreSchema,
    entities: HashMap<EntityId, EntityLog<S>>,
}

/// Shared in-memory transition store.
///
/// Cloning the store clones a handle; all clones observe the same records.
///
/// # Example
///
/// ```rust
/// use waymark::{state_enum, EntityId, MemoryStore};
///
/// state_enum! {
///     pub enum TaskState {
///         Queued,
///         Running,
///     }
/// }
///
/// let store: MemoryStore<TaskState> = MemoryStore::new();
/// let entity = EntityId::new();
/// store.register(entity);
/// assert_eq!(store.history(entity).unwrap().len(), 0);
/// ```
#[derive(Debug)]
pub struct MemoryStore<S: State> {
    inner: Arc<RwLock<StoreInner<S>>>,
}

impl<S: State> Clone for MemoryStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State> Default for MemoryStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> MemoryStore<S> {
    /// Create an empty store with the default (structured) schema.
    pub fn new() -> Self {
        Self::with_schema(StoreSchema::default())
    }

    /// Create an empty store with an explicit schema.
    pub fn with_schema(schema: StoreSchema) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                schema,
                entities: HashMap::new(),
            })),
        }
    }

    /// The store's declared record schema.
    pub fn schema(&self) -> StoreSchema {
        self.inner.read().schema
    }

    /// Make the store aware of an entity, with an empty history.
    ///
    /// Registration is what makes an entity visible to the
    /// [`in_state`](Self::in_state) queries before its first transition.
    pub fn register(&self, entity: EntityId) {
        self.inner.write().entities.entry(entity).or_default();
    }

    /// All registered entities, in unspecified order.
    pub fn entities(&self) -> Vec<EntityId> {
        self.inner.read().entities.keys().copied().collect()
    }

    /// Commit one transition record.
    ///
    /// The whole check-and-insert runs under the store's write lock: the
    /// uniqueness check on `(entity, sort_key)`, the sorted insertion, and
    /// the most-recent flag flip are one atomic unit. A duplicate sort key
    /// means another writer committed first and surfaces as
    /// [`StorageError::Conflict`].
    pub fn append(
        &self,
        entity: EntityId,
        record: TransitionRecord<S>,
    ) -> Result<TransitionRecord<S>, StorageError> {
        let mut inner = self.inner.write();
        let log = inner
            .entities
            .get_mut(&entity)
            .ok_or_else(|| StorageError::UnknownEntity(entity.to_string()))?;

        if log.records.iter().any(|r| r.sort_key == record.sort_key) {
            tracing::debug!(
                entity = %entity,
                sort_key = record.sort_key,
                "conflicting transition write lost the ordering slot"
            );
            return Err(StorageError::Conflict {
                entity: entity.to_string(),
                sort_key: record.sort_key,
            });
        }

        let position = log
            .records
            .iter()
            .position(|r| r.sort_key > record.sort_key)
            .unwrap_or(log.records.len());
        log.records.insert(position, record);

        // Pin the flag to the highest sort key, exactly one holder.
        let now = Utc::now();
        let last = log.records.len() - 1;
        for (index, existing) in log.records.iter_mut().enumerate() {
            let flag = index == last;
            if existing.most_recent != flag {
                existing.most_recent = flag;
                existing.updated_at = now;
            }
        }

        Ok(log.records[position].clone())
    }

    /// Install an entity's history wholesale, replacing anything present.
    /// Callers must have validated ordering and flags; used by snapshot
    /// restore to keep records byte-faithful.
    pub(crate) fn load_history(&self, entity: EntityId, records: Vec<TransitionRecord<S>>) {
        self.inner
            .write()
            .entities
            .insert(entity, EntityLog { records });
    }

    /// All records for an entity, ascending by sort key.
    pub fn history(&self, entity: EntityId) -> Result<Vec<TransitionRecord<S>>, StorageError> {
        let inner = self.inner.read();
        let log = inner
            .entities
            .get(&entity)
            .ok_or_else(|| StorageError::UnknownEntity(entity.to_string()))?;
        Ok(log.records.clone())
    }

    /// The entity's most recent record, if any.
    pub fn last(&self, entity: EntityId) -> Result<Option<TransitionRecord<S>>, StorageError> {
        let inner = self.inner.read();
        let log = inner
            .entities
            .get(&entity)
            .ok_or_else(|| StorageError::UnknownEntity(entity.to_string()))?;
        Ok(log.most_recent().cloned())
    }

    /// Entities whose current state is one of `states`.
    ///
    /// Consults only each entity's most-recent record. An entity with no
    /// transitions counts as being in the graph's initial state.
    pub fn in_state(&self, graph: &Graph<S>, states: &[S]) -> Vec<EntityId> {
        self.select_entities(graph, states, true)
    }

    /// Entities whose current state is *not* one of `states`.
    ///
    /// The complement of [`in_state`](Self::in_state) under the same
    /// most-recent lookup: an entity whose older records match but whose
    /// current record does not is included here.
    pub fn not_in_state(&self, graph: &Graph<S>, states: &[S]) -> Vec<EntityId> {
        self.select_entities(graph, states, false)
    }

    fn select_entities(&self, graph: &Graph<S>, states: &[S], matching: bool) -> Vec<EntityId> {
        let inner = self.inner.read();
        inner
            .entities
            .iter()
            .filter(|(_, log)| {
                let current = log
                    .most_recent()
                    .map(|r| &r.to_state)
                    .unwrap_or_else(|| graph.initial_state());
                states.contains(current) == matching
            })
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Adapter binding one entity to a [`MemoryStore`].
///
/// Holds a per-instance cache of the entity's most recent record,
/// invalidated by local writes and by lost races.
#[derive(Debug)]
pub struct MemoryAdapter<S: State> {
    store: MemoryStore<S>,
    entity: EntityId,
    cached_last: Option<Option<TransitionRecord<S>>>,
}

impl<S: State> MemoryAdapter<S> {
    /// Attach to a store, registering the entity.
    ///
    /// Fails fast with [`StorageError::UnserializedMetadata`] when the
    /// store's metadata field cannot hold structured data; a misconfigured
    /// store must not be discovered at first write.
    pub fn new(store: MemoryStore<S>, entity: EntityId) -> Result<Self, StorageError> {
        if store.schema().metadata != MetadataColumn::Structured {
            return Err(StorageError::UnserializedMetadata);
        }
        store.register(entity);
        Ok(Self {
            store,
            entity,
            cached_last: None,
        })
    }

    /// The entity this adapter is bound to.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Handle to the backing store.
    pub fn store(&self) -> &MemoryStore<S> {
        &self.store
    }
}

impl<S: State> Adapter<S> for MemoryAdapter<S> {
    /// The memory store has no rollback, so `After` and `AfterCommit` both
    /// run as soon as the commit section succeeds. The sort key is computed
    /// from this adapter's cached view; a stale cache loses the race inside
    /// `append` and invalidates itself for the retry.
    fn create(
        &mut self,
        from: &S,
        to: &S,
        metadata: Metadata,
        observer: &dyn Observer<S>,
    ) -> Result<TransitionRecord<S>, StorageError> {
        let sort_key = next_sort_key(self.last(false)?.map(|r| r.sort_key));
        let record = TransitionRecord::new(to.clone(), metadata, sort_key);

        observer.execute(CallbackPhase::Before, from, to, &record);

        match self.store.append(self.entity, record) {
            Ok(committed) => {
                self.cached_last = Some(Some(committed.clone()));
                observer.execute(CallbackPhase::After, from, to, &committed);
                observer.execute(CallbackPhase::AfterCommit, from, to, &committed);
                Ok(committed)
            }
            Err(err) => {
                if err.is_conflict() {
                    self.cached_last = None;
                }
                Err(err)
            }
        }
    }

    fn history(&mut self) -> Result<Vec<TransitionRecord<S>>, StorageError> {
        self.store.history(self.entity)
    }

    fn last(&mut self, force_reload: bool) -> Result<Option<TransitionRecord<S>>, StorageError> {
        if force_reload || self.cached_last.is_none() {
            let fresh = self.store.last(self.entity)?;
            self.cached_last = Some(fresh);
        }
        Ok(self.cached_last.clone().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use serde_json::json;

    crate::state_enum! {
        enum TestState {
            Pending,
            Approved,
            Rejected,
        }
    }

    struct NoopObserver;

    impl Observer<TestState> for NoopObserver {
        fn execute(
            &self,
            _phase: CallbackPhase,
            _from: &TestState,
            _to: &TestState,
            _record: &TransitionRecord<TestState>,
        ) {
        }
    }

    fn graph() -> Graph<TestState> {
        GraphBuilder::new()
            .initial(TestState::Pending)
            .unwrap()
            .state(TestState::Approved)
            .state(TestState::Rejected)
            .transition(TestState::Pending, &[TestState::Approved, TestState::Rejected])
            .unwrap()
            .transition(TestState::Approved, &[TestState::Rejected])
            .unwrap()
            .build()
            .unwrap()
    }

    fn record(to: TestState, sort_key: u64) -> TransitionRecord<TestState> {
        TransitionRecord::new(to, Metadata::new(), sort_key)
    }

    #[test]
    fn append_keeps_history_sorted() {
        let store = MemoryStore::new();
        let entity = EntityId::new();
        store.register(entity);

        store.append(entity, record(TestState::Approved, 20)).unwrap();
        store.append(entity, record(TestState::Pending, 10)).unwrap();

        let history = store.history(entity).unwrap();
        let keys: Vec<u64> = history.iter().map(|r| r.sort_key).collect();
        assert_eq!(keys, vec![10, 20]);
    }

    #[test]
    fn append_rejects_duplicate_sort_key() {
        let store = MemoryStore::new();
        let entity = EntityId::new();
        store.register(entity);

        store.append(entity, record(TestState::Approved, 10)).unwrap();
        let err = store
            .append(entity, record(TestState::Rejected, 10))
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.history(entity).unwrap().len(), 1);
    }

    #[test]
    fn exactly_one_record_is_most_recent() {
        let store = MemoryStore::new();
        let entity = EntityId::new();
        store.register(entity);

        store.append(entity, record(TestState::Approved, 10)).unwrap();
        store.append(entity, record(TestState::Rejected, 20)).unwrap();
        // Insertion into a gap must not steal the flag.
        store.append(entity, record(TestState::Pending, 15)).unwrap();

        let history = store.history(entity).unwrap();
        let flagged: Vec<u64> = history
            .iter()
            .filter(|r| r.most_recent)
            .map(|r| r.sort_key)
            .collect();
        assert_eq!(flagged, vec![20]);
    }

    #[test]
    fn append_to_unknown_entity_fails() {
        let store: MemoryStore<TestState> = MemoryStore::new();
        let err = store
            .append(EntityId::new(), record(TestState::Approved, 10))
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownEntity(_)));
    }

    #[test]
    fn adapter_refuses_text_metadata_column() {
        let store: MemoryStore<TestState> = MemoryStore::with_schema(StoreSchema {
            metadata: MetadataColumn::Text,
        });

        let err = MemoryAdapter::new(store, EntityId::new()).unwrap_err();
        assert_eq!(err, StorageError::UnserializedMetadata);
    }

    #[test]
    fn adapter_create_assigns_gapped_sort_keys() {
        let store = MemoryStore::new();
        let mut adapter = MemoryAdapter::new(store, EntityId::new()).unwrap();

        adapter
            .create(&TestState::Pending, &TestState::Approved, Metadata::new(), &NoopObserver)
            .unwrap();
        adapter
            .create(&TestState::Approved, &TestState::Rejected, Metadata::new(), &NoopObserver)
            .unwrap();

        let keys: Vec<u64> = adapter.history().unwrap().iter().map(|r| r.sort_key).collect();
        assert_eq!(keys, vec![10, 20]);
    }

    #[test]
    fn adapter_create_preserves_metadata() {
        let store = MemoryStore::new();
        let mut adapter = MemoryAdapter::new(store, EntityId::new()).unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("reason".to_string(), json!({ "code": 42, "tags": ["a"] }));

        adapter
            .create(&TestState::Pending, &TestState::Approved, metadata.clone(), &NoopObserver)
            .unwrap();

        let stored = adapter.last(true).unwrap().unwrap();
        assert_eq!(stored.metadata, metadata);
    }

    #[test]
    fn last_is_cached_until_invalidated() {
        let store = MemoryStore::new();
        let entity = EntityId::new();
        let mut adapter = MemoryAdapter::new(store.clone(), entity).unwrap();

        assert!(adapter.last(false).unwrap().is_none());

        // A write through another handle is invisible to the cache...
        store.append(entity, record(TestState::Approved, 10)).unwrap();
        assert!(adapter.last(false).unwrap().is_none());

        // ...until a reload is forced.
        let reloaded = adapter.last(true).unwrap().unwrap();
        assert_eq!(reloaded.to_state, TestState::Approved);
    }

    #[test]
    fn stale_adapter_cache_loses_the_race_and_invalidates() {
        let store = MemoryStore::new();
        let entity = EntityId::new();
        let mut first = MemoryAdapter::new(store.clone(), entity).unwrap();
        let mut second = MemoryAdapter::new(store, entity).unwrap();

        // Both adapters observe an empty history.
        assert!(first.last(false).unwrap().is_none());
        assert!(second.last(false).unwrap().is_none());

        first
            .create(&TestState::Pending, &TestState::Approved, Metadata::new(), &NoopObserver)
            .unwrap();

        // The second adapter computes the same sort key and loses.
        let err = second
            .create(&TestState::Pending, &TestState::Rejected, Metadata::new(), &NoopObserver)
            .unwrap_err();
        assert!(err.is_conflict());

        // The lost race dropped the cache; the retry sees the winner.
        let current = second.last(false).unwrap().unwrap();
        assert_eq!(current.to_state, TestState::Approved);
        second
            .create(&TestState::Approved, &TestState::Rejected, Metadata::new(), &NoopObserver)
            .unwrap();

        let history = second.history().unwrap();
        assert_eq!(history.len(), 2);
        let flagged: Vec<_> = history.iter().filter(|r| r.most_recent).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].to_state, TestState::Rejected);
    }

    #[test]
    fn in_state_uses_the_most_recent_record() {
        let graph = graph();
        let store = MemoryStore::new();

        let fresh = EntityId::new();
        store.register(fresh);

        let approved = EntityId::new();
        store.register(approved);
        store.append(approved, record(TestState::Approved, 10)).unwrap();

        // Passed through Approved earlier, currently Rejected.
        let moved_on = EntityId::new();
        store.register(moved_on);
        store.append(moved_on, record(TestState::Approved, 10)).unwrap();
        store.append(moved_on, record(TestState::Rejected, 20)).unwrap();

        let in_approved = store.in_state(&graph, &[TestState::Approved]);
        assert_eq!(in_approved, vec![approved]);

        // An entity with no transitions counts as initial.
        let in_pending = store.in_state(&graph, &[TestState::Pending]);
        assert_eq!(in_pending, vec![fresh]);
    }

    #[test]
    fn not_in_state_is_the_complement_under_the_same_lookup() {
        let graph = graph();
        let store = MemoryStore::new();

        let moved_on = EntityId::new();
        store.register(moved_on);
        store.append(moved_on, record(TestState::Approved, 10)).unwrap();
        store.append(moved_on, record(TestState::Rejected, 20)).unwrap();

        // The old Approved record must not keep the entity out.
        assert_eq!(store.not_in_state(&graph, &[TestState::Approved]), vec![moved_on]);
        assert!(store.not_in_state(&graph, &[TestState::Rejected]).is_empty());
    }
}
