//! Storage adapters: persistence of transition history.
//!
//! An [`Adapter`] binds one entity to its transition history in some backing
//! store and guarantees, regardless of backend:
//! - records are totally ordered per entity by `sort_key`
//! - concurrent writers racing on one entity produce exactly one winner; the
//!   loser observes [`StorageError::Conflict`]
//! - callback dispatch is interleaved with persistence through the narrow
//!   [`Observer`] interface
//!
//! The in-memory reference backend lives in [`memory`]; snapshots of it in
//! [`snapshot`].

pub mod error;
pub mod memory;
pub mod snapshot;

pub use error::StorageError;
pub use memory::{EntityId, MemoryAdapter, MemoryStore, MetadataColumn, StoreSchema};
pub use snapshot::{EntitySnapshot, SnapshotError, StoreSnapshot, SNAPSHOT_VERSION};

use crate::core::{Metadata, State, TransitionRecord};
use crate::graph::CallbackPhase;

/// Receiver of callback dispatch during `create`.
///
/// The machine's dispatcher is the canonical implementation; adapters depend
/// only on this interface and call it at three points:
/// [`CallbackPhase::Before`] once the record is built but not yet persisted,
/// [`CallbackPhase::After`] once persistence succeeds (still inside the
/// atomic unit for transactional backends), and [`CallbackPhase::AfterCommit`]
/// strictly after the commit is durable. `AfterCommit` must never be invoked
/// for a transition whose surrounding transaction rolled back.
pub trait Observer<S: State> {
    fn execute(&self, phase: CallbackPhase, from: &S, to: &S, record: &TransitionRecord<S>);
}

/// Persistence contract every adapter implements.
///
/// An adapter instance is bound to one parent entity. Construction must fail
/// fast — with [`StorageError::UnserializedMetadata`] or a backend-specific
/// configuration error — rather than deferring misconfiguration to the first
/// write.
pub trait Adapter<S: State> {
    /// Persist a new transition.
    ///
    /// Builds the record with the next sort key (`last + 10`, or `10` for an
    /// empty history), dispatches `Before`, commits under the store's
    /// uniqueness guarantee, dispatches `After`, and once the commit is
    /// durable dispatches `AfterCommit`. For backends with a real
    /// transaction boundary, build + `Before` + persist + `After` share one
    /// atomic unit: a failure between them leaves no partial transition
    /// visible.
    ///
    /// A lost race against a concurrent writer surfaces as
    /// [`StorageError::Conflict`] and invalidates the adapter's cached view
    /// so a retry re-reads the winner's history.
    fn create(
        &mut self,
        from: &S,
        to: &S,
        metadata: Metadata,
        observer: &dyn Observer<S>,
    ) -> Result<TransitionRecord<S>, StorageError>;

    /// All transition records for the entity, ascending by sort key.
    fn history(&mut self) -> Result<Vec<TransitionRecord<S>>, StorageError>;

    /// The record with the highest sort key, if any.
    ///
    /// Cached after the first lookup; re-fetched only when `force_reload` is
    /// requested or a `create` on this adapter instance invalidated the
    /// cache.
    fn last(&mut self, force_reload: bool) -> Result<Option<TransitionRecord<S>>, StorageError>;
}
