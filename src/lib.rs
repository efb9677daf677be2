//! Waymark: a state machine library with durable, ordered transition history.
//!
//! Waymark attaches a finite-state-machine to any entity and records every
//! transition as an immutable, ordered history. The engine validates each
//! attempt against a declared graph, runs guards and callbacks around it,
//! and delegates persistence to a pluggable storage adapter that keeps
//! concurrent writers honest: per-entity ordering, exactly one winner per
//! slot, and a retryable conflict for the loser.
//!
//! # Core Concepts
//!
//! - **Graph**: states, transitions, and named events, declared once through
//!   [`GraphBuilder`] and immutable afterwards
//! - **Guards and callbacks**: predicates and hooks with optional
//!   `(from, to)` filters, dispatched around persistence
//! - **Machine**: binds a graph and a storage adapter to one entity
//! - **Adapter**: persists transition records; the in-memory reference
//!   backend is [`MemoryStore`] + [`MemoryAdapter`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use waymark::{
//!     state_enum, EntityId, GraphBuilder, Machine, MemoryAdapter, MemoryStore, Metadata,
//! };
//!
//! state_enum! {
//!     pub enum PaymentState {
//!         Pending,
//!         Captured,
//!         Refunded,
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = Arc::new(
//!     GraphBuilder::new()
//!         .initial(PaymentState::Pending)?
//!         .state(PaymentState::Captured)
//!         .state(PaymentState::Refunded)
//!         .transition(PaymentState::Pending, &[PaymentState::Captured])?
//!         .transition(PaymentState::Captured, &[PaymentState::Refunded])?
//!         .build()?,
//! );
//!
//! let store = MemoryStore::new();
//! let adapter = MemoryAdapter::new(store, EntityId::new())?;
//! let mut machine = Machine::new(graph, adapter);
//!
//! machine.transition_to(&PaymentState::Captured, Metadata::new())?;
//! assert_eq!(machine.current_state()?, PaymentState::Captured);
//! assert_eq!(machine.history()?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod graph;
pub mod machine;
pub mod storage;

// Re-export commonly used types
pub use crate::core::{Metadata, State, TransitionRecord};
pub use crate::graph::{
    Callback, CallbackFilter, CallbackPhase, Graph, GraphBuilder, GraphError, Guard, GuardFailed,
};
pub use crate::machine::{retry_conflicts, retry_on_conflict, Machine, TransitionError};
pub use crate::storage::{
    Adapter, EntityId, MemoryAdapter, MemoryStore, MetadataColumn, Observer, SnapshotError,
    StorageError, StoreSchema, StoreSnapshot,
};
