//! Core data types.
//!
//! The leaf values everything else is built from:
//! - State identity via the `State` trait
//! - Immutable transition records with per-entity sort keys
//! - Opaque structured metadata

mod macros;
mod record;
mod state;

pub use record::{next_sort_key, Metadata, TransitionRecord, FIRST_SORT_KEY, SORT_KEY_GAP};
pub use state::State;
