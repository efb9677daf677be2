//! The per-entity engine.
//!
//! A [`Machine`] binds one finalized graph and one storage adapter to a
//! single entity and orchestrates every transition attempt: current-state
//! derivation, edge validation, guard evaluation, and callback dispatch
//! around persistence. The machine holds no locks and spawns no threads;
//! all blocking happens inside the adapter.

pub mod error;
pub mod retry;

pub use error::TransitionError;
pub use retry::{retry_conflicts, retry_on_conflict};

use crate::core::{Metadata, State, TransitionRecord};
use crate::graph::{CallbackPhase, Graph};
use crate::storage::{Adapter, Observer};
use std::sync::Arc;

/// The canonical [`Observer`]: dispatches a graph's callbacks for one
/// phase, filtered by their `(from, to)` conditions, in registration order.
pub struct Dispatcher<S: State> {
    graph: Arc<Graph<S>>,
}

impl<S: State> Dispatcher<S> {
    pub fn new(graph: Arc<Graph<S>>) -> Self {
        Self { graph }
    }
}

impl<S: State> Observer<S> for Dispatcher<S> {
    fn execute(&self, phase: CallbackPhase, from: &S, to: &S, record: &TransitionRecord<S>) {
        for callback in self.graph.callbacks(phase) {
            if callback.applies_to(from, to) {
                callback.call(from, record);
            }
        }
    }
}

/// State machine over one entity.
///
/// The strict methods ([`transition_to`](Self::transition_to),
/// [`trigger`](Self::trigger)) return errors; the lenient variants
/// ([`try_transition_to`](Self::try_transition_to),
/// [`try_trigger`](Self::try_trigger)) convert the expected rejection kinds
/// to `Ok(false)` while still propagating storage and configuration
/// failures.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use waymark::{
///     state_enum, EntityId, GraphBuilder, Machine, MemoryAdapter, MemoryStore, Metadata,
/// };
///
/// state_enum! {
///     pub enum OrderState {
///         Pending,
///         Approved,
///         Rejected,
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let graph = Arc::new(
///     GraphBuilder::new()
///         .initial(OrderState::Pending)?
///         .state(OrderState::Approved)
///         .state(OrderState::Rejected)
///         .transition(OrderState::Pending, &[OrderState::Approved, OrderState::Rejected])?
///         .event("approve", OrderState::Pending, OrderState::Approved)?
///         .build()?,
/// );
///
/// let store = MemoryStore::new();
/// let adapter = MemoryAdapter::new(store, EntityId::new())?;
/// let mut machine = Machine::new(graph, adapter);
///
/// assert_eq!(machine.current_state()?, OrderState::Pending);
/// machine.trigger("approve", Metadata::new())?;
/// assert_eq!(machine.current_state()?, OrderState::Approved);
/// # Ok(())
/// # }
/// ```
pub struct Machine<S: State, A: Adapter<S>> {
    graph: Arc<Graph<S>>,
    adapter: A,
    dispatcher: Dispatcher<S>,
}

impl<S: State, A: Adapter<S>> Machine<S, A> {
    /// Bind a graph and an adapter to one entity.
    pub fn new(graph: Arc<Graph<S>>, adapter: A) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&graph));
        Self {
            graph,
            adapter,
            dispatcher,
        }
    }

    /// The shared graph this machine runs against.
    pub fn graph(&self) -> &Graph<S> {
        &self.graph
    }

    /// The entity's current state: the most recent transition's `to_state`,
    /// or the graph's initial state for an empty history.
    pub fn current_state(&mut self) -> Result<S, TransitionError> {
        Ok(self
            .adapter
            .last(false)?
            .map(|record| record.to_state)
            .unwrap_or_else(|| self.graph.initial_state().clone()))
    }

    /// The most recent transition record, if any.
    pub fn last_transition(&mut self) -> Result<Option<TransitionRecord<S>>, TransitionError> {
        Ok(self.adapter.last(false)?)
    }

    /// Full transition history, ascending by sort key.
    pub fn history(&mut self) -> Result<Vec<TransitionRecord<S>>, TransitionError> {
        Ok(self.adapter.history()?)
    }

    /// Successors of the current state that would pass validation and
    /// guards right now. Side-effect free.
    pub fn allowed_transitions(&mut self, metadata: &Metadata) -> Result<Vec<S>, TransitionError> {
        let from = self.current_state()?;
        let successors: Vec<S> = self.graph.successors(&from).into_iter().cloned().collect();
        let mut allowed = Vec::new();
        for to in successors {
            if self.can_transition_to(&to, metadata)? {
                allowed.push(to);
            }
        }
        Ok(allowed)
    }

    /// Probe whether a transition would succeed, without persisting
    /// anything.
    ///
    /// Swallows the expected rejection kinds into `Ok(false)`; anything
    /// unexpected (storage failures) propagates.
    pub fn can_transition_to(&mut self, to: &S, metadata: &Metadata) -> Result<bool, TransitionError> {
        let from = self.current_state()?;
        if !self.graph.transition_allowed(&from, to) {
            return Ok(false);
        }
        Ok(self
            .graph
            .guards()
            .iter()
            .filter(|guard| guard.applies_to(&from, to))
            .all(|guard| guard.check(&from, to, metadata)))
    }

    /// Perform a transition, returning the new state.
    ///
    /// Validates the edge, runs applicable guards, then hands persistence
    /// to the adapter, which dispatches `Before`/`After` callbacks inside
    /// its atomic unit and `AfterCommit` once the commit is durable.
    pub fn transition_to(&mut self, to: &S, metadata: Metadata) -> Result<S, TransitionError> {
        let from = self.current_state()?;
        if !self.graph.transition_allowed(&from, to) {
            return Err(TransitionError::TransitionFailed {
                from: from.name().to_string(),
                to: to.name().to_string(),
            });
        }
        for guard in self.graph.guards() {
            if guard.applies_to(&from, to) {
                guard.call(&from, to, &metadata)?;
            }
        }

        let record = self
            .adapter
            .create(&from, to, metadata, &self.dispatcher)?;
        tracing::debug!(
            from = from.name(),
            to = to.name(),
            sort_key = record.sort_key,
            "transition committed"
        );
        Ok(record.to_state)
    }

    /// Lenient [`transition_to`](Self::transition_to): `Ok(false)` when the
    /// edge is missing or a guard rejects, `Err` for anything unexpected.
    pub fn try_transition_to(&mut self, to: &S, metadata: Metadata) -> Result<bool, TransitionError> {
        match self.transition_to(to, metadata) {
            Ok(_) => Ok(true),
            Err(err) if err.is_rejection() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Perform the transition a named event maps from the current state.
    ///
    /// Fails with [`TransitionError::EventFailed`] when the event is
    /// unknown or has no mapping from the current state.
    pub fn trigger(&mut self, event: &str, metadata: Metadata) -> Result<S, TransitionError> {
        let from = self.current_state()?;
        let target = self
            .graph
            .event_target(event, &from)
            .cloned()
            .ok_or_else(|| TransitionError::EventFailed {
                event: event.to_string(),
                from: from.name().to_string(),
            })?;
        self.transition_to(&target, metadata)
    }

    /// Lenient [`trigger`](Self::trigger).
    pub fn try_trigger(&mut self, event: &str, metadata: Metadata) -> Result<bool, TransitionError> {
        match self.trigger(event, metadata) {
            Ok(_) => Ok(true),
            Err(err) if err.is_rejection() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
