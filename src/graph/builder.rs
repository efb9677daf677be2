//! Builder for configuring state graphs.
//!
//! Declarations are validated as they are made: referencing an undeclared
//! state, redeclaring the initial state, or registering a callback that
//! could never fire all fail at configuration time.

use super::callback::{Callback, Guard};
use super::error::GraphError;
use super::{CallbackPhase, Event, Graph, TransitionEdge};
use crate::core::{Metadata, State, TransitionRecord};
use std::sync::Arc;

/// Fluent builder producing an immutable [`Graph`].
///
/// Declaration methods consume `self`; the ones that can fail return
/// `Result<Self, GraphError>` so configuration mistakes surface at the
/// declaration site.
///
/// # Example
///
/// ```rust
/// use waymark::{state_enum, GraphBuilder};
///
/// state_enum! {
///     pub enum DocumentState {
///         Draft,
///         Review,
///         Published,
///     }
/// }
///
/// # fn main() -> Result<(), waymark::GraphError> {
/// let graph = GraphBuilder::new()
///     .initial(DocumentState::Draft)?
///     .state(DocumentState::Review)
///     .state(DocumentState::Published)
///     .transition(DocumentState::Draft, &[DocumentState::Review])?
///     .event("publish", DocumentState::Review, DocumentState::Published)?
///     .guard_transition(None, Some(DocumentState::Published), |_, _, metadata| {
///         metadata.contains_key("editor")
///     })?
///     .build()?;
///
/// assert_eq!(graph.states().len(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GraphBuilder<S: State> {
    states: Vec<S>,
    initial: Option<S>,
    edges: Vec<TransitionEdge<S>>,
    events: Vec<Event<S>>,
    before: Vec<Callback<S>>,
    after: Vec<Callback<S>>,
    after_commit: Vec<Callback<S>>,
    guards: Vec<Guard<S>>,
}

impl<S: State> GraphBuilder<S> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            initial: None,
            edges: Vec::new(),
            events: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            after_commit: Vec::new(),
            guards: Vec::new(),
        }
    }

    /// Declare a state. Duplicate declarations are skipped.
    pub fn state(mut self, state: S) -> Self {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
        self
    }

    /// Declare a state and mark it as the initial state.
    ///
    /// Fails with [`GraphError::DuplicateInitialState`] if a different
    /// initial state was already declared.
    pub fn initial(mut self, state: S) -> Result<Self, GraphError> {
        if let Some(existing) = &self.initial {
            if *existing != state {
                return Err(GraphError::DuplicateInitialState {
                    existing: existing.name().to_string(),
                    requested: state.name().to_string(),
                });
            }
            return Ok(self);
        }
        self.initial = Some(state.clone());
        Ok(self.state(state))
    }

    /// Declare that `from` may transition to each state in `to`.
    ///
    /// Fails with [`GraphError::InvalidState`] when `from` or any target is
    /// undeclared, and [`GraphError::EmptyTarget`] when `to` is empty.
    /// Appends to the adjacency list; duplicate declarations are kept.
    pub fn transition(mut self, from: S, to: &[S]) -> Result<Self, GraphError> {
        self.validate_declared(&from)?;
        if to.is_empty() {
            return Err(GraphError::EmptyTarget {
                from: from.name().to_string(),
            });
        }
        for target in to {
            self.validate_declared(target)?;
        }
        self.edges.push(TransitionEdge {
            from,
            to: to.to_vec(),
        });
        Ok(self)
    }

    /// Declare a named event moving `from` to `to`.
    ///
    /// Registers the edge exactly like [`transition`](Self::transition), then
    /// adds the mapping. Fails with [`GraphError::EventConflict`] if the
    /// event already maps `from` to a different target; mapping the same
    /// pair twice is a no-op.
    pub fn event(self, name: &str, from: S, to: S) -> Result<Self, GraphError> {
        let mut builder = self.transition(from.clone(), std::slice::from_ref(&to))?;
        builder.add_event_mapping(name, from, to)?;
        Ok(builder)
    }

    fn add_event_mapping(&mut self, name: &str, from: S, to: S) -> Result<(), GraphError> {
        if let Some(event) = self.events.iter_mut().find(|e| e.name == name) {
            if let Some((_, existing)) = event.mappings.iter().find(|(f, _)| *f == from) {
                if *existing == to {
                    return Ok(());
                }
                return Err(GraphError::EventConflict {
                    event: name.to_string(),
                    from: from.name().to_string(),
                    existing: existing.name().to_string(),
                    requested: to.name().to_string(),
                });
            }
            event.mappings.push((from, to));
            return Ok(());
        }
        self.events.push(Event {
            name: name.to_string(),
            mappings: vec![(from, to)],
        });
        Ok(())
    }

    /// Check that a callback or guard registered with this `(from, to)`
    /// filter could ever fire.
    ///
    /// Wildcard sides (`None`) are always accepted. A concrete `from` must
    /// have outgoing transitions, a concrete `to` must be the target of some
    /// transition, and a fully concrete pair must be a declared edge.
    pub fn validate_callback_condition(
        &self,
        from: Option<&S>,
        to: Option<&S>,
    ) -> Result<(), GraphError> {
        if let Some(state) = from {
            self.validate_declared(state)?;
        }
        if let Some(state) = to {
            self.validate_declared(state)?;
        }
        if let Some(state) = from {
            if !self.has_successors(state) {
                return Err(GraphError::TerminalState {
                    state: state.name().to_string(),
                });
            }
        }
        if let Some(state) = to {
            if !self.is_target(state) {
                return Err(GraphError::UnreachableState {
                    state: state.name().to_string(),
                });
            }
        }
        if let (Some(from), Some(to)) = (from, to) {
            if !self.edge_declared(from, to) {
                return Err(GraphError::InvalidTransition {
                    from: from.name().to_string(),
                    to: to.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Register a callback that runs after guards pass, before persistence.
    pub fn before_transition<F>(
        mut self,
        from: Option<S>,
        to: Option<S>,
        action: F,
    ) -> Result<Self, GraphError>
    where
        F: Fn(&S, &TransitionRecord<S>) + Send + Sync + 'static,
    {
        self.validate_callback_condition(from.as_ref(), to.as_ref())?;
        self.before.push(Callback::new(from, to, Arc::new(action)));
        Ok(self)
    }

    /// Register a callback that runs once persistence succeeds.
    pub fn after_transition<F>(
        mut self,
        from: Option<S>,
        to: Option<S>,
        action: F,
    ) -> Result<Self, GraphError>
    where
        F: Fn(&S, &TransitionRecord<S>) + Send + Sync + 'static,
    {
        self.validate_callback_condition(from.as_ref(), to.as_ref())?;
        self.after.push(Callback::new(from, to, Arc::new(action)));
        Ok(self)
    }

    /// Register a callback that runs strictly after the durable commit.
    pub fn after_commit<F>(
        mut self,
        from: Option<S>,
        to: Option<S>,
        action: F,
    ) -> Result<Self, GraphError>
    where
        F: Fn(&S, &TransitionRecord<S>) + Send + Sync + 'static,
    {
        self.validate_callback_condition(from.as_ref(), to.as_ref())?;
        self.after_commit
            .push(Callback::new(from, to, Arc::new(action)));
        Ok(self)
    }

    /// Register a guard evaluated before any persistence happens.
    ///
    /// A `false` return rejects the transition.
    pub fn guard_transition<F>(
        mut self,
        from: Option<S>,
        to: Option<S>,
        predicate: F,
    ) -> Result<Self, GraphError>
    where
        F: Fn(&S, &S, &Metadata) -> bool + Send + Sync + 'static,
    {
        self.validate_callback_condition(from.as_ref(), to.as_ref())?;
        self.guards.push(Guard::new(from, to, Arc::new(predicate)));
        Ok(self)
    }

    /// Import another graph's configuration: initial state, states
    /// (skipping duplicates), transition edges, events, and callbacks and
    /// guards, each re-validated as if freshly declared.
    ///
    /// Lets a graph definition be composed and extended without
    /// re-declaring its base.
    pub fn extend(mut self, base: &Graph<S>) -> Result<Self, GraphError> {
        for state in base.states() {
            self = self.state(state.clone());
        }
        self = self.initial(base.initial_state().clone())?;
        for edge in base.edges() {
            self = self.transition(edge.from.clone(), &edge.to)?;
        }
        for event in base.events() {
            for (from, to) in &event.mappings {
                self.add_event_mapping(&event.name, from.clone(), to.clone())?;
            }
        }
        for callback in base.callbacks(CallbackPhase::Before) {
            let filter = callback.filter();
            self.validate_callback_condition(filter.from.as_ref(), filter.to.as_ref())?;
            self.before.push(callback.clone());
        }
        for callback in base.callbacks(CallbackPhase::After) {
            let filter = callback.filter();
            self.validate_callback_condition(filter.from.as_ref(), filter.to.as_ref())?;
            self.after.push(callback.clone());
        }
        for callback in base.callbacks(CallbackPhase::AfterCommit) {
            let filter = callback.filter();
            self.validate_callback_condition(filter.from.as_ref(), filter.to.as_ref())?;
            self.after_commit.push(callback.clone());
        }
        for guard in base.guards() {
            let filter = guard.filter();
            self.validate_callback_condition(filter.from.as_ref(), filter.to.as_ref())?;
            self.guards.push(guard.clone());
        }
        Ok(self)
    }

    /// Finalize the graph.
    ///
    /// Fails with [`GraphError::MissingInitialState`] when no initial state
    /// was declared: a finalized graph must be able to answer the current
    /// state of an entity with no history.
    pub fn build(self) -> Result<Graph<S>, GraphError> {
        let initial = self.initial.ok_or(GraphError::MissingInitialState)?;
        Ok(Graph::from_parts(
            self.states,
            initial,
            self.edges,
            self.events,
            self.before,
            self.after,
            self.after_commit,
            self.guards,
        ))
    }

    fn validate_declared(&self, state: &S) -> Result<(), GraphError> {
        if self.states.contains(state) {
            Ok(())
        } else {
            Err(GraphError::InvalidState(state.name().to_string()))
        }
    }

    fn has_successors(&self, state: &S) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.from == *state && !edge.to.is_empty())
    }

    fn is_target(&self, state: &S) -> bool {
        self.edges.iter().any(|edge| edge.to.contains(state))
    }

    fn edge_declared(&self, from: &S, to: &S) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.from == *from && edge.to.contains(to))
    }
}

impl<S: State> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
