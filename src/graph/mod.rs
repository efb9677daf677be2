//! State graphs: declared states, transitions, events, and the callbacks
//! and guards that run around them.
//!
//! A graph is configured once through [`GraphBuilder`], finalized with
//! `build()`, and read-only thereafter. Machines share one finalized graph
//! (typically behind an `Arc`) and never mutate it.

pub mod builder;
pub mod callback;
pub mod error;

pub use builder::GraphBuilder;
pub use callback::{
    Callback, CallbackFilter, CallbackFn, CallbackPhase, Guard, GuardFailed, GuardFn,
};
pub use error::GraphError;

use crate::core::State;

/// One declared adjacency entry: `from` may move to any state in `to`.
///
/// Entries are appended in declaration order and never collapsed, so a
/// transition declared twice appears twice.
#[derive(Clone, Debug)]
pub struct TransitionEdge<S: State> {
    pub from: S,
    pub to: Vec<S>,
}

/// A named event: semantic sugar over one or more `(from, to)` edges.
#[derive(Clone, Debug)]
pub struct Event<S: State> {
    pub name: String,
    pub mappings: Vec<(S, S)>,
}

/// A finalized, immutable state graph.
///
/// Holds the declared states, the initial state, the adjacency entries,
/// named events, and the callbacks/guards registered against transitions.
/// Construct one with [`GraphBuilder`].
///
/// # Example
///
/// ```rust
/// use waymark::{state_enum, GraphBuilder};
///
/// state_enum! {
///     pub enum OrderState {
///         Pending,
///         Approved,
///         Rejected,
///     }
/// }
///
/// # fn main() -> Result<(), waymark::GraphError> {
/// let graph = GraphBuilder::new()
///     .initial(OrderState::Pending)?
///     .state(OrderState::Approved)
///     .state(OrderState::Rejected)
///     .transition(OrderState::Pending, &[OrderState::Approved, OrderState::Rejected])?
///     .build()?;
///
/// assert_eq!(graph.initial_state(), &OrderState::Pending);
/// assert!(graph.transition_allowed(&OrderState::Pending, &OrderState::Approved));
/// assert!(!graph.transition_allowed(&OrderState::Approved, &OrderState::Pending));
/// # Ok(())
/// # }
/// ```
pub struct Graph<S: State> {
    states: Vec<S>,
    initial: S,
    edges: Vec<TransitionEdge<S>>,
    events: Vec<Event<S>>,
    before: Vec<Callback<S>>,
    after: Vec<Callback<S>>,
    after_commit: Vec<Callback<S>>,
    guards: Vec<Guard<S>>,
}

impl<S: State> Graph<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        states: Vec<S>,
        initial: S,
        edges: Vec<TransitionEdge<S>>,
        events: Vec<Event<S>>,
        before: Vec<Callback<S>>,
        after: Vec<Callback<S>>,
        after_commit: Vec<Callback<S>>,
        guards: Vec<Guard<S>>,
    ) -> Self {
        Self {
            states,
            initial,
            edges,
            events,
            before,
            after,
            after_commit,
            guards,
        }
    }

    /// The state an entity with no transition history is in.
    pub fn initial_state(&self) -> &S {
        &self.initial
    }

    /// All declared states, in declaration order.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// Adjacency entries, in declaration order.
    pub fn edges(&self) -> &[TransitionEdge<S>] {
        &self.edges
    }

    /// Named events, in declaration order.
    pub fn events(&self) -> &[Event<S>] {
        &self.events
    }

    /// States reachable from `from` in one transition.
    ///
    /// Concatenates every adjacency entry declared for `from`; duplicate
    /// declarations yield duplicate entries.
    pub fn successors(&self, from: &S) -> Vec<&S> {
        self.edges
            .iter()
            .filter(|edge| edge.from == *from)
            .flat_map(|edge| edge.to.iter())
            .collect()
    }

    /// Whether `(from, to)` is a declared transition.
    pub fn transition_allowed(&self, from: &S, to: &S) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.from == *from && edge.to.contains(to))
    }

    /// Resolve an event against a concrete origin state.
    ///
    /// Returns `None` when the event is unknown or has no mapping from
    /// `from`.
    pub fn event_target(&self, event: &str, from: &S) -> Option<&S> {
        self.events
            .iter()
            .find(|e| e.name == event)?
            .mappings
            .iter()
            .find(|(f, _)| f == from)
            .map(|(_, t)| t)
    }

    /// Callbacks registered for a phase, in registration order.
    pub fn callbacks(&self, phase: CallbackPhase) -> &[Callback<S>] {
        match phase {
            CallbackPhase::Before => &self.before,
            CallbackPhase::After => &self.after,
            CallbackPhase::AfterCommit => &self.after_commit,
        }
    }

    /// Guards, in registration order.
    pub fn guards(&self) -> &[Guard<S>] {
        &self.guards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::state_enum! {
        enum TestState {
            Pending,
            Approved,
            Rejected,
            Shipped,
        }
    }

    fn graph() -> Graph<TestState> {
        GraphBuilder::new()
            .initial(TestState::Pending)
            .unwrap()
            .state(TestState::Approved)
            .state(TestState::Rejected)
            .state(TestState::Shipped)
            .transition(TestState::Pending, &[TestState::Approved, TestState::Rejected])
            .unwrap()
            .transition(TestState::Approved, &[TestState::Shipped])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn successors_concatenate_declarations() {
        let graph = GraphBuilder::new()
            .initial(TestState::Pending)
            .unwrap()
            .state(TestState::Approved)
            .state(TestState::Rejected)
            .transition(TestState::Pending, &[TestState::Approved])
            .unwrap()
            .transition(TestState::Pending, &[TestState::Rejected])
            .unwrap()
            .build()
            .unwrap();

        let successors = graph.successors(&TestState::Pending);
        assert_eq!(successors, vec![&TestState::Approved, &TestState::Rejected]);
    }

    #[test]
    fn duplicate_declarations_do_not_collapse() {
        let graph = GraphBuilder::new()
            .initial(TestState::Pending)
            .unwrap()
            .state(TestState::Approved)
            .transition(TestState::Pending, &[TestState::Approved])
            .unwrap()
            .transition(TestState::Pending, &[TestState::Approved])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(graph.successors(&TestState::Pending).len(), 2);
    }

    #[test]
    fn transition_allowed_checks_declared_edges() {
        let graph = graph();
        assert!(graph.transition_allowed(&TestState::Pending, &TestState::Approved));
        assert!(graph.transition_allowed(&TestState::Approved, &TestState::Shipped));
        assert!(!graph.transition_allowed(&TestState::Rejected, &TestState::Shipped));
    }

    #[test]
    fn event_target_resolves_per_origin() {
        let graph = GraphBuilder::new()
            .initial(TestState::Pending)
            .unwrap()
            .state(TestState::Approved)
            .state(TestState::Shipped)
            .event("advance", TestState::Pending, TestState::Approved)
            .unwrap()
            .event("advance", TestState::Approved, TestState::Shipped)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            graph.event_target("advance", &TestState::Pending),
            Some(&TestState::Approved)
        );
        assert_eq!(
            graph.event_target("advance", &TestState::Approved),
            Some(&TestState::Shipped)
        );
        assert_eq!(graph.event_target("advance", &TestState::Shipped), None);
        assert_eq!(graph.event_target("missing", &TestState::Pending), None);
    }

    #[test]
    fn terminal_state_has_no_successors() {
        let graph = graph();
        assert!(graph.successors(&TestState::Shipped).is_empty());
        assert!(graph.successors(&TestState::Rejected).is_empty());
    }
}
