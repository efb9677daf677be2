//! Callbacks and guards attached to a graph.
//!
//! Both carry an optional `(from, to)` filter where `None` means "matches
//! any state". Callbacks are side-effecting hooks dispatched around
//! persistence; guards are predicates evaluated before it.

use crate::core::{Metadata, State, TransitionRecord};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Phase a callback is registered for.
///
/// Guards are not a phase: they run before any of these and are kept
/// separately by the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackPhase {
    /// After guards pass, before the record is persisted. Runs inside the
    /// adapter's atomic unit.
    Before,
    /// After persistence succeeds, still inside the atomic unit.
    After,
    /// Strictly after the atomic unit is durably committed. Never fires if
    /// the surrounding transaction rolls back.
    AfterCommit,
}

/// Side-effecting callback action.
///
/// Receives the state the entity is leaving and the transition record being
/// (or just) committed.
pub type CallbackFn<S> = Arc<dyn Fn(&S, &TransitionRecord<S>) + Send + Sync>;

/// Guard predicate.
///
/// Receives `(from, to, metadata)` and returns whether the transition may
/// proceed.
pub type GuardFn<S> = Arc<dyn Fn(&S, &S, &Metadata) -> bool + Send + Sync>;

/// Optional `(from, to)` filter shared by callbacks and guards.
#[derive(Clone, Debug)]
pub struct CallbackFilter<S: State> {
    pub from: Option<S>,
    pub to: Option<S>,
}

impl<S: State> CallbackFilter<S> {
    pub fn new(from: Option<S>, to: Option<S>) -> Self {
        Self { from, to }
    }

    /// Whether this filter selects the concrete `(from, to)` pair.
    ///
    /// True when any of the four registration shapes match:
    /// - both sides unset (fires on every transition)
    /// - `to` set and equal, `from` unset
    /// - `from` set and equal, `to` unset
    /// - both set and both equal
    pub fn applies_to(&self, from: &S, to: &S) -> bool {
        self.matches_all()
            || self.matches_to(to)
            || self.matches_from(from)
            || self.matches_both(from, to)
    }

    fn matches_all(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    fn matches_to(&self, to: &S) -> bool {
        self.from.is_none() && self.to.as_ref() == Some(to)
    }

    fn matches_from(&self, from: &S) -> bool {
        self.to.is_none() && self.from.as_ref() == Some(from)
    }

    fn matches_both(&self, from: &S, to: &S) -> bool {
        self.from.as_ref() == Some(from) && self.to.as_ref() == Some(to)
    }
}

/// A registered callback: filter + action.
#[derive(Clone)]
pub struct Callback<S: State> {
    filter: CallbackFilter<S>,
    action: CallbackFn<S>,
}

impl<S: State> Callback<S> {
    pub fn new(from: Option<S>, to: Option<S>, action: CallbackFn<S>) -> Self {
        Self {
            filter: CallbackFilter::new(from, to),
            action,
        }
    }

    pub fn filter(&self) -> &CallbackFilter<S> {
        &self.filter
    }

    pub fn applies_to(&self, from: &S, to: &S) -> bool {
        self.filter.applies_to(from, to)
    }

    /// Run the action for a selected transition.
    pub fn call(&self, from: &S, record: &TransitionRecord<S>) {
        (self.action)(from, record);
    }
}

impl<S: State> fmt::Debug for Callback<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Error carried out of a rejecting guard.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("guard rejected transition from '{from}' to '{to}'")]
pub struct GuardFailed {
    pub from: String,
    pub to: String,
}

/// A registered guard: filter + predicate.
///
/// A guard is a callback whose invocation wraps the predicate: a `false`
/// result becomes a [`GuardFailed`] carrying the `(from, to)` pair.
#[derive(Clone)]
pub struct Guard<S: State> {
    filter: CallbackFilter<S>,
    predicate: GuardFn<S>,
}

impl<S: State> Guard<S> {
    pub fn new(from: Option<S>, to: Option<S>, predicate: GuardFn<S>) -> Self {
        Self {
            filter: CallbackFilter::new(from, to),
            predicate,
        }
    }

    pub fn filter(&self) -> &CallbackFilter<S> {
        &self.filter
    }

    pub fn applies_to(&self, from: &S, to: &S) -> bool {
        self.filter.applies_to(from, to)
    }

    /// Evaluate the predicate without wrapping the result.
    pub fn check(&self, from: &S, to: &S, metadata: &Metadata) -> bool {
        (self.predicate)(from, to, metadata)
    }

    /// Evaluate the predicate, rejecting the transition on a `false` result.
    pub fn call(&self, from: &S, to: &S, metadata: &Metadata) -> Result<(), GuardFailed> {
        if self.check(from, to, metadata) {
            Ok(())
        } else {
            Err(GuardFailed {
                from: from.name().to_string(),
                to: to.name().to_string(),
            })
        }
    }
}

impl<S: State> fmt::Debug for Guard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
