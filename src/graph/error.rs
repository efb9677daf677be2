//! Graph configuration errors.

use thiserror::Error;

/// Errors raised while declaring states, transitions, events, or callbacks.
///
/// All of these indicate a configuration mistake: they surface while the
/// graph is being built and are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("initial state already declared as '{existing}', cannot redeclare as '{requested}'")]
    DuplicateInitialState { existing: String, requested: String },

    #[error("no initial state declared. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("state '{0}' has not been declared")]
    InvalidState(String),

    #[error("transition from '{from}' requires at least one target state")]
    EmptyTarget { from: String },

    #[error("'{from}' to '{to}' is not a declared transition")]
    InvalidTransition { from: String, to: String },

    #[error("state '{state}' has no outgoing transitions, a callback from it could never fire")]
    TerminalState { state: String },

    #[error("state '{state}' is never the target of a transition, a callback to it could never fire")]
    UnreachableState { state: String },

    #[error("event '{event}' already moves '{from}' to '{existing}', cannot remap to '{requested}'")]
    EventConflict {
        event: String,
        from: String,
        existing: String,
        requested: String,
    },
}
