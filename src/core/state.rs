//! Core State trait for machine states.
//!
//! Every state attached to a graph implements this trait. States are plain
//! immutable values; whether a state is terminal is a property of the
//! configured graph (a state with no outgoing transitions), not of the value
//! itself.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for machine states.
///
/// # Required Traits
///
/// - `Clone`: states are copied into transition records
/// - `PartialEq`: states are compared during validation and dispatch
/// - `Debug`: states must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: states are persisted inside transition
///   records
///
/// The [`state_enum!`](crate::state_enum) macro generates an implementation
/// for a plain enum of states.
///
/// # Example
///
/// ```rust
/// use waymark::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum OrderState {
///     Pending,
///     Approved,
///     Rejected,
/// }
///
/// impl State for OrderState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Pending => "Pending",
///             Self::Approved => "Approved",
///             Self::Rejected => "Rejected",
///         }
///     }
/// }
///
/// assert_eq!(OrderState::Pending.name(), "Pending");
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    ///
    /// Also used to carry state identities inside errors, which store names
    /// rather than state values.
    fn name(&self) -> &str;
}
