//! Process-wide defaults.
//!
//! Machines always receive their graph and adapter explicitly; this module
//! only carries defaults for knobs that are awkward to thread everywhere,
//! currently the conflict-retry attempt count.
//!
//! # Lifecycle
//!
//! The config initializes itself to [`Config::default`] on first use.
//! Tests that call [`configure`] should call [`reset`] when done so other
//! tests observe the defaults again.

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Tunable process-wide defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Total attempts [`retry_conflicts`](crate::machine::retry_conflicts)
    /// gives an operation before surfacing the conflict.
    pub max_transition_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_transition_attempts: 3,
        }
    }
}

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Mutate the process-wide config.
pub fn configure(f: impl FnOnce(&mut Config)) {
    f(&mut CONFIG.write());
}

/// A copy of the current config.
pub fn current() -> Config {
    CONFIG.read().clone()
}

/// Restore the defaults. Intended for test teardown.
pub fn reset() {
    *CONFIG.write() = Config::default();
}
