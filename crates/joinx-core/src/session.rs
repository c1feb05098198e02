//! # Session Properties
//!
//! The per-query knobs this subsystem consults. There is exactly one today:
//! whether join reordering runs at all. When the flag is off both passes are
//! identity functions — the disabled path must return the input plan
//! untouched, not a rebuilt copy.

/// Session-level configuration for the optimization passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProperties {
    /// Enables cost-based join reordering and cross-join elimination.
    pub reorder_joins: bool,
}

impl SessionProperties {
    pub fn with_reorder_joins(reorder_joins: bool) -> Self {
        Self { reorder_joins }
    }
}

impl Default for SessionProperties {
    fn default() -> Self {
        // Off unless the session opts in, matching the engine default.
        Self {
            reorder_joins: false,
        }
    }
}
