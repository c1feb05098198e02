//! # Application State
//!
//! Shared state for all request handlers, created once at startup and passed
//! around via `Arc`. The passes themselves are stateless; the only
//! server-level knob is the default for the reorder flag, which individual
//! requests may override.

/// Server-level optimizer configuration.
pub struct OptimizerConfig {
    /// Default for requests that do not specify `reorderJoins` themselves.
    pub reorder_joins: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            reorder_joins: true,
        }
    }
}

/// Shared application state, accessible via Axum's State extractor.
pub struct AppState {
    pub config: OptimizerConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            config: OptimizerConfig::default(),
        }
    }
}
