//! Error types for the engine

use thiserror::Error;
use volley_control::ControlError;
use volley_core::VolleyError;

/// Errors raised while configuring or running a test
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Test plan is invalid: {} error(s)", .0.len())]
    InvalidPlan(Vec<String>),

    #[error("No test plan configured")]
    NoTestPlan,

    #[error("A test is already running")]
    AlreadyRunning,

    #[error("Failed to start thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Listener '{name}' failed to start: {source}")]
    Listener {
        name: String,
        #[source]
        source: VolleyError,
    },

    #[error("Control error: {0}")]
    Control(#[from] ControlError),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
