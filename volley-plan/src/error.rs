//! Plan loading errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or building a test plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read plan file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse plan: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown element type '{0}'")]
    UnknownKind(String),

    #[error("Element type '{kind}' has no property '{property}'")]
    UnknownProperty { kind: String, property: String },

    #[error("Property '{property}' of '{kind}' must be a {expected}, got {found}")]
    PropertyType {
        kind: String,
        property: String,
        expected: &'static str,
        found: String,
    },

    #[error("Invalid plan: {0}")]
    Invalid(String),

    #[error("Tree error: {0}")]
    Control(#[from] volley_control::ControlError),
}

/// Result type alias for plan operations
pub type Result<T> = std::result::Result<T, PlanError>;
