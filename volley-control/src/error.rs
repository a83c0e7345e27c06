//! Error types for tree building and controller walking

use crate::tree::NodeId;
use thiserror::Error;

/// Errors raised by the test tree and its resolvers
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Node {0} is not a thread group")]
    NotAThreadGroup(NodeId),

    #[error("Cannot resolve include '{path}': {message}")]
    Include { path: String, message: String },

    #[error("Includes nested deeper than {0} levels")]
    IncludeDepth(usize),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ControlError>;
