//! Core error types for Volley

use thiserror::Error;

/// Core error type shared by the element model and the evaluator
#[derive(Debug, Error)]
pub enum VolleyError {
    /// Expression compilation errors
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),

    /// Property access errors
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    /// Function evaluation errors
    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Volley
pub type Result<T> = std::result::Result<T, VolleyError>;

/// Errors raised while compiling a `${...}` template
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("Invalid variable: {0}")]
    InvalidVariable(String),

    #[error("{function} called with wrong number of parameters. Expected {expected}, got {actual}")]
    ParameterCount {
        function: String,
        expected: String,
        actual: usize,
    },
}

/// Errors raised by typed property accessors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("Property not found: {0}")]
    Missing(String),

    #[error("Property {name} is not a valid {expected}: '{value}'")]
    Type {
        name: String,
        expected: &'static str,
        value: String,
    },
}

/// Errors raised while a function executes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("{function} failed: {message}")]
    Failed { function: String, message: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("No script engine configured for this thread")]
    NoScriptEngine,
}

impl FunctionError {
    pub fn failed(function: impl Into<String>, message: impl Into<String>) -> Self {
        FunctionError::Failed {
            function: function.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExprError::ParameterCount {
            function: "__Random".to_string(),
            expected: "2 to 3".to_string(),
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "__Random called with wrong number of parameters. Expected 2 to 3, got 1"
        );

        let wrapped: VolleyError = PropertyError::Missing("loops".into()).into();
        assert_eq!(wrapped.to_string(), "Property error: Property not found: loops");
    }
}
