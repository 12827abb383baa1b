//! Error types for the agent loop

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (missing generator/executor, bad option values)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid input to an operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON parse error with the byte offset of the first failure
    #[error("Parse error at byte {position}: {message}")]
    Parse {
        /// Byte offset of the first error in the input
        position: usize,
        /// Short human-readable description
        message: String,
    },

    /// Input was not valid UTF-8
    #[error("Invalid UTF-8")]
    InvalidUtf8,

    /// A named entity (tool, key, message) was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The iteration cap was reached while a tool call was still pending
    #[error("Maximum iterations reached")]
    MaxIterations,

    /// A host callback reported failure
    #[error("Callback failed: {0}")]
    Callback(String),

    /// The host generator reported failure
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// The run was cancelled via `stop()`
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new parse error at a byte offset
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a new callback error
    pub fn callback(msg: impl Into<String>) -> Self {
        Error::Callback(msg.into())
    }

    /// Create a new generation error
    pub fn generation(msg: impl Into<String>) -> Self {
        Error::Generation(msg.into())
    }

    /// Create a new tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = Error::config("generator is required");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: generator is required"
        );
    }

    #[test]
    fn test_error_parse_position() {
        let err = Error::parse(17, "Expected ':'");
        assert_eq!(err.to_string(), "Parse error at byte 17: Expected ':'");
        match err {
            Error::Parse { position, .. } => assert_eq!(position, 17),
            _ => panic!("Expected parse error"),
        }
    }

    #[test]
    fn test_error_not_found() {
        let err = Error::not_found("tool 'search'");
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.to_string(), "Not found: tool 'search'");
    }

    #[test]
    fn test_error_cancelled_display() {
        assert_eq!(Error::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn test_error_max_iterations_display() {
        assert_eq!(
            Error::MaxIterations.to_string(),
            "Maximum iterations reached"
        );
    }

    #[test]
    fn test_result_type_alias() {
        fn _returns_result() -> Result<i32> {
            Ok(42)
        }

        fn _returns_error() -> Result<i32> {
            Err(Error::Cancelled)
        }
    }
}
