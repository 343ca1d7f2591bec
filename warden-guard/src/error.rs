//! Error types for the warden-guard data-quality engine.
//!
//! This module provides a comprehensive error handling strategy using `thiserror`
//! for automatic error trait implementations. All errors in the library are
//! represented by the `WardenError` enum.

use thiserror::Error;

/// The main error type for the warden-guard library.
///
/// This enum represents all possible errors that can occur while building
/// and executing data-quality checks.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Error related to check or run configuration.
    ///
    /// Raised at construction time, before any query has been executed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error while executing a query against the backing engine.
    #[error("Query execution failed for '{check}': {message}")]
    Execution {
        /// Name of the check whose query failed
        check: String,
        /// Detailed error message from the engine
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error when parsing dates, value sets, or other declarative inputs.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error while deserializing a run configuration.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, WardenError>`.
///
/// This is the standard `Result` type used throughout the library.
pub type Result<T> = std::result::Result<T, WardenError>;

impl WardenError {
    /// Creates a new query execution error for the named check.
    pub fn execution(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            check: check.into(),
            message: message.into(),
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<WardenError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            match base_error {
                WardenError::Internal(inner) => {
                    WardenError::Internal(format!("{}: {}", msg, inner))
                }
                other => WardenError::Internal(format!("{}: {}", msg, other)),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            let base_error = e.into();
            match base_error {
                WardenError::Internal(inner) => {
                    WardenError::Internal(format!("{}: {}", msg, inner))
                }
                other => WardenError::Internal(format!("{}: {}", msg, other)),
            }
        })
    }
}
