//! Unified error types for the gridflow workspace.
//!
//! This module provides a common error type [`GridError`] that can represent
//! errors from any part of the system. Domain-specific error types convert
//! into `GridError` for uniform handling at API boundaries.
//!
//! # Example
//!
//! ```ignore
//! use gridflow_core::{GridError, GridResult};
//!
//! fn run_solve(path: &str) -> GridResult<()> {
//!     let config = load_config(path)?;
//!     solve(&config)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all gridflow operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// I/O errors (capture files, log files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver/algorithm errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using GridError.
pub type GridResult<T> = Result<T, GridError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for GridError {
    fn from(err: anyhow::Error) -> Self {
        GridError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for GridError {
    fn from(s: String) -> Self {
        GridError::Other(s)
    }
}

impl From<&str> for GridError {
    fn from(s: &str) -> Self {
        GridError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridError::Solver("convergence failed".into());
        assert!(err.to_string().contains("Solver error"));
        assert!(err.to_string().contains("convergence failed"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let grid_err: GridError = io_err.into();
        assert!(matches!(grid_err, GridError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> GridResult<()> {
            Err(GridError::Validation("test".into()))
        }

        fn outer() -> GridResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
