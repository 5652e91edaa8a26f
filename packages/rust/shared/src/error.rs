//! Error types for the Oireachtas corpus tools.
//!
//! Library crates use [`OireachtasError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all harvesting and flattening operations.
#[derive(Debug, thiserror::Error)]
pub enum OireachtasError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while paging a listing or downloading a document.
    #[error("network error: {0}")]
    Network(String),

    /// XML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad locator, unknown source, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Row sink (tabular writer) error.
    #[error("sink error: {0}")]
    Sink(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OireachtasError>;

impl OireachtasError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
