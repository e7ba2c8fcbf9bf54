//! Error types for DealScope.
//!
//! Library crates use [`DealScopeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all DealScope operations.
#[derive(Debug, thiserror::Error)]
pub enum DealScopeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Non-success response from the CRM API. Fatal to the aggregation run:
    /// a document missing an entire data category would silently mislead the
    /// downstream model, so no partial documents are produced.
    #[error("upstream fetch failed ({operation}): {message}")]
    UpstreamFetch { operation: String, message: String },

    /// Malformed payload from a remote endpoint.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Analysis API error (request, transport, or response shape).
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid argument, unknown id, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DealScopeError>;

impl DealScopeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an upstream fetch error tagged with the failing operation.
    pub fn upstream(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UpstreamFetch {
            operation: operation.into(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DealScopeError::config("missing access token");
        assert_eq!(err.to_string(), "config error: missing access token");

        let err = DealScopeError::upstream("list contacts associations", "HTTP 503");
        assert_eq!(
            err.to_string(),
            "upstream fetch failed (list contacts associations): HTTP 503"
        );
    }
}
