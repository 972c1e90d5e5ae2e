//! Error types for LexRisk.
//!
//! Library crates use [`LexRiskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LexRisk operations.
#[derive(Debug, thiserror::Error)]
pub enum LexRiskError {
    /// The submitted document has no analyzable text.
    #[error("document is empty")]
    EmptyDocument,

    /// The submitted document exceeds the configured size limit.
    #[error("document too large: {chars} characters (max {max})")]
    DocumentTooLarge { chars: usize, max: usize },

    /// Missing credential, endpoint, or invalid configuration value.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure reaching the reasoning service (including timeouts).
    #[error("transport error: {0}")]
    Transport(String),

    /// The reasoning service answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The reasoning service's response could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The reasoning service's response decoded but carried no content.
    #[error("reasoning service returned an empty result")]
    EmptyResult,

    /// The job was cancelled by its owner.
    #[error("analysis cancelled")]
    Cancelled,

    /// No active job or cache entry exists for the identity.
    #[error("no active analysis or cached file for user {identity}")]
    NotFound { identity: String },

    /// Indexing / similarity-search collaborator failure.
    #[error("indexing error: {0}")]
    Indexing(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid format, bad stored value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LexRiskError>;

impl LexRiskError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for an identity.
    pub fn not_found(identity: impl std::fmt::Display) -> Self {
        Self::NotFound {
            identity: identity.to_string(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyDocument | Self::DocumentTooLarge { .. } => "INPUT_ERROR",
            Self::Config { .. } => "CONFIGURATION_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::UpstreamStatus { .. } => "UPSTREAM_STATUS_ERROR",
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::EmptyResult => "EMPTY_RESULT",
            Self::Cancelled => "CANCELLED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Indexing(_) => "INDEXING_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LexRiskError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = LexRiskError::UpstreamStatus {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn not_found_names_identity() {
        let err = LexRiskError::not_found("u1");
        assert!(err.to_string().contains("u1"));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn input_errors_share_code() {
        assert_eq!(LexRiskError::EmptyDocument.code(), "INPUT_ERROR");
        let err = LexRiskError::DocumentTooLarge { chars: 10, max: 5 };
        assert_eq!(err.code(), "INPUT_ERROR");
    }
}
