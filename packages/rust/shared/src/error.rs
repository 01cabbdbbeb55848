//! Error types for lakeexport.
//!
//! Library crates use [`LakeExportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all lakeexport operations.
#[derive(Debug, thiserror::Error)]
pub enum LakeExportError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed JSON/YAML/document input.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Transport-level failure talking to the remote service.
    #[error("network error: {0}")]
    Network(String),

    /// The remote service rejected the token.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// The remote service answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unsafe path component, bad catalog, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Document-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LakeExportError>;

impl LakeExportError {
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

    /// Create an authentication error from any displayable message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth {
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

    /// Errors that must stop a crawl instead of being skipped per item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
