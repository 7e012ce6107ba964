//! Error types for docbuild.
//!
//! Library crates use [`DocBuildError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::{Path, PathBuf};

/// Top-level error type for all documentation build operations.
#[derive(Debug, thiserror::Error)]
pub enum DocBuildError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An input line is missing its expected separator.
    #[error("malformed input at {path:?} line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// An external program could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// An invoked program did not exit within the configured bound.
    #[error("`{program}` timed out after {secs}s while running {subject}")]
    Timeout {
        program: String,
        subject: String,
        secs: u64,
    },

    /// The structured-text renderer failed.
    #[error("render error for {path:?}: {message}")]
    Render { path: PathBuf, message: String },

    /// The external API-doc extractor failed.
    #[error("extractor error: {message}")]
    Extractor { message: String },

    /// Data validation error (duplicate names, malformed fixture layout, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocBuildError>;

impl DocBuildError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Report a malformed line (1-based line number).
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create a render error for the given source document.
    pub fn render(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Render {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Read a file that may legitimately be absent.
///
/// `NotFound` yields `Ok(None)`; every other failure (permissions, I/O
/// faults) is returned as an error. Invalid UTF-8 is replaced, not rejected.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DocBuildError::io(path, e)),
    }
}

/// Read a file that must exist, replacing invalid UTF-8.
pub fn read_required(path: &Path) -> Result<String> {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| DocBuildError::io(path, e))
}
