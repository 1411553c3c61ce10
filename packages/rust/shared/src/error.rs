//! Error types for Docuify.
//!
//! Library crates use [`DocuifyError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Preload failures are deliberately absent: the preloader reports them in its
//! result instead of failing, so a failed build and a partially warmed cache
//! never look alike.

use std::path::PathBuf;

/// Top-level error type for all Docuify operations.
#[derive(Debug, thiserror::Error)]
pub enum DocuifyError {
    /// Missing or malformed configuration (source parameters, config file).
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A content source could not produce its item list.
    #[error("source `{source_name}` failed to fetch: {message}")]
    SourceFetch {
        source_name: String,
        message: String,
    },

    /// `load()` was requested on a file whose item carried no loader.
    #[error("no content loader for {path}")]
    NoContentLoader { path: String },

    /// A content operation was requested on a folder.
    #[error("{path} is not a file")]
    NotAFile { path: String },

    /// A registered transform failed while processing a file's content.
    #[error("transform #{index} failed for {path}: {message}")]
    Transform {
        path: String,
        index: usize,
        message: String,
    },

    /// The raw content loader of a file failed.
    #[error("failed to load content for {path}: {message}")]
    ContentLoad { path: String, message: String },

    /// The item list cannot be assembled into a tree.
    #[error("invalid tree input at {path}: {message}")]
    InvalidTree { path: String, message: String },

    /// A plugin hook reported a failure.
    #[error("plugin `{plugin}` failed: {message}")]
    Plugin { plugin: String, message: String },

    /// Network/HTTP error.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Parsing error (JSON, YAML, patterns).
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocuifyError>;

impl DocuifyError {
    /// Create a configuration error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: msg.into(),
        }
    }

    /// Create a source fetch error.
    pub fn source_fetch(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SourceFetch {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a content load error for the file at `path`.
    pub fn content_load(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ContentLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a plugin error.
    pub fn plugin(plugin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
