//! Error types for the mirrorcheck core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Repository errors
// ---------------------------------------------------------------------------

/// Errors from repository backends (Git, SVN) and the commands they run.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The version-control binary was not found on `$PATH`.
    #[error("{0} binary not found")]
    BinaryNotFound(String),

    /// A backend command exited with a non-zero status.
    #[error("command failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        exit_code: i32,
        stderr: String,
    },

    /// The path is not a repository (or working copy) the backend recognizes.
    #[error("no {kind} repository found at '{path}'")]
    RepositoryNotFound {
        kind: String,
        path: String,
    },

    /// The file does not exist at the requested revision.
    #[error("file '{path}' does not exist at revision {revision}")]
    FileNotFound {
        path: String,
        revision: String,
    },

    /// Backend output could not be parsed.
    #[error("failed to parse backend output: {0}")]
    ParseError(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("repository I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Transform errors
// ---------------------------------------------------------------------------

/// Errors raised while building a transform pipeline.
///
/// These are always configuration mistakes and surface before any
/// comparison runs.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A substitution pattern is not a valid regular expression.
    #[error("invalid substitution pattern '{pattern}': {detail}")]
    InvalidPattern {
        pattern: String,
        detail: String,
    },

    /// The marked-comment tag is empty or contains whitespace.
    #[error("invalid comment tag '{0}'")]
    InvalidTag(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
