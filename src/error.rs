//! Domain-specific error types for virtstage.
//!
//! This module defines `VirtstageError`, a `thiserror`-based enum that
//! provides typed error variants for common failure modes. Public API
//! functions return `Result<T, VirtstageError>` for programmatic error
//! handling, while orchestration boundaries continue to use `anyhow::Result`.
//!
//! `VirtstageError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at boundaries that return `anyhow::Result`.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly (e.g., "I/O error: connection refused").
///
/// The path or operation context is provided separately via
/// `VirtstageError::Io { context }`.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for virtstage.
///
/// Provides typed variants for common failure modes, enabling callers
/// to match on error kinds programmatically rather than parsing error
/// message strings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VirtstageError {
    /// A validation constraint was violated (e.g., an install location
    /// that does not resolve to usable media).
    #[error("validation error: {0}")]
    Validation(String),

    /// An external packaging tool failed (non-zero exit, spawn failure,
    /// signal termination, etc.).
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command line that was executed.
        command: String,
        /// Human-readable reason for the failure: exit code plus any
        /// captured standard-error output, or a description of the
        /// internal error (e.g., wait failure).
        status: String,
    },

    /// An external tool required by the media pipeline is not installed.
    #[error("command not found in PATH: {command}")]
    CommandNotFound {
        /// The command that could not be resolved.
        command: String,
    },

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred.
        ///
        /// This is either a file path (e.g., `"/var/lib/media.iso"`) or an
        /// operation description with a path (e.g., `"failed to copy
        /// injection file: /path/to/ks.cfg"`). Combined with `message` in
        /// the Display format: `"{context}: {message}"`.
        context: String,
        /// Human-readable description of the I/O failure, derived from
        /// [`io_error_kind_message`] for consistent formatting across the
        /// codebase.
        message: String,
        /// The underlying I/O error, preserved for programmatic inspection
        /// (e.g., `source.kind() == ErrorKind::PermissionDenied`).
        #[source]
        source: std::io::Error,
    },

    /// Removing staged temporary files or volumes partially failed.
    ///
    /// Missing files are tolerated during cleanup; everything else is
    /// collected into this aggregated report. The ephemeral collections
    /// are cleared regardless, so the installer stays reusable.
    #[error("cleanup failed: {0}")]
    Cleanup(String),
}

impl VirtstageError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    ///
    /// This is the preferred way to construct `Io` errors, ensuring that
    /// the `message` field is always consistent with the `source`.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }
}
