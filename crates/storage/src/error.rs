//! Error types for storage backends

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for storage operations
#[derive(Error, Debug, Diagnostic)]
pub enum StorageError {
    /// I/O failure against the backing store
    #[error("Failed to {operation} '{}': {source}", path.display())]
    #[diagnostic(
        code(cachemover::storage::io),
        help("Check that the storage directory exists and is writable")
    )]
    Io {
        /// What was being attempted
        operation: &'static str,
        /// Path inside the backing store
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No object is stored under the key
    #[error("No object stored under key '{key}'")]
    #[diagnostic(code(cachemover::storage::not_found))]
    NotFound {
        /// The key that was looked up
        key: String,
    },

    /// The key cannot be mapped to a storage location
    #[error("Invalid key '{key}': {reason}")]
    #[diagnostic(
        code(cachemover::storage::invalid_key),
        help("Keys are relative, '/'-separated and must not contain '..'")
    )]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The operation was cancelled before it completed
    #[error("{operation} of '{key}' was cancelled")]
    #[diagnostic(code(cachemover::storage::cancelled))]
    Cancelled {
        /// The interrupted operation
        operation: &'static str,
        /// Key the operation was working on
        key: String,
    },
}

impl StorageError {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io_with_context(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an invalid-key error
    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled(operation: &'static str, key: impl Into<String>) -> Self {
        Self::Cancelled {
            operation,
            key: key.into(),
        }
    }

    /// Whether this error reports a missing object
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
