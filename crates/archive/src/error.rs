//! Error types for the archive engine

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for archive operations
///
/// Every variant here is fatal to the operation that produced it. Failures
/// to restore permissions, ownership or timestamps are reported separately
/// as [`MetadataWarning`](crate::MetadataWarning) values and never surface
/// as an `Error`.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A requested source path could not be stat'd
    #[error("Source not reachable: {}", path.display())]
    #[diagnostic(
        code(cachemover::archive::source_unreachable),
        help("Make sure the file or directory exists and is readable")
    )]
    SourceUnreachable {
        /// The source path that was requested
        path: Box<Path>,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The archive stream is corrupt or truncated
    #[error("Archive not readable")]
    #[diagnostic(
        code(cachemover::archive::not_readable),
        help("The archive is corrupt or was truncated in transfer; rebuild the cache")
    )]
    ArchiveNotReadable {
        /// The underlying read error
        #[source]
        source: std::io::Error,
    },

    /// An entry type the engine cannot archive or restore
    #[error("Unsupported entry type {kind} for {path}")]
    #[diagnostic(code(cachemover::archive::unsupported_entry))]
    UnsupportedEntryType {
        /// Archive name or filesystem path of the offending entry
        path: String,
        /// Description of the type that was encountered
        kind: String,
    },

    /// An archive name could not be computed for a path
    #[error("Cannot name {} relative to {}: {reason}", path.display(), root.display())]
    #[diagnostic(
        code(cachemover::archive::path_resolution),
        help("Use paths that share a base with the archive root")
    )]
    PathResolution {
        /// Path that was being named
        path: Box<Path>,
        /// Archive root the name was computed against
        root: Box<Path>,
        /// Why the computation failed
        reason: String,
    },

    /// I/O error while reading sources or writing the destination
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(cachemover::archive::io),
        help("Check file permissions and available disk space")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "symlink")
        operation: String,
    },
}

impl Error {
    /// Create a source-unreachable error
    #[must_use]
    pub fn source_unreachable(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::SourceUnreachable {
            path: path.as_ref().into(),
            source,
        }
    }

    /// Create an archive-not-readable error
    #[must_use]
    pub fn archive_not_readable(source: std::io::Error) -> Self {
        Self::ArchiveNotReadable { source }
    }

    /// Create an unsupported-entry-type error
    #[must_use]
    pub fn unsupported_entry_type(path: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedEntryType {
            path: path.into(),
            kind: kind.into(),
        }
    }

    /// Create a path resolution error
    #[must_use]
    pub fn path_resolution(
        path: impl AsRef<Path>,
        root: impl AsRef<Path>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PathResolution {
            path: path.as_ref().into(),
            root: root.as_ref().into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }
}

/// A failed create or extract, with the progress made before the failure
///
/// Callers must treat the archive or restored tree as untrustworthy when they
/// receive this; `bytes_written` is reported for diagnostics only.
#[derive(Error, Debug, Diagnostic)]
#[error("{source} (after {bytes_written} bytes)")]
pub struct Aborted {
    /// Payload bytes written before the failure
    pub bytes_written: u64,
    /// The error that stopped the operation
    #[source]
    #[diagnostic_source]
    pub source: Error,
}

impl Aborted {
    /// Wrap an error with the progress made so far
    #[must_use]
    pub fn new(bytes_written: u64, source: Error) -> Self {
        Self {
            bytes_written,
            source,
        }
    }

    /// The error that stopped the operation
    #[must_use]
    pub fn into_inner(self) -> Error {
        self.source
    }
}

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, Error>;
