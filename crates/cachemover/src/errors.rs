//! CLI error types and exit codes

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use cachemover_archive::Aborted;
use cachemover_storage::StorageError;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Successful exit code
pub const EXIT_OK: i32 = 0;
/// Archive, storage or I/O failure exit code
pub const EXIT_FAILURE: i32 = 1;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Exit code after a signal or deadline cancelled the command (128 + SIGINT)
pub const EXIT_CANCELLED: i32 = 130;

/// Errors surfaced by cachemover commands
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    #[diagnostic(code(cachemover::cli::config))]
    Config {
        /// What is wrong
        message: String,
        /// How to fix it
        #[help]
        help: Option<String>,
    },

    /// The configuration file is not valid TOML for [`Config`](crate::config::Config)
    #[error("Failed to parse configuration file {}", path.display())]
    #[diagnostic(
        code(cachemover::cli::config_parse),
        help("See `cachemover --help` for the supported settings")
    )]
    ConfigParse {
        /// The file that failed to parse
        path: PathBuf,
        /// File contents
        #[source_code]
        src: NamedSource<String>,
        /// Where parsing failed
        #[label("{message}")]
        span: Option<SourceSpan>,
        /// Parser message
        message: String,
    },

    /// Creating or extracting the archive failed
    #[error("Archive {operation} failed")]
    #[diagnostic(code(cachemover::cli::archive))]
    Archive {
        /// "create" or "extract"
        operation: &'static str,
        /// The engine error with partial progress
        #[source]
        #[diagnostic_source]
        source: Aborted,
    },

    /// The storage backend failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Storage(#[from] StorageError),

    /// Local I/O outside the archive engine failed
    #[error("Failed to {operation} {}", path.display())]
    #[diagnostic(
        code(cachemover::cli::io),
        help("Check file permissions and available disk space")
    )]
    Io {
        /// What was being attempted
        operation: &'static str,
        /// Path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A signal or the configured deadline stopped the command
    #[error("{operation} was cancelled")]
    #[diagnostic(
        code(cachemover::cli::cancelled),
        help("Raise --timeout if the deadline is too short")
    )]
    Cancelled {
        /// The command that was running
        operation: &'static str,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a parse error pointing into the configuration file
    #[must_use]
    pub fn config_parse(path: &Path, src: String, err: &toml::de::Error) -> Self {
        Self::ConfigParse {
            path: path.to_path_buf(),
            src: NamedSource::new(path.display().to_string(), src),
            span: err.span().map(SourceSpan::from),
            message: err.message().to_string(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Create a cancellation error
    #[must_use]
    pub const fn cancelled(operation: &'static str) -> Self {
        Self::Cancelled { operation }
    }
}

/// Map an error to the process exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } | CliError::ConfigParse { .. } => EXIT_CLI,
        CliError::Cancelled { .. } | CliError::Storage(StorageError::Cancelled { .. }) => {
            EXIT_CANCELLED
        }
        CliError::Archive { .. } | CliError::Storage(_) | CliError::Io { .. } => EXIT_FAILURE,
    }
}
