//! cachemover - rebuild and restore build caches
//!
//! `rebuild` archives mount paths with [`cachemover_archive`], optionally
//! compresses the stream, and stores it under a key through a
//! [`cachemover_storage::Backend`]. `restore` reverses the trip into the
//! configured root, and `list` shows what is stored.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

/// CLI argument parsing.
pub mod cli;
/// Command implementations (rebuild, restore, list).
pub mod commands;
/// Archive stream compression.
pub mod compression;
/// Configuration file and override layering.
pub mod config;
/// CLI errors and exit codes.
pub mod errors;
/// Signal and deadline cancellation.
pub mod shutdown;
/// Tracing and logging configuration.
pub mod tracing;

pub use compression::Compression;
pub use config::Config;
pub use errors::{CliError, EXIT_CANCELLED, EXIT_CLI, EXIT_FAILURE, EXIT_OK, exit_code_for};
