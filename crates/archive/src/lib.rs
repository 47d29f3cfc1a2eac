//! Tar archive engine for cachemover
//!
//! This crate turns a list of filesystem paths into a self-describing tar
//! stream and back:
//! - Recursive archive creation with root-relative or as-given entry names
//! - Extraction of regular files, directories, symlinks and hard links
//! - Optional preservation of permissions, ownership and timestamps
//!
//! # Header formats
//!
//! Without metadata preservation, entries use legacy GNU headers. With it,
//! every entry is preceded by a PAX extended header carrying access,
//! modification and change times with nanosecond precision plus numeric
//! ownership.
//!
//! # Metadata failures
//!
//! Restoring content always wins over restoring metadata. Failed `chmod`,
//! `chown` or `utimes` calls are returned as [`MetadataWarning`]s in the
//! [`Extracted`] outcome; they never abort an extraction.
//!
//! # Example
//!
//! ```no_run
//! use cachemover_archive::{Archive, ArchiveOptions, Naming};
//!
//! let archive = Archive::new(ArchiveOptions::new("/work").with_preserve_metadata(true));
//! let mut buffer = Vec::new();
//! archive.create(&["/work/target"], &mut buffer, Naming::RootRelative)?;
//! archive.extract("/restore", buffer.as_slice())?;
//! # Ok::<(), cachemover_archive::Aborted>(())
//! ```

mod archive;
pub mod entry;
mod error;
mod options;
pub mod path;
pub mod platform;
mod progress;
pub mod reader;
pub mod restore;
pub mod writer;

// Re-export error types at crate root
pub use error::{Aborted, Error, Result};

// Re-export main types
pub use archive::{Archive, Created, Extracted};
pub use entry::{DeviceKind, EntryKind, EntryMetadata};
pub use options::ArchiveOptions;
pub use path::{Naming, entry_name, relative_name, resolve_target};
pub use restore::{
    EntryRestorer, HostMetadata, MetadataStep, MetadataWarning, MetadataWriter,
    PendingDirectories,
};
pub use writer::EntryWriter;
