//! Best-effort metadata application
//!
//! Permission, ownership and timestamp changes frequently fail for
//! unprivileged callers. Those failures are captured as [`MetadataWarning`]s
//! and never abort an extraction; content failures remain [`Error`]s.
//!
//! [`Error`]: crate::Error

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use crate::platform;
use filetime::FileTime;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Applies metadata to restored filesystem entries
///
/// [`HostMetadata`] performs the real system calls. Alternative
/// implementations let callers observe or restrict metadata application.
pub trait MetadataWriter: Send + Sync {
    /// Set permission bits
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Set access and modification times
    fn set_times(&self, path: &Path, accessed: FileTime, modified: FileTime) -> io::Result<()>;

    /// Set numeric owner and group, following symlinks
    fn set_owner(&self, path: &Path, uid: u64, gid: u64) -> io::Result<()>;

    /// Set numeric owner and group of a symlink itself
    fn set_symlink_owner(&self, path: &Path, uid: u64, gid: u64) -> io::Result<()>;
}

/// The host's own metadata system calls
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMetadata;

impl MetadataWriter for HostMetadata {
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        platform::set_mode(path, mode)
    }

    fn set_times(&self, path: &Path, accessed: FileTime, modified: FileTime) -> io::Result<()> {
        filetime::set_file_times(path, accessed, modified)
    }

    fn set_owner(&self, path: &Path, uid: u64, gid: u64) -> io::Result<()> {
        platform::set_owner(path, uid, gid)
    }

    fn set_symlink_owner(&self, path: &Path, uid: u64, gid: u64) -> io::Result<()> {
        platform::set_symlink_owner(path, uid, gid)
    }
}

/// Which metadata step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStep {
    /// Permission bits
    Mode,
    /// Access and modification times
    Times,
    /// Owner and group
    Owner,
}

impl fmt::Display for MetadataStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mode => "mode",
            Self::Times => "times",
            Self::Owner => "owner",
        })
    }
}

/// A metadata step that could not be applied to a restored entry
#[derive(Error, Debug)]
#[error("could not restore {step} of {}", path.display())]
pub struct MetadataWarning {
    /// The restored path
    pub path: PathBuf,
    /// The step that failed
    pub step: MetadataStep,
    /// The system call error
    #[source]
    pub source: io::Error,
}

/// Desired metadata for one restored path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    /// Permission bits
    pub mode: u32,
    /// Access time
    pub accessed: FileTime,
    /// Modification time
    pub modified: FileTime,
    /// Numeric owner
    pub uid: u64,
    /// Numeric group
    pub gid: u64,
}

/// Runs metadata steps through a [`MetadataWriter`] and collects failures
pub(crate) struct MetadataApplier<'a> {
    writer: &'a dyn MetadataWriter,
    warnings: Vec<MetadataWarning>,
}

impl<'a> MetadataApplier<'a> {
    pub(crate) fn new(writer: &'a dyn MetadataWriter) -> Self {
        Self {
            writer,
            warnings: Vec::new(),
        }
    }

    /// Mode, then times, then ownership where the platform has it
    pub(crate) fn apply(&mut self, path: &Path, attributes: &Attributes) {
        let result = self.writer.set_mode(path, attributes.mode);
        self.record(path, MetadataStep::Mode, result);

        let result = self
            .writer
            .set_times(path, attributes.accessed, attributes.modified);
        self.record(path, MetadataStep::Times, result);

        if platform::SUPPORTS_OWNERSHIP {
            let result = self.writer.set_owner(path, attributes.uid, attributes.gid);
            self.record(path, MetadataStep::Owner, result);
        }
    }

    /// Ownership only; a symlink's mode and times are left alone
    pub(crate) fn apply_symlink(&mut self, path: &Path, uid: u64, gid: u64) {
        if platform::SUPPORTS_OWNERSHIP {
            let result = self.writer.set_symlink_owner(path, uid, gid);
            self.record(path, MetadataStep::Owner, result);
        }
    }

    pub(crate) fn into_warnings(self) -> Vec<MetadataWarning> {
        self.warnings
    }

    fn record(&mut self, path: &Path, step: MetadataStep, result: io::Result<()>) {
        if let Err(source) = result {
            tracing::debug!(
                path = %path.display(),
                step = %step,
                error = %source,
                "Metadata not restored"
            );
            self.warnings.push(MetadataWarning {
                path: path.to_path_buf(),
                step,
                source,
            });
        }
    }
}
