//! Entry restorer: one archive entry in, one filesystem node out

mod metadata;
mod pending;

pub use metadata::{Attributes, HostMetadata, MetadataStep, MetadataWarning, MetadataWriter};
pub use pending::PendingDirectories;

use crate::entry::{EntryKind, EntryMetadata};
use crate::error::{Error, Result};
use crate::path::resolve_target;
use crate::platform;
use crate::progress::ProgressReader;
use metadata::MetadataApplier;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Mode for directories created before their own metadata is known
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Recreates archive entries under a destination root
///
/// Directory metadata is deferred while metadata preservation is on; call
/// [`finish`](Self::finish) after the last entry to apply it.
pub struct EntryRestorer<'a> {
    dst: &'a Path,
    preserve_metadata: bool,
    applier: MetadataApplier<'a>,
    pending: PendingDirectories,
    bytes_written: u64,
    entries: u64,
}

impl<'a> EntryRestorer<'a> {
    /// A restorer writing under `dst`
    pub fn new(dst: &'a Path, preserve_metadata: bool, writer: &'a dyn MetadataWriter) -> Self {
        Self {
            dst,
            preserve_metadata,
            applier: MetadataApplier::new(writer),
            pending: PendingDirectories::new(),
            bytes_written: 0,
            entries: 0,
        }
    }

    /// Payload bytes written so far
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Entries restored so far
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Restore one entry, reading its payload from `payload`
    ///
    /// Returns the payload bytes written.
    pub fn restore(&mut self, entry: &EntryMetadata, payload: &mut dyn Read) -> Result<u64> {
        if let EntryKind::Unknown(_) = entry.kind {
            return Err(Error::unsupported_entry_type(
                entry.name.clone(),
                entry.kind.to_string(),
            ));
        }
        if entry.kind == EntryKind::GlobalHeader {
            tracing::trace!(name = %entry.name, "Skipping global extended header");
            return Ok(0);
        }

        let target = resolve_target(self.dst, &entry.name);
        if let Some(parent) = target.parent() {
            platform::create_dir_all(parent, DEFAULT_DIR_MODE)
                .map_err(|e| Error::io(e, parent, "create parent directory"))?;
        }

        let written = match entry.kind {
            EntryKind::Directory => {
                self.restore_directory(entry, &target)?;
                0
            }
            EntryKind::Symlink => {
                self.restore_symlink(entry, &target)?;
                0
            }
            EntryKind::HardLink => {
                self.restore_hard_link(entry, &target)?;
                0
            }
            _ => self.restore_file(entry, &target, payload)?,
        };

        self.entries += 1;
        tracing::trace!(path = %target.display(), kind = %entry.kind, bytes = written, "Restored entry");
        Ok(written)
    }

    /// Apply deferred directory metadata and return every metadata warning
    pub fn finish(mut self) -> Vec<MetadataWarning> {
        if self.preserve_metadata {
            let pending = std::mem::take(&mut self.pending);
            pending.flush(&mut self.applier);
        }
        self.applier.into_warnings()
    }

    fn restore_directory(&mut self, entry: &EntryMetadata, target: &Path) -> Result<()> {
        if self.preserve_metadata {
            platform::create_dir_all(target, DEFAULT_DIR_MODE)
                .map_err(|e| Error::io(e, target, "create directory"))?;
            // A directory left read-only by an earlier restore must accept children
            unlock_directory(target);
            self.pending.record(target.to_path_buf(), attributes(entry));
        } else {
            platform::create_dir_all(target, entry.mode)
                .map_err(|e| Error::io(e, target, "create directory"))?;
        }
        Ok(())
    }

    fn restore_file(
        &mut self,
        entry: &EntryMetadata,
        target: &Path,
        payload: &mut dyn Read,
    ) -> Result<u64> {
        // Unlink first: truncating would follow a stale symlink or rewrite
        // every hard link to the old inode
        if fs::symlink_metadata(target).is_ok_and(|m| !m.is_dir()) {
            fs::remove_file(target).map_err(|e| Error::io(e, target, "remove"))?;
        }

        let mut file =
            platform::create_file(target, entry.mode).map_err(|e| Error::io(e, target, "create"))?;
        let mut reader = ProgressReader::new(payload);
        let copied = io::copy(&mut reader, &mut file);
        self.bytes_written += reader.count();
        drop(file);

        match copied {
            Err(e) if reader.read_failed() => return Err(Error::archive_not_readable(e)),
            Err(e) => return Err(Error::io(e, target, "write")),
            Ok(n) if n < entry.size => {
                return Err(Error::archive_not_readable(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} ended after {n} of {} bytes", entry.name, entry.size),
                )));
            }
            Ok(_) => {}
        }

        if self.preserve_metadata {
            self.applier.apply(target, &attributes(entry));
        }
        Ok(reader.count())
    }

    fn restore_symlink(&mut self, entry: &EntryMetadata, target: &Path) -> Result<()> {
        let link = link_target(entry)?;
        unlink(target)?;
        platform::symlink(Path::new(link), target)
            .map_err(|e| Error::io(e, target, "symlink"))?;

        if self.preserve_metadata {
            self.applier.apply_symlink(target, entry.uid, entry.gid);
        }
        Ok(())
    }

    fn restore_hard_link(&mut self, entry: &EntryMetadata, target: &Path) -> Result<()> {
        let source = resolve_target(self.dst, link_target(entry)?);
        unlink(target)?;
        fs::hard_link(&source, target).map_err(|e| Error::io(e, &source, "hard link"))?;

        if self.preserve_metadata {
            self.applier.apply(target, &attributes(entry));
        }
        Ok(())
    }
}

fn attributes(entry: &EntryMetadata) -> Attributes {
    Attributes {
        mode: entry.mode,
        accessed: entry.accessed_or_modified(),
        modified: entry.modified,
        uid: entry.uid,
        gid: entry.gid,
    }
}

fn link_target(entry: &EntryMetadata) -> Result<&str> {
    entry.link_target.as_deref().ok_or_else(|| {
        Error::archive_not_readable(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} entry {} has no link target", entry.kind, entry.name),
        ))
    })
}

/// Give the owner full access to an existing directory until its deferred
/// metadata is applied
fn unlock_directory(dir: &Path) {
    let Ok(metadata) = fs::metadata(dir) else {
        return;
    };
    let mode = platform::permission_bits(&metadata);
    if mode & 0o700 == 0o700 {
        return;
    }
    if let Err(e) = platform::set_mode(dir, mode | 0o700) {
        tracing::debug!(path = %dir.display(), error = %e, "Could not unlock existing directory");
    }
}

/// Remove whatever is at `path`; a non-empty directory is an error
fn unlink(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(existing) if existing.is_dir() => {
            fs::remove_dir(path).map_err(|e| Error::io(e, path, "remove directory"))
        }
        Ok(_) => fs::remove_file(path).map_err(|e| Error::io(e, path, "remove")),
        Err(_) => Ok(()),
    }
}
