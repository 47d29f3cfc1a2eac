use super::{Ownership, StatTimes};
use crate::entry::DeviceKind;
use filetime::FileTime;
use std::fs::{self, DirBuilder, File, FileType, Metadata, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// Whether ownership can be read and restored on this platform
pub const SUPPORTS_OWNERSHIP: bool = true;

/// Access and change time with nanosecond precision
#[must_use]
pub fn stat_times(metadata: &Metadata) -> Option<StatTimes> {
    Some(StatTimes {
        accessed: FileTime::from_unix_time(metadata.atime(), nanos(metadata.atime_nsec())),
        changed: FileTime::from_unix_time(metadata.ctime(), nanos(metadata.ctime_nsec())),
    })
}

/// Numeric owner and group
#[must_use]
pub fn ownership(metadata: &Metadata) -> Ownership {
    Ownership {
        uid: u64::from(metadata.uid()),
        gid: u64::from(metadata.gid()),
    }
}

/// Permission bits including setuid, setgid and sticky
#[must_use]
pub fn permission_bits(metadata: &Metadata) -> u32 {
    metadata.mode() & 0o7777
}

/// Classify special files the tar format can carry
#[must_use]
pub fn device_kind(file_type: FileType) -> Option<DeviceKind> {
    if file_type.is_char_device() {
        Some(DeviceKind::Char)
    } else if file_type.is_block_device() {
        Some(DeviceKind::Block)
    } else if file_type.is_fifo() {
        Some(DeviceKind::Fifo)
    } else {
        None
    }
}

/// Apply permission bits
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode))
}

/// Change numeric owner and group
pub fn set_owner(path: &Path, uid: u64, gid: u64) -> io::Result<()> {
    std::os::unix::fs::chown(path, Some(id(uid)?), Some(id(gid)?))
}

/// Change ownership of a symlink itself, never its target
pub fn set_symlink_owner(path: &Path, uid: u64, gid: u64) -> io::Result<()> {
    std::os::unix::fs::lchown(path, Some(id(uid)?), Some(id(gid)?))
}

/// Create a symbolic link at `link` pointing to `target`
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

/// Create a directory and any missing parents with `mode` (subject to umask)
pub fn create_dir_all(path: &Path, mode: u32) -> io::Result<()> {
    DirBuilder::new().recursive(true).mode(mode).create(path)
}

/// Create or truncate a regular file, using `mode` when it is newly created
pub fn create_file(path: &Path, mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

fn nanos(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn id(value: u64) -> io::Result<u32> {
    u32::try_from(value).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("id {value} does not fit this platform"),
        )
    })
}
