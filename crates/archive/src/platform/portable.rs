use super::{Ownership, StatTimes};
use crate::entry::DeviceKind;
use std::fs::{self, File, FileType, Metadata, OpenOptions};
use std::io;
use std::path::Path;

/// Whether ownership can be read and restored on this platform
pub const SUPPORTS_OWNERSHIP: bool = false;

/// Access and change times are not available here
#[must_use]
pub fn stat_times(_metadata: &Metadata) -> Option<StatTimes> {
    None
}

/// Ownership is not available here
#[must_use]
pub fn ownership(_metadata: &Metadata) -> Ownership {
    Ownership::default()
}

/// Approximate POSIX bits from the read-only flag
#[must_use]
pub fn permission_bits(metadata: &Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, false) => 0o755,
        (true, true) => 0o555,
        (false, false) => 0o644,
        (false, true) => 0o444,
    }
}

/// Classify special files the tar format can carry
#[must_use]
pub fn device_kind(_file_type: FileType) -> Option<DeviceKind> {
    None
}

/// Only the owner-write bit is meaningful: it maps to the read-only flag
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions)
}

/// Ownership cannot be restored here
pub fn set_owner(_path: &Path, _uid: u64, _gid: u64) -> io::Result<()> {
    Ok(())
}

/// Ownership cannot be restored here
pub fn set_symlink_owner(_path: &Path, _uid: u64, _gid: u64) -> io::Result<()> {
    Ok(())
}

/// Create a symbolic link at `link` pointing to `target`
#[cfg(windows)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Create a symbolic link at `link` pointing to `target`
#[cfg(not(windows))]
pub fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Create a directory and any missing parents
pub fn create_dir_all(path: &Path, _mode: u32) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Create or truncate a regular file
pub fn create_file(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
