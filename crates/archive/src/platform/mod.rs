//! Platform metadata access
//!
//! One implementation per target family is compiled in: [`unix`] reads the
//! POSIX `stat` structure, while the portable fallback reports no access or
//! change times and no ownership. Callers never branch on the platform; they
//! use [`stat_times`], [`ownership`] and [`SUPPORTS_OWNERSHIP`].

use filetime::FileTime;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::*;

#[cfg(not(unix))]
mod portable;
#[cfg(not(unix))]
pub use portable::*;

/// Access and change times read from a file's native status structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatTimes {
    /// Last access time
    pub accessed: FileTime,
    /// Last status change time
    pub changed: FileTime,
}

/// Numeric owner and group of a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    /// Owner user id
    pub uid: u64,
    /// Owner group id
    pub gid: u64,
}
