//! The archive entry model shared by the writer and the reader

use filetime::FileTime;
use std::fmt;
use tar::EntryType;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Special file kinds carried as size-only entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Character device
    Char,
    /// Block device
    Block,
    /// Named pipe
    Fifo,
}

/// The kind of filesystem object an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file with payload
    Regular,
    /// Directory
    Directory,
    /// Symbolic link; the target is in `link_target`
    Symlink,
    /// Hard link to an earlier entry named in `link_target`
    HardLink,
    /// Character/block device or fifo; restored as a regular file
    Device(DeviceKind),
    /// PAX global extended header, which has no filesystem effect
    GlobalHeader,
    /// Any type flag the engine does not handle
    Unknown(u8),
}

impl EntryKind {
    /// Map a tar type flag to an entry kind
    #[must_use]
    pub fn from_entry_type(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Regular => Self::Regular,
            EntryType::Directory => Self::Directory,
            EntryType::Symlink => Self::Symlink,
            EntryType::Link => Self::HardLink,
            EntryType::Char => Self::Device(DeviceKind::Char),
            EntryType::Block => Self::Device(DeviceKind::Block),
            EntryType::Fifo => Self::Device(DeviceKind::Fifo),
            EntryType::XGlobalHeader => Self::GlobalHeader,
            other => Self::Unknown(other.as_byte()),
        }
    }

    /// The tar type flag for this kind
    #[must_use]
    pub fn entry_type(self) -> EntryType {
        match self {
            Self::Regular => EntryType::Regular,
            Self::Directory => EntryType::Directory,
            Self::Symlink => EntryType::Symlink,
            Self::HardLink => EntryType::Link,
            Self::Device(DeviceKind::Char) => EntryType::Char,
            Self::Device(DeviceKind::Block) => EntryType::Block,
            Self::Device(DeviceKind::Fifo) => EntryType::Fifo,
            Self::GlobalHeader => EntryType::XGlobalHeader,
            Self::Unknown(flag) => EntryType::new(flag),
        }
    }

    /// Whether entries of this kind carry payload bytes
    #[must_use]
    pub fn has_payload(self) -> bool {
        matches!(self, Self::Regular | Self::Device(_))
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => f.write_str("regular file"),
            Self::Directory => f.write_str("directory"),
            Self::Symlink => f.write_str("symlink"),
            Self::HardLink => f.write_str("hard link"),
            Self::Device(DeviceKind::Char) => f.write_str("character device"),
            Self::Device(DeviceKind::Block) => f.write_str("block device"),
            Self::Device(DeviceKind::Fifo) => f.write_str("fifo"),
            Self::GlobalHeader => f.write_str("global extended header"),
            Self::Unknown(flag) => write!(f, "type flag {:?}", char::from(*flag)),
        }
    }
}

/// Everything an archive entry records apart from its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Forward-slash separated archive name; directories end with `/`
    pub name: String,
    /// Entry kind
    pub kind: EntryKind,
    /// Permission bits
    pub mode: u32,
    /// Payload size in bytes (zero for anything but regular files)
    pub size: u64,
    /// Modification time
    pub modified: FileTime,
    /// Access time, when the header carried one
    pub accessed: Option<FileTime>,
    /// Status change time, when the header carried one
    pub changed: Option<FileTime>,
    /// Numeric owner
    pub uid: u64,
    /// Numeric group
    pub gid: u64,
    /// Link target for symlinks and hard links
    pub link_target: Option<String>,
}

impl EntryMetadata {
    /// Access time, falling back to the modification time
    #[must_use]
    pub fn accessed_or_modified(&self) -> FileTime {
        self.accessed.unwrap_or(self.modified)
    }
}

/// Render a time as a PAX decimal (`seconds[.fraction]`)
pub(crate) fn format_pax_time(time: FileTime) -> String {
    let seconds = time.unix_seconds();
    let nanos = time.nanoseconds();
    if nanos == 0 {
        return seconds.to_string();
    }

    // FileTime keeps nanoseconds positive, so negative times borrow a second
    let (sign, whole, fraction) = if seconds < 0 {
        ("-", -(seconds + 1), NANOS_PER_SEC - nanos)
    } else {
        ("", seconds, nanos)
    };
    let fraction = format!("{fraction:09}");
    format!("{sign}{whole}.{}", fraction.trim_end_matches('0'))
}

/// Parse a PAX decimal time; digits past nanosecond precision are truncated
pub(crate) fn parse_pax_time(value: &str) -> Option<FileTime> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let padded: String = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(9)
        .collect();
    let nanos: u32 = padded.parse().ok()?;

    Some(match (negative, nanos) {
        (false, _) => FileTime::from_unix_time(whole, nanos),
        (true, 0) => FileTime::from_unix_time(-whole, 0),
        (true, _) => FileTime::from_unix_time(-whole - 1, NANOS_PER_SEC - nanos),
    })
}
