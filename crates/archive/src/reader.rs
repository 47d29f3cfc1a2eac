//! Sequential archive reader
//!
//! The `tar` crate folds GNU long-name records and PAX local headers into the
//! entry that follows them; this module turns each resulting entry into an
//! [`EntryMetadata`], reading times and ownership from PAX records when present.

use crate::entry::{EntryKind, EntryMetadata, parse_pax_time};
use crate::error::{Error, Result};
use filetime::FileTime;
use std::io::{self, Read};

/// Visit every entry of a tar stream in order
///
/// A stream error surfaces as [`Error::ArchiveNotReadable`]; an error returned
/// by `visit` stops the iteration and is returned unchanged.
pub fn read_entries<R, F>(source: R, mut visit: F) -> Result<()>
where
    R: Read,
    F: FnMut(&EntryMetadata, &mut dyn Read) -> Result<()>,
{
    let mut archive = tar::Archive::new(source);
    let entries = archive.entries().map_err(Error::archive_not_readable)?;
    for entry in entries {
        let mut entry = entry.map_err(Error::archive_not_readable)?;
        let metadata = decode(&mut entry)?;
        visit(&metadata, &mut entry)?;
    }
    Ok(())
}

fn decode<R: Read>(entry: &mut tar::Entry<'_, R>) -> Result<EntryMetadata> {
    let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
    let link_target = entry
        .link_name_bytes()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    let size = entry.size();

    let header = entry.header();
    let kind = EntryKind::from_entry_type(header.entry_type());
    // Blank or unparsable numeric fields read as zero; PAX records may still set them
    let mode = header.mode().unwrap_or(0) & 0o7777;
    let mut uid = header.uid().unwrap_or(0);
    let mut gid = header.gid().unwrap_or(0);
    let mtime = header.mtime().unwrap_or(0);
    let mut modified = FileTime::from_unix_time(i64::try_from(mtime).unwrap_or(i64::MAX), 0);
    let mut accessed = None;
    let mut changed = None;

    if let Some(extensions) = entry.pax_extensions().map_err(Error::archive_not_readable)? {
        for extension in extensions {
            let extension = extension.map_err(Error::archive_not_readable)?;
            let Ok(key) = extension.key() else {
                continue;
            };
            let value = extension.value().map_err(|_| invalid(&name, key))?;
            match key {
                "mtime" => modified = parse_pax_time(value).ok_or_else(|| invalid(&name, key))?,
                "atime" => accessed = Some(parse_pax_time(value).ok_or_else(|| invalid(&name, key))?),
                "ctime" => changed = Some(parse_pax_time(value).ok_or_else(|| invalid(&name, key))?),
                "uid" => uid = value.parse().map_err(|_| invalid(&name, key))?,
                "gid" => gid = value.parse().map_err(|_| invalid(&name, key))?,
                _ => {}
            }
        }
    }

    Ok(EntryMetadata {
        name,
        kind,
        mode,
        size,
        modified,
        accessed,
        changed,
        uid,
        gid,
        link_target,
    })
}

fn invalid(name: &str, key: &str) -> Error {
    Error::archive_not_readable(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("invalid PAX {key} record for {name}"),
    ))
}
