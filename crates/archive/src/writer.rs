//! Entry writer: one filesystem node in, one archive entry out
//!
//! Headers are assembled by hand rather than through `tar::Builder::append_data`
//! because archive names may be absolute, which the `tar` crate refuses to
//! encode. Legacy archives use GNU headers with `L`/`K` records for long names
//! and link targets. Extended archives precede every entry with a PAX record
//! carrying times, ownership and any long name.

use crate::entry::{EntryKind, EntryMetadata, format_pax_time};
use crate::error::{Error, Result};
use crate::options::ArchiveOptions;
use crate::path::{Naming, entry_name};
use crate::platform;
use crate::progress::ProgressReader;
use filetime::FileTime;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::Path;
use tar::{Builder, EntryType, Header};

const NAME_FIELD_LEN: usize = 100;
const LONG_RECORD_NAME: &[u8] = b"././@LongLink";

/// Writes filesystem nodes into a tar stream
pub struct EntryWriter<'a, W: Write> {
    builder: Builder<Sink<W>>,
    options: &'a ArchiveOptions,
    naming: Naming,
    bytes_written: u64,
    entries: u64,
}

impl<'a, W: Write> EntryWriter<'a, W> {
    /// Start a tar stream on `sink`
    pub fn new(sink: W, options: &'a ArchiveOptions, naming: Naming) -> Self {
        Self {
            builder: Builder::new(Sink {
                inner: sink,
                abandoned: false,
            }),
            options,
            naming,
            bytes_written: 0,
            entries: 0,
        }
    }

    /// Payload bytes copied into the stream so far
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Entries written so far
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Append the node at `path`, described by its (non-following) `metadata`
    ///
    /// Returns the payload bytes copied, which is zero for anything but a
    /// regular file. Skipped symlinks write nothing.
    pub fn write_entry(&mut self, path: &Path, metadata: &Metadata) -> Result<u64> {
        let kind = classify(path, metadata)?;
        if kind == EntryKind::Symlink && self.options.skip_symlinks {
            tracing::trace!(path = %path.display(), "Skipping symlink");
            return Ok(0);
        }

        let mut name = entry_name(&self.options.root, path, self.naming)?;
        if kind == EntryKind::Directory && !name.ends_with('/') {
            name.push('/');
        }
        let link_target = if kind == EntryKind::Symlink {
            Some(read_link(&self.options.root, path)?)
        } else {
            None
        };
        let entry = self.describe(name, kind, metadata, link_target);

        let written = if kind == EntryKind::Regular {
            self.append_file(path, &entry)?
        } else {
            self.append(&entry, io::empty())
                .map_err(|e| Error::io(e, path, "write archive"))?;
            0
        };

        self.entries += 1;
        tracing::trace!(name = %entry.name, kind = %kind, bytes = written, "Archived entry");
        Ok(written)
    }

    /// Terminate the tar stream and flush the sink
    pub fn finish(self) -> Result<W> {
        let mut sink = self
            .builder
            .into_inner()
            .map_err(|e| Error::io_no_path(e, "finish archive"))?
            .inner;
        sink.flush()
            .map_err(|e| Error::io_no_path(e, "flush archive"))?;
        Ok(sink)
    }

    /// Drop the stream without writing the end-of-archive marker
    ///
    /// An aborted archive must not look complete to a reader, so the
    /// terminating blocks `tar::Builder` writes on drop are refused.
    pub fn abandon(mut self) {
        self.builder.get_mut().abandoned = true;
        let _ = self.builder.get_mut().inner.flush();
    }

    fn describe(
        &self,
        name: String,
        kind: EntryKind,
        metadata: &Metadata,
        link_target: Option<String>,
    ) -> EntryMetadata {
        let modified = FileTime::from_last_modification_time(metadata);
        let owner = platform::ownership(metadata);
        let (accessed, changed) = if self.options.preserve_metadata {
            platform::stat_times(metadata).map_or((Some(modified), Some(modified)), |times| {
                (Some(times.accessed), Some(times.changed))
            })
        } else {
            (None, None)
        };

        EntryMetadata {
            name,
            kind,
            mode: platform::permission_bits(metadata),
            size: if kind == EntryKind::Regular {
                metadata.len()
            } else {
                0
            },
            modified,
            accessed,
            changed,
            uid: owner.uid,
            gid: owner.gid,
            link_target,
        }
    }

    fn append_file(&mut self, path: &Path, entry: &EntryMetadata) -> Result<u64> {
        let file = File::open(path).map_err(|e| Error::io(e, path, "open"))?;
        let mut reader = ProgressReader::new(file.take(entry.size));
        let appended = self.append(entry, &mut reader);
        let copied = reader.count();
        self.bytes_written += copied;

        match appended {
            Err(e) if reader.read_failed() => return Err(Error::io(e, path, "read")),
            Err(e) => return Err(Error::io(e, path, "write archive")),
            Ok(()) => {}
        }
        if copied < entry.size {
            let shrank = io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "file shrank from {} to {copied} bytes while archiving",
                    entry.size
                ),
            );
            return Err(Error::io(shrank, path, "read"));
        }
        Ok(copied)
    }

    fn append(&mut self, entry: &EntryMetadata, data: impl Read) -> io::Result<()> {
        if self.options.preserve_metadata {
            self.append_extended(entry, data)
        } else {
            self.append_legacy(entry, data)
        }
    }

    fn append_legacy(&mut self, entry: &EntryMetadata, data: impl Read) -> io::Result<()> {
        if entry.name.len() > NAME_FIELD_LEN {
            self.append_long_record(EntryType::GNULongName, &entry.name)?;
        }
        if let Some(link) = entry.link_target.as_deref()
            && link.len() > NAME_FIELD_LEN
        {
            self.append_long_record(EntryType::GNULongLink, link)?;
        }

        let mut header = Header::new_gnu();
        fill_header(&mut header, entry);
        self.builder.append(&header, data)
    }

    fn append_extended(&mut self, entry: &EntryMetadata, data: impl Read) -> io::Result<()> {
        let mut records: Vec<(&str, Vec<u8>)> = vec![
            ("mtime", format_pax_time(entry.modified).into_bytes()),
            ("atime", format_pax_time(entry.accessed_or_modified()).into_bytes()),
            (
                "ctime",
                format_pax_time(entry.changed.unwrap_or(entry.modified)).into_bytes(),
            ),
            ("uid", entry.uid.to_string().into_bytes()),
            ("gid", entry.gid.to_string().into_bytes()),
        ];
        if entry.name.len() > NAME_FIELD_LEN {
            records.push(("path", entry.name.as_bytes().to_vec()));
        }
        if let Some(link) = entry.link_target.as_deref()
            && link.len() > NAME_FIELD_LEN
        {
            records.push(("linkpath", link.as_bytes().to_vec()));
        }
        self.builder
            .append_pax_extensions(records.iter().map(|(key, value)| (*key, value.as_slice())))?;

        let mut header = Header::new_ustar();
        fill_header(&mut header, entry);
        self.builder.append(&header, data)
    }

    fn append_long_record(&mut self, kind: EntryType, value: &str) -> io::Result<()> {
        let mut header = Header::new_gnu();
        put_field(&mut header.as_old_mut().name, LONG_RECORD_NAME);
        header.set_mode(0o644);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(0);
        header.set_size(value.len() as u64 + 1);
        header.set_entry_type(kind);
        header.set_cksum();
        self.builder
            .append(&header, value.as_bytes().chain(&[0u8][..]))
    }
}

/// The builder's sink; refuses writes once the stream is abandoned
struct Sink<W> {
    inner: W,
    abandoned: bool,
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.abandoned {
            return Err(io::Error::other("archive abandoned"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn classify(path: &Path, metadata: &Metadata) -> Result<EntryKind> {
    let file_type = metadata.file_type();
    if file_type.is_dir() {
        Ok(EntryKind::Directory)
    } else if file_type.is_symlink() {
        Ok(EntryKind::Symlink)
    } else if file_type.is_file() {
        Ok(EntryKind::Regular)
    } else {
        platform::device_kind(file_type)
            .map(EntryKind::Device)
            .ok_or_else(|| {
                Error::unsupported_entry_type(path.display().to_string(), "socket")
            })
    }
}

fn read_link(root: &Path, path: &Path) -> Result<String> {
    let target = fs::read_link(path).map_err(|e| Error::io(e, path, "read link"))?;
    target
        .to_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::path_resolution(path, root, "link target is not valid UTF-8"))
}

/// Raw name bytes; the header was zero-filled on construction
fn put_field(field: &mut [u8], value: &[u8]) {
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value[..len]);
}

fn fill_header(header: &mut Header, entry: &EntryMetadata) {
    put_field(&mut header.as_old_mut().name, entry.name.as_bytes());
    if let Some(link) = entry.link_target.as_deref() {
        put_field(&mut header.as_old_mut().linkname, link.as_bytes());
    }
    header.set_entry_type(entry.kind.entry_type());
    header.set_mode(entry.mode);
    header.set_uid(entry.uid);
    header.set_gid(entry.gid);
    header.set_mtime(u64::try_from(entry.modified.unix_seconds()).unwrap_or(0));
    header.set_size(entry.size);
    header.set_cksum();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive_one(options: &ArchiveOptions, path: &Path) -> Vec<u8> {
        let mut writer = EntryWriter::new(Vec::new(), options, Naming::RootRelative);
        let metadata = fs::symlink_metadata(path).unwrap();
        writer.write_entry(path, &metadata).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_regular_file_payload_is_counted() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("data.bin");
        fs::write(&file, vec![7u8; 1300]).unwrap();
        let options = ArchiveOptions::new(temp.path());

        let mut writer = EntryWriter::new(Vec::new(), &options, Naming::RootRelative);
        let metadata = fs::symlink_metadata(&file).unwrap();
        assert_eq!(writer.write_entry(&file, &metadata).unwrap(), 1300);
        assert_eq!(writer.bytes_written(), 1300);
        assert_eq!(writer.entries(), 1);
    }

    #[test]
    fn test_abandoned_stream_has_no_end_marker() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("data.bin");
        fs::write(&file, b"partial").unwrap();
        let options = ArchiveOptions::new(temp.path());

        let mut out = Vec::new();
        let mut writer = EntryWriter::new(&mut out, &options, Naming::RootRelative);
        let metadata = fs::symlink_metadata(&file).unwrap();
        writer.write_entry(&file, &metadata).unwrap();
        writer.abandon();

        // One header block and one payload block, no zero blocks after them
        assert_eq!(out.len(), 1024);
        assert!(out[512..].starts_with(b"partial"));
    }

    #[test]
    fn test_long_name_uses_gnu_record_in_legacy_mode() {
        let temp = TempDir::new().unwrap();
        let long = "n".repeat(150);
        let file = temp.path().join(&long);
        fs::write(&file, b"x").unwrap();
        let options = ArchiveOptions::new(temp.path());

        let bytes = archive_one(&options, &file);
        assert_eq!(&bytes[..LONG_RECORD_NAME.len()], LONG_RECORD_NAME);

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str().unwrap(), long);
        assert!(entry.header().as_gnu().is_some());
        assert!(entry.pax_extensions().unwrap().is_none());
    }

    #[test]
    fn test_long_name_uses_pax_path_in_extended_mode() {
        let temp = TempDir::new().unwrap();
        let long = "p".repeat(120);
        let file = temp.path().join(&long);
        fs::write(&file, b"x").unwrap();
        let options = ArchiveOptions::new(temp.path()).with_preserve_metadata(true);

        let bytes = archive_one(&options, &file);
        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str().unwrap(), long);
        assert!(entry.header().as_ustar().is_some());

        let keys: Vec<String> = entry
            .pax_extensions()
            .unwrap()
            .unwrap()
            .map(|ext| ext.unwrap().key().unwrap().to_string())
            .collect();
        for key in ["mtime", "atime", "ctime", "uid", "gid", "path"] {
            assert!(keys.iter().any(|k| k == key), "missing {key} in {keys:?}");
        }
    }

    #[test]
    fn test_directory_names_end_with_slash() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cache");
        fs::create_dir(&dir).unwrap();
        let options = ArchiveOptions::new(temp.path());

        let bytes = archive_one(&options, &dir);
        let mut archive = tar::Archive::new(bytes.as_slice());
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(&entry.path_bytes()[..], b"cache/");
        assert_eq!(entry.header().entry_type(), EntryType::Directory);
    }

    #[cfg(unix)]
    #[test]
    fn test_skipped_symlink_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink("target", &link).unwrap();
        let options = ArchiveOptions::new(temp.path()).with_skip_symlinks(true);

        let mut writer = EntryWriter::new(Vec::new(), &options, Naming::RootRelative);
        let metadata = fs::symlink_metadata(&link).unwrap();
        assert_eq!(writer.write_entry(&link, &metadata).unwrap(), 0);
        assert_eq!(writer.entries(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_link_target_is_kept() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink("/usr/share/zoneinfo/UTC", &link).unwrap();
        let options = ArchiveOptions::new(temp.path());

        let bytes = archive_one(&options, &link);
        let mut archive = tar::Archive::new(bytes.as_slice());
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(
            entry.link_name().unwrap().unwrap().to_str().unwrap(),
            "/usr/share/zoneinfo/UTC"
        );
        assert_eq!(entry.size(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_is_unsupported() {
        let temp = TempDir::new().unwrap();
        let socket = temp.path().join("agent.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();
        let options = ArchiveOptions::new(temp.path());

        let mut writer = EntryWriter::new(Vec::new(), &options, Naming::RootRelative);
        let metadata = fs::symlink_metadata(&socket).unwrap();
        let err = writer.write_entry(&socket, &metadata).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEntryType { .. }));
    }
}
