//! The archive engine facade

use crate::error::{self, Aborted, Error};
use crate::options::ArchiveOptions;
use crate::path::Naming;
use crate::reader::read_entries;
use crate::restore::{EntryRestorer, HostMetadata, MetadataWarning, MetadataWriter};
use crate::writer::EntryWriter;
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// Outcome of a successful [`Archive::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Created {
    /// Payload bytes written (file contents only, not headers)
    pub bytes_written: u64,
    /// Entries written
    pub entries: u64,
}

/// Outcome of a successful [`Archive::extract`]
#[derive(Debug)]
pub struct Extracted {
    /// Payload bytes written to disk
    pub bytes_written: u64,
    /// Entries restored
    pub entries: u64,
    /// Metadata that could not be applied
    pub metadata_warnings: Vec<MetadataWarning>,
}

/// Creates and extracts tar archives
///
/// Both operations are synchronous single passes. An extraction owns its
/// destination for the duration of the call; concurrent extractions into
/// overlapping trees must be serialized by the caller.
#[derive(Clone)]
pub struct Archive {
    options: ArchiveOptions,
    metadata: Arc<dyn MetadataWriter>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Archive {
    /// An engine applying metadata with the host's system calls
    #[must_use]
    pub fn new(options: ArchiveOptions) -> Self {
        Self::with_metadata_writer(options, HostMetadata)
    }

    /// An engine applying metadata through `writer`
    #[must_use]
    pub fn with_metadata_writer(
        options: ArchiveOptions,
        writer: impl MetadataWriter + 'static,
    ) -> Self {
        Self {
            options,
            metadata: Arc::new(writer),
        }
    }

    /// The options this engine was built with
    #[must_use]
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Write every node under each of `sources` into `sink`
    ///
    /// Sources are walked in order, without following symlinks and with
    /// directory entries sorted by file name. The tar stream is terminated and
    /// `sink` flushed before returning. An aborted stream is left without the
    /// end-of-archive marker.
    pub fn create<P, W>(
        &self,
        sources: &[P],
        sink: W,
        naming: Naming,
    ) -> Result<Created, Aborted>
    where
        P: AsRef<Path>,
        W: Write,
    {
        let mut writer = EntryWriter::new(sink, &self.options, naming);
        if let Err(source) = walk_sources(sources, &mut writer) {
            let bytes_written = writer.bytes_written();
            writer.abandon();
            return Err(Aborted::new(bytes_written, source));
        }

        let created = Created {
            bytes_written: writer.bytes_written(),
            entries: writer.entries(),
        };
        writer
            .finish()
            .map_err(|source| Aborted::new(created.bytes_written, source))?;

        tracing::info!(
            sources = sources.len(),
            entries = created.entries,
            bytes_written = created.bytes_written,
            preserve_metadata = self.options.preserve_metadata,
            "Created archive"
        );
        Ok(created)
    }

    /// Restore every entry of `source` under `dst`
    ///
    /// With metadata preservation on, directory metadata is applied after the
    /// last entry, deepest directories first.
    pub fn extract<R: Read>(&self, dst: impl AsRef<Path>, source: R) -> Result<Extracted, Aborted> {
        let dst = dst.as_ref();
        let mut restorer =
            EntryRestorer::new(dst, self.options.preserve_metadata, self.metadata.as_ref());

        let read = read_entries(source, |entry, payload| {
            restorer.restore(entry, payload).map(|_| ())
        });
        if let Err(source) = read {
            return Err(Aborted::new(restorer.bytes_written(), source));
        }

        let bytes_written = restorer.bytes_written();
        let entries = restorer.entries();
        let metadata_warnings = restorer.finish();

        tracing::info!(
            dst = %dst.display(),
            entries,
            bytes_written,
            metadata_warnings = metadata_warnings.len(),
            "Extracted archive"
        );
        Ok(Extracted {
            bytes_written,
            entries,
            metadata_warnings,
        })
    }
}

fn walk_sources<P: AsRef<Path>, W: Write>(
    sources: &[P],
    writer: &mut EntryWriter<'_, W>,
) -> error::Result<()> {
    for source in sources {
        let source = source.as_ref();
        fs::symlink_metadata(source).map_err(|e| Error::source_unreachable(source, e))?;
        tracing::debug!(source = %source.display(), "Archiving source");

        for entry in WalkDir::new(source)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source).to_path_buf();
                Error::io(e.into(), path, "walk")
            })?;
            let metadata = entry
                .metadata()
                .map_err(|e| Error::io(e.into(), entry.path(), "stat"))?;
            writer.write_entry(entry.path(), &metadata)?;
        }
    }
    Ok(())
}
