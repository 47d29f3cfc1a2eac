//! `cachemover restore`

use super::{Context, Interruptible, archive_error};
use crate::compression::Compression;
use crate::errors::CliError;
use cachemover_archive::{Aborted, Archive, Error, Extracted};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Result of a restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restored {
    /// The archive was extracted into the root
    Extracted {
        /// Cache key
        key: String,
        /// Where the archive was extracted
        root: PathBuf,
        /// Entries restored
        entries: u64,
        /// Payload bytes written
        bytes_written: u64,
        /// Metadata that could not be applied
        metadata_warnings: usize,
    },
    /// Nothing is stored under the key
    Miss {
        /// Cache key
        key: String,
    },
}

impl fmt::Display for Restored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extracted {
                key,
                root,
                entries,
                bytes_written,
                metadata_warnings,
            } => {
                write!(
                    f,
                    "Restored '{key}' into {}: {entries} entries, {bytes_written} bytes",
                    root.display()
                )?;
                if *metadata_warnings > 0 {
                    write!(f, " ({metadata_warnings} metadata warnings)")?;
                }
                Ok(())
            }
            Self::Miss { key } => write!(f, "Cache miss for '{key}', nothing restored"),
        }
    }
}

/// Fetch the object stored under `key` and extract it into the root
pub async fn execute(ctx: &Context, key: &str) -> Result<Restored, CliError> {
    if !ctx.backend.exists(key, &ctx.cancel).await? {
        tracing::warn!(key, "No object stored under key, skipping restore");
        return Ok(Restored::Miss {
            key: key.to_string(),
        });
    }

    let temp_dir = std::env::temp_dir();
    let staging =
        tempfile::tempfile().map_err(|e| CliError::io("create staging file", &temp_dir, e))?;
    let mut download = tokio::fs::File::from_std(staging);
    ctx.backend.get(key, &mut download, &ctx.cancel).await?;
    let file = download.into_std().await;

    let archive = ctx.archive();
    let root = ctx.config.root.clone();
    let format = ctx.config.format;
    let cancel = ctx.cancel.clone();
    let extracted =
        tokio::task::spawn_blocking(move || read_archive(&archive, &root, file, format, &cancel))
            .await
            .map_err(|e| CliError::io("extract", &ctx.config.root, io::Error::other(e)))??;

    if !extracted.metadata_warnings.is_empty() {
        for warning in &extracted.metadata_warnings {
            tracing::debug!(warning = %warning, "Metadata not restored");
        }
        tracing::warn!(
            key,
            count = extracted.metadata_warnings.len(),
            "Some permissions, ownership or timestamps could not be restored"
        );
    }
    tracing::info!(
        key,
        entries = extracted.entries,
        bytes_written = extracted.bytes_written,
        "Restored cache"
    );

    Ok(Restored::Extracted {
        key: key.to_string(),
        root: ctx.config.root.clone(),
        entries: extracted.entries,
        bytes_written: extracted.bytes_written,
        metadata_warnings: extracted.metadata_warnings.len(),
    })
}

fn read_archive(
    archive: &Archive,
    root: &Path,
    mut file: File,
    format: Compression,
    cancel: &CancellationToken,
) -> Result<Extracted, CliError> {
    file.seek(SeekFrom::Start(0))
        .map_err(|e| CliError::io("rewind staging file", std::env::temp_dir(), e))?;

    let source = Interruptible::new(BufReader::new(file), cancel.clone());
    let mut decoder = format
        .decoder(source)
        .map_err(|e| CliError::io("start decompression", root, e))?;
    let extracted = archive
        .extract(root, &mut decoder)
        .map_err(|aborted| archive_error(cancel, "restore", aborted))?;

    // The tar reader stops at the end-of-archive blocks; reading on to EOF
    // checks the compressed stream's trailer
    if let Err(e) = io::copy(&mut decoder, &mut io::sink()) {
        let aborted = Aborted::new(extracted.bytes_written, Error::archive_not_readable(e));
        return Err(archive_error(cancel, "restore", aborted));
    }
    Ok(extracted)
}
