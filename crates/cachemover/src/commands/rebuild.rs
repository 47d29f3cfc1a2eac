//! `cachemover rebuild`

use super::{Context, Interruptible, archive_error};
use crate::compression::Compression;
use crate::errors::CliError;
use cachemover_archive::{Archive, Created, Naming};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Result of a rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rebuilt {
    /// A new archive was stored
    Stored {
        /// Cache key
        key: String,
        /// Entries archived
        entries: u64,
        /// Payload bytes archived
        bytes_written: u64,
        /// Size of the stored object
        stored_bytes: u64,
    },
    /// The key already existed and overriding was disabled
    Skipped {
        /// Cache key
        key: String,
    },
}

impl fmt::Display for Rebuilt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored {
                key,
                entries,
                bytes_written,
                stored_bytes,
            } => write!(
                f,
                "Rebuilt '{key}': {entries} entries, {bytes_written} bytes archived, {stored_bytes} bytes stored"
            ),
            Self::Skipped { key } => {
                write!(f, "Skipped '{key}': already stored and override is off")
            }
        }
    }
}

/// Archive `mounts` and store the result under `key`
pub async fn execute(ctx: &Context, key: &str, mounts: &[PathBuf]) -> Result<Rebuilt, CliError> {
    if !ctx.config.override_existing && ctx.backend.exists(key, &ctx.cancel).await? {
        tracing::info!(key, "Object exists and override is off, skipping rebuild");
        return Ok(Rebuilt::Skipped {
            key: key.to_string(),
        });
    }

    let (file, created) = build_archive(ctx, mounts).await?;
    let stored_bytes = file
        .metadata()
        .map_err(|e| CliError::io("stat staging file", std::env::temp_dir(), e))?
        .len();

    let mut upload = tokio::fs::File::from_std(file);
    ctx.backend.put(key, &mut upload, &ctx.cancel).await?;

    tracing::info!(
        key,
        entries = created.entries,
        bytes_written = created.bytes_written,
        stored_bytes,
        format = %ctx.config.format,
        "Rebuilt cache"
    );
    Ok(Rebuilt::Stored {
        key: key.to_string(),
        entries: created.entries,
        bytes_written: created.bytes_written,
        stored_bytes,
    })
}

/// Write the encoded archive to an anonymous temporary file, rewound for reading
async fn build_archive(ctx: &Context, mounts: &[PathBuf]) -> Result<(File, Created), CliError> {
    let archive = ctx.archive();
    let sources = ctx.sources(mounts);
    let format = ctx.config.format;
    let level = ctx.config.compression_level;
    let cancel = ctx.cancel.clone();

    tokio::task::spawn_blocking(move || write_archive(&archive, &sources, format, level, &cancel))
        .await
        .map_err(|e| CliError::io("archive", &ctx.config.root, io::Error::other(e)))?
}

fn write_archive(
    archive: &Archive,
    sources: &[PathBuf],
    format: Compression,
    level: i32,
    cancel: &CancellationToken,
) -> Result<(File, Created), CliError> {
    let temp_dir = std::env::temp_dir();
    let mut file =
        tempfile::tempfile().map_err(|e| CliError::io("create staging file", &temp_dir, e))?;

    let sink = Interruptible::new(BufWriter::new(&file), cancel.clone());
    let mut encoder = format
        .encoder(sink, level)
        .map_err(|e| CliError::io("start compression", &temp_dir, e))?;
    let created = archive
        .create(sources, &mut encoder, Naming::RootRelative)
        .map_err(|aborted| archive_error(cancel, "rebuild", aborted))?;
    encoder
        .finish()
        .map_err(|e| CliError::io("finish compression", &temp_dir, e))?;

    file.seek(SeekFrom::Start(0))
        .map_err(|e| CliError::io("rewind staging file", &temp_dir, e))?;
    Ok((file, created))
}
