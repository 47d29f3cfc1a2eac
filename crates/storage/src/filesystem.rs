//! Filesystem storage backend
//!
//! Objects are plain files below a root directory; a key such as
//! `deps/linux-x64` lives at `<root>/deps/linux-x64`. Uploads are staged in
//! a hidden sibling file and renamed into place once complete.

use crate::backend::{Backend, FileEntry, cancellable};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// File name prefix of in-flight uploads
const STAGING_PREFIX: &str = ".cachemover-upload-";

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores objects as files under a root directory
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a backend rooted at `root`
    ///
    /// The directory is created on the first upload.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory objects are stored under
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path below the root
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let segments = key_segments(key)?;
        if segments.is_empty() {
            return Err(StorageError::invalid_key(key, "key is empty"));
        }
        Ok(segments
            .into_iter()
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

/// Split a key on `/`, dropping empty and `.` segments
fn key_segments(key: &str) -> Result<Vec<&str>> {
    if key.starts_with('/') || key.starts_with('\\') || Path::new(key).has_root() {
        return Err(StorageError::invalid_key(key, "absolute keys are not allowed"));
    }

    let mut segments = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(StorageError::invalid_key(key, "'..' segments are not allowed")),
            s if s.contains('\\') || s.contains(':') => {
                return Err(StorageError::invalid_key(
                    key,
                    "segments must not contain '\\' or ':'",
                ));
            }
            s if s.starts_with(STAGING_PREFIX) => {
                return Err(StorageError::invalid_key(
                    key,
                    "segment name is reserved for uploads",
                ));
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

fn staging_path(path: &Path) -> PathBuf {
    let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
    path.with_file_name(format!("{STAGING_PREFIX}{}-{n}-{name}", std::process::id()))
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

#[async_trait]
impl Backend for FilesystemBackend {
    async fn get(
        &self,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = self.object_path(key)?;

        cancellable(cancel, "get", key, async {
            match fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => return Err(StorageError::not_found(key)),
                Err(e) if is_missing(&e) => return Err(StorageError::not_found(key)),
                Err(e) => return Err(StorageError::io_with_context("stat", &path, e)),
            }

            let mut file = fs::File::open(&path)
                .await
                .map_err(|e| StorageError::io_with_context("open", &path, e))?;
            let bytes = tokio::io::copy(&mut file, writer)
                .await
                .map_err(|e| StorageError::io_with_context("download", &path, e))?;
            writer
                .flush()
                .await
                .map_err(|e| StorageError::io_with_context("download", &path, e))?;

            tracing::debug!(key, bytes, path = %path.display(), "Object downloaded");
            Ok(())
        })
        .await
    }

    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = self.object_path(key)?;
        let staging = staging_path(&path);

        let result = cancellable(cancel, "put", key, async {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::io_with_context("create directory", parent, e))?;
            }

            let mut file = fs::File::create(&staging)
                .await
                .map_err(|e| StorageError::io_with_context("create", &staging, e))?;
            let bytes = tokio::io::copy(reader, &mut file)
                .await
                .map_err(|e| StorageError::io_with_context("upload", &staging, e))?;
            file.sync_all()
                .await
                .map_err(|e| StorageError::io_with_context("sync", &staging, e))?;
            drop(file);

            fs::rename(&staging, &path)
                .await
                .map_err(|e| StorageError::io_with_context("rename", &path, e))?;
            Ok(bytes)
        })
        .await;

        match result {
            Ok(bytes) => {
                tracing::debug!(key, bytes, path = %path.display(), "Object stored");
                Ok(())
            }
            Err(err) => {
                if let Err(e) = fs::remove_file(&staging).await
                    && !is_missing(&e)
                {
                    tracing::warn!(
                        path = %staging.display(),
                        error = %e,
                        "Failed to remove staged upload"
                    );
                }
                Err(err)
            }
        }
    }

    async fn exists(&self, key: &str, cancel: &CancellationToken) -> Result<bool> {
        let path = self.object_path(key)?;
        cancellable(cancel, "exists", key, async {
            match fs::metadata(&path).await {
                Ok(meta) => Ok(meta.is_file()),
                Err(e) if is_missing(&e) => Ok(false),
                Err(e) => Err(StorageError::io_with_context("stat", &path, e)),
            }
        })
        .await
    }

    async fn list(&self, prefix: &str, cancel: &CancellationToken) -> Result<Vec<FileEntry>> {
        let base = key_segments(prefix)?
            .into_iter()
            .fold(self.root.clone(), |path, segment| path.join(segment));
        let root = self.root.clone();

        cancellable(cancel, "list", prefix, async move {
            let walk_root = root.clone();
            tokio::task::spawn_blocking(move || walk_objects(&walk_root, &base))
                .await
                .map_err(|e| StorageError::io_with_context("list", root, io::Error::other(e)))?
        })
        .await
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

/// Collect every stored object below `base`, sorted by key
fn walk_objects(root: &Path, base: &Path) -> Result<Vec<FileEntry>> {
    match std::fs::symlink_metadata(base) {
        Ok(_) => {}
        Err(e) if is_missing(&e) => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io_with_context("stat", base, e)),
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(base).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(base).to_path_buf();
            StorageError::io_with_context("walk", path, e.into())
        })?;
        if !entry.file_type().is_file()
            || entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX)
        {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| StorageError::io_with_context("stat", entry.path(), e.into()))?;
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::io_with_context("stat", entry.path(), e))?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        entries.push(FileEntry {
            path,
            size: metadata.len(),
            last_modified: DateTime::<Utc>::from(modified),
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
