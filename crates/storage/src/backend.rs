//! Storage backend contract
//!
//! A backend moves whole archive objects between the local machine and
//! wherever caches live. Every operation takes a [`CancellationToken`] and
//! returns [`StorageError::Cancelled`] if the token fires before the
//! operation finishes.

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// An object listed by [`Backend::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Key of the object, `/`-separated
    pub path: String,
    /// Object size in bytes
    pub size: u64,
    /// When the object was last written
    pub last_modified: DateTime<Utc>,
}

/// Trait for archive storage backends
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stream the object stored under `key` into `writer`
    ///
    /// # Arguments
    /// * `key` - Object key
    /// * `writer` - Destination for the object bytes
    /// * `cancel` - Token that aborts the transfer
    ///
    /// # Returns
    /// `StorageError::NotFound` if nothing is stored under `key`
    async fn get(
        &self,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Store everything `reader` yields under `key`, replacing any previous object
    ///
    /// A cancelled or failed upload never leaves a partial object behind.
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Check whether an object is stored under `key`
    async fn exists(&self, key: &str, cancel: &CancellationToken) -> Result<bool>;

    /// List stored objects whose key starts with the directory `prefix`
    ///
    /// An empty prefix lists everything. Entries are sorted by path.
    async fn list(&self, prefix: &str, cancel: &CancellationToken) -> Result<Vec<FileEntry>>;

    /// Get the backend name for logging
    fn name(&self) -> &'static str;
}

/// Run `operation` unless `cancel` fires first
///
/// # Errors
/// Returns `StorageError::Cancelled` when the token wins the race, otherwise
/// whatever `operation` returns.
pub async fn cancellable<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    key: &str,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(StorageError::cancelled(operation, key));
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!(operation, key, "Storage operation cancelled");
            Err(StorageError::cancelled(operation, key))
        }
        result = future => result,
    }
}
