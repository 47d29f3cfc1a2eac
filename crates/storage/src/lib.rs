//! Storage backends for cachemover archives
//!
//! The archive engine produces and consumes byte streams; this crate moves
//! those streams to and from a store under string keys. All operations are
//! async and cancellable through a shared
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! ```no_run
//! use cachemover_storage::{Backend, FilesystemBackend};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> cachemover_storage::Result<()> {
//! let backend = FilesystemBackend::new("/var/cache/cachemover");
//! let cancel = CancellationToken::new();
//! let mut archive: &[u8] = b"...";
//! backend.put("deps/linux-x64", &mut archive, &cancel).await?;
//! assert!(backend.exists("deps/linux-x64", &cancel).await?);
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod filesystem;

pub use backend::{Backend, FileEntry, cancellable};
pub use error::{Result, StorageError};
pub use filesystem::FilesystemBackend;
