//! Command implementations
//!
//! Each command turns resolved [`Config`] into engine and backend calls.
//! Archive work runs on blocking threads and stages through an anonymous
//! temporary file; storage transfers run on the async runtime. All of it
//! observes the shared cancellation token.

pub mod list;
pub mod rebuild;
pub mod restore;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::errors::CliError;
use crate::shutdown;
use cachemover_archive::{Aborted, Archive, ArchiveOptions};
use cachemover_storage::{Backend, FilesystemBackend};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Everything a command needs
pub struct Context {
    /// Resolved configuration, with `root` made absolute
    pub config: Config,
    /// Where archives are stored
    pub backend: Box<dyn Backend>,
    /// Fired by signals or the deadline
    pub cancel: CancellationToken,
}

impl Context {
    /// Build a context over the filesystem backend named by `config`
    pub fn new(mut config: Config, cancel: CancellationToken) -> Result<Self, CliError> {
        config.root = std::path::absolute(&config.root)
            .map_err(|e| CliError::io("resolve root", &config.root, e))?;
        let backend = Box::new(FilesystemBackend::new(config.storage.clone()));
        Ok(Self {
            config,
            backend,
            cancel,
        })
    }

    /// An archive engine configured for this invocation
    #[must_use]
    pub fn archive(&self) -> Archive {
        Archive::new(
            ArchiveOptions::new(self.config.root.clone())
                .with_skip_symlinks(self.config.skip_symlinks)
                .with_preserve_metadata(self.config.preserve_metadata),
        )
    }

    /// Mount paths resolved against the root
    #[must_use]
    pub fn sources(&self, mounts: &[PathBuf]) -> Vec<PathBuf> {
        mounts.iter().map(|m| self.config.root.join(m)).collect()
    }
}

/// Convert an engine failure, reporting cancellation as such
pub(crate) fn archive_error(
    cancel: &CancellationToken,
    operation: &'static str,
    aborted: Aborted,
) -> CliError {
    if cancel.is_cancelled() {
        CliError::cancelled(operation)
    } else {
        CliError::Archive {
            operation,
            source: aborted,
        }
    }
}

/// What a finished command reports
#[derive(Debug)]
pub enum Outcome {
    /// `rebuild` finished
    Rebuilt(rebuild::Rebuilt),
    /// `restore` finished
    Restored(restore::Restored),
    /// `list` finished
    Listed(list::Listing),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rebuilt(outcome) => outcome.fmt(f),
            Self::Restored(outcome) => outcome.fmt(f),
            Self::Listed(outcome) => outcome.fmt(f),
        }
    }
}

/// Resolve configuration, arm cancellation and run the selected command
pub async fn run(cli: Cli) -> Result<Outcome, CliError> {
    let config = Config::load(cli.config.as_deref())?.with_overrides(cli.overrides());
    config.validate()?;
    tracing::debug!(?config, "Resolved configuration");

    let cancel = CancellationToken::new();
    shutdown::install_signal_handlers(cancel.clone());
    if let Some(timeout) = config.timeout() {
        shutdown::arm_deadline(cancel.clone(), timeout);
    }

    let ctx = Context::new(config, cancel)?;
    tracing::debug!(backend = ctx.backend.name(), "Using storage backend");

    match cli.command {
        Commands::Rebuild { key, mounts, .. } => {
            rebuild::execute(&ctx, &key, &mounts).await.map(Outcome::Rebuilt)
        }
        Commands::Restore { key } => restore::execute(&ctx, &key).await.map(Outcome::Restored),
        Commands::List { prefix } => list::execute(&ctx, prefix.as_deref().unwrap_or(""))
            .await
            .map(Outcome::Listed),
    }
}

/// A reader or writer that fails once `cancel` fires
///
/// Lets synchronous archive work stop between buffers when the command is
/// cancelled.
pub(crate) struct Interruptible<T> {
    inner: T,
    cancel: CancellationToken,
}

impl<T> Interruptible<T> {
    pub(crate) const fn new(inner: T, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    fn check(&self) -> io::Result<()> {
        if self.cancel.is_cancelled() {
            Err(io::Error::other("operation cancelled"))
        } else {
            Ok(())
        }
    }
}

impl<R: Read> Read for Interruptible<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.read(buf)
    }
}

impl<W: Write> Write for Interruptible<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
