//! Engine configuration

use std::path::{Path, PathBuf};

/// Configuration fixed when an [`Archive`](crate::Archive) is constructed
///
/// `preserve_metadata` selects the header format as well as whether metadata
/// is restored: extended (PAX) headers when set, legacy GNU headers otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Directory archive names are computed relative to
    pub root: PathBuf,
    /// Omit symbolic links from created archives
    pub skip_symlinks: bool,
    /// Carry and restore permissions, ownership and timestamps
    pub preserve_metadata: bool,
}

impl ArchiveOptions {
    /// Options rooted at `root` with symlinks kept and metadata not preserved
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Set whether symbolic links are omitted
    #[must_use]
    pub fn with_skip_symlinks(mut self, skip: bool) -> Self {
        self.skip_symlinks = skip;
        self
    }

    /// Set whether metadata is preserved
    #[must_use]
    pub fn with_preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    /// The archive root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
