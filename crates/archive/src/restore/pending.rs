//! Deferred directory metadata
//!
//! Creating a child inside a directory updates the directory's modification
//! time, and a restrictive mode can prevent the child from being created at
//! all. Directory metadata is therefore recorded while extracting and applied
//! only once every entry is on disk, deepest directories first.

use super::metadata::{Attributes, MetadataApplier};
use crate::path::depth;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory metadata owned by a single extraction
#[derive(Debug, Default)]
pub struct PendingDirectories {
    records: BTreeMap<PathBuf, Attributes>,
}

impl PendingDirectories {
    /// An empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metadata for `path`; a later record for the same path replaces it
    pub fn record(&mut self, path: PathBuf, attributes: Attributes) {
        self.records.insert(path, attributes);
    }

    /// Number of recorded directories
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Paths in the order they will be applied
    ///
    /// Deeper directories (more normal components) come first. Equal depths
    /// are ordered by reverse path so the order is total.
    #[must_use]
    pub fn flush_order(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.records.keys().map(PathBuf::as_path).collect();
        paths.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| b.cmp(a)));
        paths
    }

    pub(crate) fn flush(self, applier: &mut MetadataApplier<'_>) {
        let order: Vec<PathBuf> = self.flush_order().into_iter().map(Path::to_path_buf).collect();
        tracing::debug!(directories = order.len(), "Applying deferred directory metadata");
        for path in order {
            if let Some(attributes) = self.records.get(&path) {
                applier.apply(&path, attributes);
            }
        }
    }
}
