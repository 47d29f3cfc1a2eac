//! `cachemover list`

use super::Context;
use crate::errors::CliError;
use cachemover_storage::FileEntry;
use std::fmt;

/// Stored objects, sorted by key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing(pub Vec<FileEntry>);

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.0.iter().map(|e| e.path.len()).max().unwrap_or(0);
        let mut first = true;
        for entry in &self.0 {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(
                f,
                "{:<width$}  {:>12}  {}",
                entry.path,
                entry.size,
                entry.last_modified.format("%Y-%m-%dT%H:%M:%SZ"),
            )?;
        }
        Ok(())
    }
}

/// List objects stored under `prefix`
pub async fn execute(ctx: &Context, prefix: &str) -> Result<Listing, CliError> {
    let entries = ctx.backend.list(prefix, &ctx.cancel).await?;
    tracing::debug!(prefix, count = entries.len(), "Listed stored objects");
    Ok(Listing(entries))
}
