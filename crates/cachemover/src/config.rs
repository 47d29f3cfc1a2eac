//! Configuration for cachemover commands
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command line flags and `CACHEMOVER_*` environment variables.

use crate::compression::{Compression, DEFAULT_LEVEL};
use crate::errors::CliError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "cachemover.toml";

/// Resolved settings for one invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory archive names are relative to and archives are restored into
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Directory of the filesystem storage backend
    #[serde(default = "default_storage")]
    pub storage: PathBuf,

    /// Encoding of stored archives
    #[serde(default)]
    pub format: Compression,

    /// Level for gzip (0-9) or zstd (1-22)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// Leave symbolic links out of archives
    #[serde(default)]
    pub skip_symlinks: bool,

    /// Archive and restore permissions, ownership and timestamps
    #[serde(default)]
    pub preserve_metadata: bool,

    /// Cancel the command after this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Replace an existing object when rebuilding
    #[serde(default = "default_true")]
    pub override_existing: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_storage() -> PathBuf {
    PathBuf::from(".cachemover")
}

const fn default_compression_level() -> i32 {
    DEFAULT_LEVEL
}

const fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            storage: default_storage(),
            format: Compression::default(),
            compression_level: default_compression_level(),
            skip_symlinks: false,
            preserve_metadata: false,
            timeout_secs: None,
            override_existing: true,
        }
    }
}

/// Values given on the command line or through the environment
///
/// `None` (or `false` for switches) leaves the file or default value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--root`
    pub root: Option<PathBuf>,
    /// `--storage`
    pub storage: Option<PathBuf>,
    /// `--format`
    pub format: Option<Compression>,
    /// `--compression-level`
    pub compression_level: Option<i32>,
    /// `--skip-symlinks`
    pub skip_symlinks: bool,
    /// `--preserve-metadata`
    pub preserve_metadata: bool,
    /// `--timeout`
    pub timeout_secs: Option<u64>,
    /// `rebuild --override`
    pub override_existing: Option<bool>,
}

impl Config {
    /// Load settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(CliError::io("read configuration", path, e)),
        };

        let config = toml::from_str(&contents)
            .map_err(|e| CliError::config_parse(path, contents.clone(), &e))?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply command line values on top of this configuration
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(root) = overrides.root {
            self.root = root;
        }
        if let Some(storage) = overrides.storage {
            self.storage = storage;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(level) = overrides.compression_level {
            self.compression_level = level;
        }
        self.skip_symlinks |= overrides.skip_symlinks;
        self.preserve_metadata |= overrides.preserve_metadata;
        if overrides.timeout_secs.is_some() {
            self.timeout_secs = overrides.timeout_secs;
        }
        if let Some(override_existing) = overrides.override_existing {
            self.override_existing = override_existing;
        }
        self
    }

    /// Reject values no command can work with
    pub fn validate(&self) -> Result<(), CliError> {
        if let Some((min, max)) = self.format.level_range()
            && !(min..=max).contains(&self.compression_level)
        {
            return Err(CliError::config_with_help(
                format!(
                    "compression level {} is out of range for {}",
                    self.compression_level, self.format
                ),
                format!("Use a level from {min} to {max}"),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(CliError::config_with_help(
                "timeout must be at least one second",
                "Omit --timeout to run without a deadline",
            ));
        }
        Ok(())
    }

    /// The deadline after which commands are cancelled
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
