//! Command line definition

use crate::compression::Compression;
use crate::config::Overrides;
use crate::tracing::{LogLevel, TracingFormat};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level command line
#[derive(Parser, Debug)]
#[command(name = "cachemover")]
#[command(about = "Rebuild and restore build caches as tar archives")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The command to run
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_CONFIG",
        value_name = "FILE",
        help = "Configuration file (default: ./cachemover.toml if present)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_STORAGE",
        value_name = "DIR",
        help = "Directory archives are stored in"
    )]
    pub storage: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_ROOT",
        value_name = "DIR",
        help = "Directory archive names are relative to and restores land in"
    )]
    pub root: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_FORMAT",
        value_enum,
        help = "Archive encoding"
    )]
    pub format: Option<Compression>,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_COMPRESSION_LEVEL",
        value_name = "N",
        allow_negative_numbers = true,
        help = "Compression level for gzip (0-9) or zstd (1-22)"
    )]
    pub compression_level: Option<i32>,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_SKIP_SYMLINKS",
        help = "Leave symbolic links out of archives"
    )]
    pub skip_symlinks: bool,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_PRESERVE_METADATA",
        help = "Archive and restore permissions, ownership and timestamps"
    )]
    pub preserve_metadata: bool,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_TIMEOUT",
        value_name = "SECS",
        help = "Cancel the command after this many seconds"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_LOG_LEVEL",
        default_value = "warn",
        value_enum,
        help = "Set logging level"
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        env = "CACHEMOVER_LOG_FORMAT",
        default_value = "pretty",
        value_enum,
        help = "Log output format"
    )]
    pub log_format: TracingFormat,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Archive mount paths and store them under a key")]
    Rebuild {
        #[arg(long, env = "CACHEMOVER_KEY", help = "Cache key")]
        key: String,
        #[arg(
            long = "override",
            value_name = "BOOL",
            value_parser = BoolishValueParser::new(),
            help = "Replace an existing object under the key (default: true)"
        )]
        override_existing: Option<bool>,
        #[arg(required = true, value_name = "MOUNT", help = "Paths to archive")]
        mounts: Vec<PathBuf>,
    },
    #[command(about = "Fetch the object stored under a key and extract it")]
    Restore {
        #[arg(long, env = "CACHEMOVER_KEY", help = "Cache key")]
        key: String,
    },
    #[command(about = "List stored objects")]
    List {
        #[arg(value_name = "PREFIX", help = "Only list keys under this prefix")]
        prefix: Option<String>,
    },
}

impl Cli {
    /// Configuration values given on the command line or in the environment
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        let override_existing = match &self.command {
            Commands::Rebuild {
                override_existing, ..
            } => *override_existing,
            Commands::Restore { .. } | Commands::List { .. } => None,
        };
        Overrides {
            root: self.root.clone(),
            storage: self.storage.clone(),
            format: self.format,
            compression_level: self.compression_level,
            skip_symlinks: self.skip_symlinks,
            preserve_metadata: self.preserve_metadata,
            timeout_secs: self.timeout,
            override_existing,
        }
    }
}

/// Parse the process arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["cachemover", "list"]).unwrap();

        assert_eq!(cli.log_level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Pretty);
        assert!(!cli.preserve_metadata);
        assert!(cli.format.is_none());
        assert_eq!(cli.command, Commands::List { prefix: None });
    }

    #[test]
    fn test_rebuild_parsing() {
        let cli = Cli::try_parse_from([
            "cachemover",
            "rebuild",
            "--key",
            "deps",
            "--override",
            "false",
            "target",
            "node_modules",
        ])
        .unwrap();

        match &cli.command {
            Commands::Rebuild {
                key,
                override_existing,
                mounts,
            } => {
                assert_eq!(key, "deps");
                assert_eq!(*override_existing, Some(false));
                assert_eq!(mounts, &[PathBuf::from("target"), PathBuf::from("node_modules")]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cli.overrides().override_existing, Some(false));
    }

    #[test]
    fn test_rebuild_requires_mounts() {
        assert!(Cli::try_parse_from(["cachemover", "rebuild", "--key", "k"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cachemover",
            "restore",
            "--key",
            "k",
            "--format",
            "zstd",
            "--compression-level",
            "19",
            "--preserve-metadata",
            "--storage",
            "/cache",
            "--timeout",
            "60",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.format, Some(Compression::Zstd));
        assert_eq!(overrides.compression_level, Some(19));
        assert!(overrides.preserve_metadata);
        assert_eq!(overrides.storage.as_deref(), Some(Path::new("/cache")));
        assert_eq!(overrides.timeout_secs, Some(60));
        assert_eq!(overrides.override_existing, None);
    }

    #[test]
    fn test_log_flags() {
        let cli = Cli::try_parse_from([
            "cachemover",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "list",
            "deps",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(cli.log_format, TracingFormat::Json);
        assert_eq!(
            cli.command,
            Commands::List {
                prefix: Some("deps".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["cachemover", "--format", "rar", "list"]).is_err());
    }
}
