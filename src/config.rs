//! Configuration types for cardslurp
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::content::compare::{DEFAULT_BUFFER_SIZE, DEFAULT_VERIFY_PASSES};
use crate::error::ConfigError;
use crate::pool::PoolSettings;
use clap::Parser;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default worker count; card readers are I/O bound
pub const DEFAULT_WORKERS: usize = 15;

/// Default retries after a verification mismatch
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Verification pass limits
const MAX_VERIFY_PASSES: u32 = 64;

/// Transfer buffer limits
const MIN_BUFFER_SIZE: usize = 512;
const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Sidecar copy defaults
pub const DEFAULT_SIDECAR_EXTENSION: &str = "xmp";
pub const DEFAULT_SIDECAR_VERIFY_PASSES: u32 = 3;
pub const DEFAULT_SIDECAR_BUFFER_SIZE: usize = 16 * 1024;

/// Offload camera cards into one directory with verification and dedup
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cardslurp",
    version,
    about = "Offload camera cards into one directory with verification and dedup",
    long_about = "Copies every file from one or more mounted cards into a single target directory.\n\n\
                  Cards are read in parallel and files are interleaved by modification time.\n\
                  Every copy is verified byte for byte. Files already present with identical\n\
                  content are skipped; name collisions with different content get a unique suffix.",
    after_help = "EXAMPLES:\n    \
        cardslurp -t /photos/2024-06-01 -m /media/card1,/media/card2\n    \
        cardslurp -t /photos/shoot -m /media/card1 -m /media/card2 -w 8 --verify-passes 3\n    \
        cardslurp -t /photos/shoot -m /media/card1 --max-retries 10 -v"
)]
pub struct CliArgs {
    /// Target directory for the copied files
    #[arg(short = 't', long, value_name = "DIR")]
    pub target_dir: PathBuf,

    /// Mounted cards to offload (comma-delimited, can be repeated)
    #[arg(
        short = 'm',
        long,
        value_name = "DIR",
        value_delimiter = ',',
        required = true,
        action = clap::ArgAction::Append
    )]
    pub mount_list: Vec<PathBuf>,

    /// Number of copy worker threads
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Retry attempts per file after a verification mismatch
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, value_name = "NUM")]
    pub max_retries: u32,

    /// Number of full verification passes per comparison
    #[arg(long, default_value_t = DEFAULT_VERIFY_PASSES, value_name = "NUM")]
    pub verify_passes: u32,

    /// Transfer buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE, value_name = "BYTES")]
    pub transfer_buffer: usize,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (per-file debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct SlurpConfig {
    /// Target directory
    pub target_dir: PathBuf,

    /// Source roots, in the order given
    pub source_roots: Vec<PathBuf>,

    /// Number of worker threads
    pub worker_count: usize,

    /// Retries per item after a verification mismatch
    pub max_retries: u32,

    /// Verification passes per comparison
    pub verify_passes: u32,

    /// Transfer buffer size in bytes
    pub buffer_size: usize,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl SlurpConfig {
    /// Create a config with default tuning
    pub fn new(target_dir: impl Into<PathBuf>, source_roots: Vec<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            source_roots,
            worker_count: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            verify_passes: DEFAULT_VERIFY_PASSES,
            buffer_size: DEFAULT_BUFFER_SIZE,
            show_progress: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let config = Self {
            target_dir: args.target_dir,
            source_roots: args.mount_list,
            worker_count: args.workers,
            max_retries: args.max_retries,
            verify_passes: args.verify_passes,
            buffer_size: args.transfer_buffer,
            show_progress: !args.quiet,
            verbose: args.verbose,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check limits and path sanity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_roots.is_empty() {
            return Err(ConfigError::NoSourceRoots);
        }

        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }

        validate_transfer(self.verify_passes, self.buffer_size)?;

        let target = normalize(&self.target_dir);
        let mut seen = HashSet::new();
        for root in &self.source_roots {
            let norm = normalize(root);
            if norm == target {
                return Err(ConfigError::SourceIsTarget { path: root.clone() });
            }
            if !seen.insert(norm) {
                return Err(ConfigError::DuplicateSourceRoot { path: root.clone() });
            }
        }

        Ok(())
    }

    /// Pool sizing and retry policy
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            workers: self.worker_count,
            max_retries: self.max_retries,
        }
    }
}

/// Verify pass and buffer limits shared by both tools
fn validate_transfer(verify_passes: u32, buffer_size: usize) -> Result<(), ConfigError> {
    if verify_passes == 0 || verify_passes > MAX_VERIFY_PASSES {
        return Err(ConfigError::InvalidVerifyPasses {
            passes: verify_passes,
            max: MAX_VERIFY_PASSES,
        });
    }

    if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&buffer_size) {
        return Err(ConfigError::InvalidBufferSize {
            size: buffer_size,
            min: MIN_BUFFER_SIZE,
            max: MAX_BUFFER_SIZE,
        });
    }

    Ok(())
}

/// Replace a shoot's sidecar files with verified copies from another copy
/// of the same shoot
#[derive(Parser, Debug, Clone)]
#[command(
    name = "xmpsafecopy",
    version,
    about = "Replace a shoot's sidecar files with verified copies from another copy of the same shoot",
    long_about = "Moves the target's existing sidecar files into a sideCartBackup-<millis> directory,\n\
                  then copies every sidecar from the source and verifies each copy.\n\n\
                  Source and target must have the same final directory name.",
    after_help = "EXAMPLES:\n    \
        xmpsafecopy -s /laptop/2024-06-01 -t /nas/2024-06-01 --dry-run\n    \
        xmpsafecopy -s /laptop/2024-06-01 -t /nas/2024-06-01 -e dop"
)]
pub struct SidecarArgs {
    /// Directory holding the edited sidecar files
    #[arg(short = 's', long, value_name = "DIR")]
    pub source: PathBuf,

    /// Directory whose sidecar files are replaced
    #[arg(short = 't', long, value_name = "DIR")]
    pub target: PathBuf,

    /// Sidecar file extension, without the period
    #[arg(short = 'e', long, default_value = DEFAULT_SIDECAR_EXTENSION, value_name = "EXT")]
    pub extension: String,

    /// Number of full verification passes per copy
    #[arg(long, default_value_t = DEFAULT_SIDECAR_VERIFY_PASSES, value_name = "NUM")]
    pub verify_passes: u32,

    /// Transfer buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_SIDECAR_BUFFER_SIZE, value_name = "BYTES")]
    pub transfer_buffer: usize,

    /// Report what would be backed up and copied without touching anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated sidecar copy configuration
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,

    /// Extension without the period, matched case-sensitively
    pub extension: String,

    pub verify_passes: u32,
    pub buffer_size: usize,
    pub dry_run: bool,
    pub verbose: bool,
}

impl SidecarConfig {
    /// Create a config with default tuning
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            extension: DEFAULT_SIDECAR_EXTENSION.to_string(),
            verify_passes: DEFAULT_SIDECAR_VERIFY_PASSES,
            buffer_size: DEFAULT_SIDECAR_BUFFER_SIZE,
            dry_run: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: SidecarArgs) -> Result<Self, ConfigError> {
        let config = Self {
            source_dir: args.source,
            target_dir: args.target,
            extension: args.extension,
            verify_passes: args.verify_passes,
            buffer_size: args.transfer_buffer,
            dry_run: args.dry_run,
            verbose: args.verbose,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check limits and the extension
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(ConfigError::InvalidExtension {
                extension: ext.clone(),
            });
        }
        validate_transfer(self.verify_passes, self.buffer_size)
    }
}

/// Resolve a path for equality checks, falling back to the path as given
fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
