//! Error types for cardslurp
//!
//! This module defines the error hierarchy for an offload run:
//! - Discovery errors (unreadable or unsupported entries under a source root)
//! - Naming errors (target directory seeding and collision resolution)
//! - Configuration and CLI errors
//! - Worker pool plumbing errors
//! - Per-item transfer failures
//! - Sidecar copy errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Every error names the path it concerns
//! - Preserve error chains for debugging

use crate::coordinator::SlurpSummary;
use crate::types::EntryType;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for an offload run
#[derive(Error, Debug)]
pub enum SlurpError {
    /// A source root could not be enumerated
    #[error("Discovery error: {0}")]
    Walk(#[from] WalkError),

    /// The target directory could not be seeded or a name could not be issued
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// A file reached a terminal failure; the run is aborted.
    ///
    /// `summary` holds everything counted up to the abort.
    #[error("Major error copying '{path}': {source}")]
    Item {
        path: PathBuf,
        #[source]
        source: ItemError,
        summary: Box<SlurpSummary>,
    },
}

impl SlurpError {
    /// Counts gathered before the run was aborted, if copying had started
    pub fn partial_summary(&self) -> Option<&SlurpSummary> {
        match self {
            SlurpError::Item { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// Source root enumeration errors
///
/// Any of these aborts the whole run before copying starts.
#[derive(Error, Debug)]
pub enum WalkError {
    /// The root itself is missing or not a directory
    #[error("Source root '{root}' is not a readable directory: {reason}")]
    InvalidRoot { root: PathBuf, reason: String },

    /// A directory under the root could not be listed
    #[error("Failed to read directory '{path}' under source root '{root}': {source}")]
    ReadDir {
        root: PathBuf,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata for an entry could not be read
    #[error("Failed to stat '{path}' under source root '{root}': {source}")]
    Stat {
        root: PathBuf,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Symlink, pipe, device or socket found under the root
    #[error("Unsupported {kind} '{path}' under source root '{root}'")]
    UnsupportedEntry {
        root: PathBuf,
        path: PathBuf,
        kind: EntryType,
    },
}

impl WalkError {
    /// The source root this error belongs to
    pub fn root(&self) -> &PathBuf {
        match self {
            WalkError::InvalidRoot { root, .. } => root,
            WalkError::ReadDir { root, .. } => root,
            WalkError::Stat { root, .. } => root,
            WalkError::UnsupportedEntry { root, .. } => root,
        }
    }
}

/// Target naming errors
#[derive(Error, Debug)]
pub enum NamingError {
    /// Target directory is missing or unreadable
    #[error("Target directory '{path}' is not usable: {reason}")]
    InvalidTarget { path: PathBuf, reason: String },

    /// Target directory contains something other than regular files
    #[error("Target directory should only contain regular files, found {kind} '{path}'")]
    IrregularTargetEntry { path: PathBuf, kind: EntryType },

    /// Leaf name has more than one extension segment
    #[error("Unexpected number of periods in file name '{name}'")]
    MalformedName { name: String },

    /// Leaf name is not valid UTF-8, so it cannot be suffixed
    #[error("File name of '{path}' is not valid UTF-8")]
    NonUtf8Name { path: PathBuf },

    /// Source path has no leaf name
    #[error("Source path '{path}' has no file name")]
    MissingFileName { path: PathBuf },

    /// Content comparison against an existing target failed with I/O
    #[error("Failed comparing '{source_path}' with existing '{target}': {source}")]
    Compare {
        source_path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No unclaimed suffixed name found within the attempt bound
    #[error("Failed to find a unique target name for '{name}' after {attempts} attempts")]
    Exhausted { name: String, attempts: u32 },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No source roots were given
    #[error("At least one source root is required")]
    NoSourceRoots,

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid verification pass count
    #[error("Invalid verify pass count {passes}: must be between 1 and {max}")]
    InvalidVerifyPasses { passes: u32, max: u32 },

    /// Invalid transfer buffer size
    #[error("Invalid transfer buffer size {size}: must be between {min} and {max}")]
    InvalidBufferSize { size: usize, min: usize, max: usize },

    /// Same source root given twice
    #[error("Source root '{path}' was given more than once")]
    DuplicateSourceRoot { path: PathBuf },

    /// Source root and target directory are the same path
    #[error("Source root '{path}' is the target directory")]
    SourceIsTarget { path: PathBuf },

    /// Sidecar extension is empty or not a single name component
    #[error("Invalid sidecar extension '{extension}'")]
    InvalidExtension { extension: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Work queue send failed
    #[error("Failed to send work item: queue closed")]
    QueueSendFailed,

    /// Result channel closed
    #[error("Result channel closed unexpectedly")]
    ResultChannelClosed,

    /// Worker initialization failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// All workers died
    #[error("All workers have terminated unexpectedly")]
    AllWorkersDead,
}

/// Terminal failure of a single work item
#[derive(Error, Debug)]
pub enum ItemError {
    /// The naming oracle could not issue a target
    #[error("error getting target name: {0}")]
    Naming(#[from] NamingError),

    /// Copy failed with I/O
    #[error("error copying to '{target}': {source}")]
    Copy {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Post-copy verification failed with I/O (not a mismatch)
    #[error("error verifying '{target}': {source}")]
    Verify {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source permissions could not be applied to the verified copy
    #[error("error setting permissions on '{target}': {source}")]
    Permissions {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every verification attempt mismatched
    #[error("out of retries after {retries} retries")]
    OutOfRetries { retries: u32 },

    /// The item could not be handed back to the queue
    #[error("failed to requeue for retry: {0}")]
    Requeue(#[from] WorkerError),
}

/// Sidecar copy errors
#[derive(Error, Debug)]
pub enum SidecarError {
    /// Source and target directories have different leaf names
    #[error("Source '{source_dir}' and target '{target_dir}' appear to be different photo shoots")]
    DifferentShoot {
        source_dir: PathBuf,
        target_dir: PathBuf,
    },

    /// Source and target resolve to the same directory
    #[error("Source and target must not be the same directory: '{path}'")]
    SameDirectory { path: PathBuf },

    /// The backup directory name is already taken
    #[error("Backup directory '{path}' already exists")]
    BackupExists { path: PathBuf },

    /// Filesystem operation failed
    #[error("{action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The copy did not verify
    #[error("Verification failed for '{path}'")]
    VerifyMismatch { path: PathBuf },
}

/// Result type alias for SlurpError
pub type Result<T> = std::result::Result<T, SlurpError>;

/// Result type alias for WalkError
pub type WalkResult<T> = std::result::Result<T, WalkError>;

/// Result type alias for NamingError
pub type NamingResult<T> = std::result::Result<T, NamingError>;

/// Result type alias for SidecarError
pub type SidecarResult<T> = std::result::Result<T, SidecarError>;
