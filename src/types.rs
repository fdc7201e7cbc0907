//! Work item types and data structures
//!
//! A `WorkItem` is created by the walker for every regular file found under
//! a source root and is owned by exactly one worker at a time until it
//! reaches a terminal state.

use crate::error::ItemError;
use std::ffi::OsString;
use std::fmt;
use std::fs::FileType;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Type of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// Named pipe (FIFO)
    Fifo,
    /// Unix socket
    Socket,
    /// Unknown type
    Unknown,
}

impl EntryType {
    /// Classify a `FileType` obtained without following symlinks
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_file() {
            return EntryType::File;
        }
        if file_type.is_dir() {
            return EntryType::Directory;
        }
        if file_type.is_symlink() {
            return EntryType::Symlink;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;

            if file_type.is_block_device() {
                return EntryType::BlockDevice;
            }
            if file_type.is_char_device() {
                return EntryType::CharDevice;
            }
            if file_type.is_fifo() {
                return EntryType::Fifo;
            }
            if file_type.is_socket() {
                return EntryType::Socket;
            }
        }

        EntryType::Unknown
    }

    /// Check if this is a regular file
    pub fn is_file(&self) -> bool {
        *self == EntryType::File
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryType::Directory
    }

    fn as_str(&self) -> &'static str {
        match self {
            EntryType::File => "regular file",
            EntryType::Directory => "directory",
            EntryType::Symlink => "symlink",
            EntryType::BlockDevice => "block device",
            EntryType::CharDevice => "character device",
            EntryType::Fifo => "named pipe",
            EntryType::Socket => "socket",
            EntryType::Unknown => "unknown entry",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a work item is in its lifecycle
#[derive(Debug, Default)]
pub enum ItemState {
    /// Discovered or requeued, not yet terminal
    #[default]
    Pending,
    /// Identical content already present in the target
    Skipped,
    /// Copied and verified
    Copied,
    /// Terminal major error
    Failed(ItemError),
}

/// One file awaiting transfer
#[derive(Debug)]
pub struct WorkItem {
    /// Source root this file was discovered under
    pub root: PathBuf,

    /// Absolute parent directory
    pub parent_dir: PathBuf,

    /// Leaf file name
    pub file_name: OsString,

    /// Permission bits (0 where the platform has none)
    pub mode: u32,

    /// Size in bytes at discovery
    pub size: u64,

    /// Modification time at discovery
    pub mtime: SystemTime,

    retries_used: u32,
    minor_errors: Vec<String>,
    target: Option<PathBuf>,
    state: ItemState,
}

impl WorkItem {
    /// Create a pending item for a discovered regular file
    pub fn new(
        root: impl Into<PathBuf>,
        parent_dir: impl Into<PathBuf>,
        file_name: impl Into<OsString>,
        mode: u32,
        size: u64,
        mtime: SystemTime,
    ) -> Self {
        Self {
            root: root.into(),
            parent_dir: parent_dir.into(),
            file_name: file_name.into(),
            mode,
            size,
            mtime,
            retries_used: 0,
            minor_errors: Vec::new(),
            target: None,
            state: ItemState::Pending,
        }
    }

    /// Full path of the source file
    pub fn source_path(&self) -> PathBuf {
        self.parent_dir.join(&self.file_name)
    }

    /// Target path assigned by a previous attempt, if any
    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    pub fn minor_errors(&self) -> &[String] {
        &self.minor_errors
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, ItemState::Pending)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.state, ItemState::Skipped)
    }

    pub fn is_copied(&self) -> bool {
        matches!(self.state, ItemState::Copied)
    }

    pub fn major_error(&self) -> Option<&ItemError> {
        match &self.state {
            ItemState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Consume the item, returning its major error if it failed
    pub fn into_major_error(self) -> Option<ItemError> {
        match self.state {
            ItemState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Target already holds identical content
    pub fn mark_skipped(&mut self, target: PathBuf) {
        self.target = Some(target);
        self.state = ItemState::Skipped;
    }

    /// Copy verified
    pub fn mark_copied(&mut self, target: PathBuf) {
        self.target = Some(target);
        self.state = ItemState::Copied;
    }

    /// Terminal failure; never retried
    pub fn fail(&mut self, err: ItemError) {
        self.state = ItemState::Failed(err);
    }

    /// Record a verification mismatch against `target`.
    ///
    /// Returns true when the item should be resubmitted. Once
    /// `max_retries` retries have been used the item fails with
    /// `OutOfRetries` and false is returned.
    pub fn record_verify_failure(&mut self, target: PathBuf, max_retries: u32) -> bool {
        self.minor_errors.push(format!(
            "verification failed for: {}",
            self.source_path().display()
        ));
        self.target = Some(target);

        if self.retries_used < max_retries {
            self.retries_used += 1;
            true
        } else {
            self.state = ItemState::Failed(ItemError::OutOfRetries {
                retries: self.retries_used,
            });
            false
        }
    }
}
