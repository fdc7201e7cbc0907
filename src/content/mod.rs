//! File content capability for copy and verification
//!
//! This module provides:
//! - The `FileOps` trait the naming oracle and workers consume
//! - `FileComparator`, a sequential copier and multi-pass comparator
//! - `apply_mode`, which carries source permission bits to a finished copy

pub mod compare;

pub use compare::FileComparator;

use std::fs;
use std::io;
use std::path::Path;

/// How a copy may open its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The destination must not exist yet; `AlreadyExists` otherwise
    CreateNew,

    /// The destination is the caller's own earlier copy and is rewritten
    Replace,
}

/// Byte-level copy and comparison of whole files
pub trait FileOps: Send + Sync {
    /// Copy `src` to `dst`, returning the number of bytes written.
    ///
    /// With `WriteMode::CreateNew` an existing `dst` is left untouched and
    /// an `AlreadyExists` error is returned.
    fn copy(&self, src: &Path, dst: &Path, mode: WriteMode) -> io::Result<u64>;

    /// Compare two files byte for byte.
    ///
    /// `Ok(false)` is a definitive mismatch; `Err` means a file could not
    /// be read.
    fn content_equal(&self, a: &Path, b: &Path) -> io::Result<bool>;
}

/// Set `path`'s permission bits to `mode`
#[cfg(unix)]
pub fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Set `path` read-only when `mode` has no write bits
#[cfg(not(unix))]
pub fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn test_apply_mode() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("copy.jpg");
        fs::write(&file, b"x").unwrap();

        apply_mode(&file, 0o600).unwrap();
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o777, 0o600);
    }
}
