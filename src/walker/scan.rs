//! Source root discovery
//!
//! Walks one source root with `walkdir` (symlinks never followed) and
//! returns a `WorkItem` for every regular file. Anything that is neither a
//! directory nor a regular file, and any directory that cannot be listed,
//! aborts the walk for that root.

use crate::error::{WalkError, WalkResult};
use crate::types::{EntryType, WorkItem};
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// Enumerate every regular file under `root`.
///
/// Partial results are never returned: on error the caller gets only the
/// error, which names the offending root.
pub fn walk_root(root: &Path) -> WalkResult<Vec<WorkItem>> {
    let root_meta = fs::metadata(root).map_err(|e| WalkError::InvalidRoot {
        root: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !root_meta.is_dir() {
        return Err(WalkError::InvalidRoot {
            root: root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| read_dir_error(root, e))?;
        let path = entry.path();

        match EntryType::from_file_type(entry.file_type()) {
            EntryType::Directory => {
                debug!(root = %root.display(), dir = %path.display(), depth = entry.depth(), "Recursing");
            }
            EntryType::File => {
                // Not followed, so this is the entry's own metadata
                let meta = entry.metadata().map_err(|e| WalkError::Stat {
                    root: root.to_path_buf(),
                    path: path.to_path_buf(),
                    source: into_io_error(e),
                })?;
                let parent = path.parent().unwrap_or(root);

                debug!(path = %path.display(), "Found");
                found.push(WorkItem::new(
                    root,
                    parent,
                    entry.file_name(),
                    permission_bits(&meta),
                    meta.len(),
                    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                ));
            }
            kind => {
                return Err(WalkError::UnsupportedEntry {
                    root: root.to_path_buf(),
                    path: path.to_path_buf(),
                    kind,
                })
            }
        }
    }

    Ok(found)
}

fn read_dir_error(root: &Path, err: walkdir::Error) -> WalkError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    WalkError::ReadDir {
        root: root.to_path_buf(),
        path,
        source: into_io_error(err),
    }
}

fn into_io_error(err: walkdir::Error) -> io::Error {
    let message = err.to_string();
    err.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message))
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
