//! Sidecar safe-copy
//!
//! Replaces the metadata sidecars (`.xmp` by default) of one copy of a
//! shoot with those from another copy of the same shoot. The target's
//! existing sidecars are moved into a `sideCartBackup-<millis>` directory
//! first; every new copy is verified before the next one starts.

use crate::config::SidecarConfig;
use crate::content::{FileOps, WriteMode};
use crate::error::{SidecarError, SidecarResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Prefix of the backup directory created inside the target
pub const BACKUP_PREFIX: &str = "sideCartBackup-";

/// Outcome of a sidecar copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidecarSummary {
    /// Where the target's old sidecars went (`None` on a dry run)
    pub backup_dir: Option<PathBuf>,

    /// Sidecars moved out of the target
    pub backed_up: u64,

    /// Sidecars copied and verified
    pub copied: u64,

    /// Nothing was changed
    pub dry_run: bool,
}

/// Both directories must be distinct copies of the same shoot, which
/// means the same final directory name.
pub fn check_same_shoot(source: &Path, target: &Path) -> SidecarResult<()> {
    let same_dir = match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => source == target,
    };
    if same_dir {
        return Err(SidecarError::SameDirectory {
            path: source.to_path_buf(),
        });
    }

    if source.file_name() != target.file_name() {
        return Err(SidecarError::DifferentShoot {
            source_dir: source.to_path_buf(),
            target_dir: target.to_path_buf(),
        });
    }

    Ok(())
}

/// Regular files directly inside `dir` whose extension is exactly `ext`,
/// sorted by name
pub fn list_sidecars(dir: &Path, ext: &str) -> SidecarResult<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| SidecarError::Io {
            action: "Failed to list",
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: io::Error::from(e),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().is_some_and(|e| e == ext) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

/// Backup directory path for a given timestamp
pub fn backup_dir_for(target: &Path, stamp_ms: u128) -> PathBuf {
    target.join(format!("{}{}", BACKUP_PREFIX, stamp_ms))
}

/// Move every sidecar in `target` into a fresh backup directory.
///
/// Fails with `BackupExists` rather than reuse a directory that is already
/// there.
pub fn backup_existing(target: &Path, ext: &str, stamp_ms: u128) -> SidecarResult<(PathBuf, u64)> {
    let backup_dir = backup_dir_for(target, stamp_ms);
    let existing = list_sidecars(target, ext)?;

    fs::create_dir(&backup_dir).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => SidecarError::BackupExists {
            path: backup_dir.clone(),
        },
        _ => SidecarError::Io {
            action: "Failed to create backup directory",
            path: backup_dir.clone(),
            source: e,
        },
    })?;

    let total = existing.len();
    for (i, path) in existing.iter().enumerate() {
        let Some(name) = path.file_name() else {
            continue;
        };
        let dest = backup_dir.join(name);
        fs::rename(path, &dest).map_err(|e| SidecarError::Io {
            action: "Failed to back up",
            path: path.clone(),
            source: e,
        })?;
        info!(file = %path.display(), n = i + 1, total, "Saved to backup");
    }

    Ok((backup_dir, total as u64))
}

/// Copy one sidecar into `target_dir` and verify it.
///
/// The destination must not exist; callers back up the target first.
pub fn safe_copy(ops: &dyn FileOps, source: &Path, target_dir: &Path) -> SidecarResult<PathBuf> {
    let name = source.file_name().ok_or_else(|| SidecarError::Io {
        action: "No file name in",
        path: source.to_path_buf(),
        source: io::Error::from(io::ErrorKind::InvalidInput),
    })?;
    let dest = target_dir.join(name);
    if dest == source {
        return Err(SidecarError::SameDirectory {
            path: target_dir.to_path_buf(),
        });
    }

    let bytes = ops
        .copy(source, &dest, WriteMode::CreateNew)
        .map_err(|e| SidecarError::Io {
            action: "Failed to copy",
            path: source.to_path_buf(),
            source: e,
        })?;

    let same = ops.content_equal(source, &dest).map_err(|e| SidecarError::Io {
        action: "Failed to verify",
        path: dest.clone(),
        source: e,
    })?;
    if !same {
        return Err(SidecarError::VerifyMismatch { path: dest });
    }

    debug!(source = %source.display(), target = %dest.display(), bytes, "Sidecar verified");
    Ok(dest)
}

/// Back up the target's sidecars, then copy and verify the source's.
///
/// Stops at the first failure. A dry run checks the directories and lists
/// both sides but changes nothing.
pub fn run_sidecar_copy(config: &SidecarConfig, ops: &dyn FileOps) -> SidecarResult<SidecarSummary> {
    let source = &config.source_dir;
    let target = &config.target_dir;
    let ext = config.extension.as_str();

    check_same_shoot(source, target)?;

    let sources = list_sidecars(source, ext)?;
    let mut summary = SidecarSummary {
        dry_run: config.dry_run,
        ..SidecarSummary::default()
    };

    if config.dry_run {
        let existing = list_sidecars(target, ext)?;
        for path in &existing {
            info!(file = %path.display(), "Would back up");
        }
        for path in &sources {
            info!(source = %path.display(), target = %target.display(), "Would copy");
        }
        summary.backed_up = existing.len() as u64;
        summary.copied = sources.len() as u64;
        return Ok(summary);
    }

    let (backup_dir, backed_up) = backup_existing(target, ext, backup_stamp())?;
    info!(backup = %backup_dir.display(), files = backed_up, "Existing sidecars backed up");
    summary.backup_dir = Some(backup_dir);
    summary.backed_up = backed_up;

    let total = sources.len();
    for (i, path) in sources.iter().enumerate() {
        safe_copy(ops, path, target)?;
        summary.copied += 1;
        info!(file = %path.display(), n = i + 1, total, "Finished");
    }

    Ok(summary)
}

/// Milliseconds since the epoch, for the backup directory name
fn backup_stamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
