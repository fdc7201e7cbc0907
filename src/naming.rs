//! Target naming oracle
//!
//! The oracle is the only authority over which target paths have been
//! issued. It is seeded from the target directory's existing contents and
//! then answers one claim at a time:
//!
//! 1. `target_dir/<leaf>` unclaimed: claim it, nothing to compare.
//! 2. Claimed and present on disk with identical content: report it as
//!    already present so the caller can skip.
//! 3. Otherwise: claim `stem_<uuid>.ext` (or `stem-<uuid>`).
//!
//! The whole claim runs under one lock, so checking and claiming a name are
//! atomic with respect to other workers.

use crate::content::FileOps;
use crate::error::{NamingError, NamingResult};
use crate::types::EntryType;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Upper bound on suffixed names tried for one claim
const MAX_SUFFIX_ATTEMPTS: u32 = 16;

/// Outcome of a successful claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Path the caller should write (or skip)
    pub target: PathBuf,

    /// Identical content already exists at `target`
    pub already_present: bool,

    /// `target` is the caller's own earlier attempt and may be rewritten
    pub reissued: bool,
}

/// Issues collision-free target paths under one target directory
pub struct TargetNameOracle {
    target_dir: PathBuf,
    claimed: Mutex<HashSet<PathBuf>>,
    ops: Arc<dyn FileOps>,
}

impl TargetNameOracle {
    /// Seed the oracle from the target directory.
    ///
    /// Fails if the directory is missing, unreadable, or contains anything
    /// other than regular files.
    pub fn new(target_dir: impl Into<PathBuf>, ops: Arc<dyn FileOps>) -> NamingResult<Self> {
        let target_dir = target_dir.into();

        let meta = fs::metadata(&target_dir).map_err(|e| NamingError::InvalidTarget {
            path: target_dir.clone(),
            reason: e.to_string(),
        })?;
        if !meta.is_dir() {
            return Err(NamingError::InvalidTarget {
                path: target_dir,
                reason: "not a directory".into(),
            });
        }

        let read_err = |e: std::io::Error| NamingError::InvalidTarget {
            path: target_dir.clone(),
            reason: e.to_string(),
        };

        let mut claimed = HashSet::new();
        for entry in fs::read_dir(&target_dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let kind = EntryType::from_file_type(entry.file_type().map_err(read_err)?);
            if !kind.is_file() {
                return Err(NamingError::IrregularTargetEntry {
                    path: entry.path(),
                    kind,
                });
            }
            claimed.insert(entry.path());
        }

        info!(
            target = %target_dir.display(),
            existing = claimed.len(),
            "Target directory seeded"
        );

        Ok(Self {
            target_dir,
            claimed: Mutex::new(claimed),
            ops,
        })
    }

    /// Number of names claimed so far, seeded ones included
    pub fn claimed_count(&self) -> usize {
        self.claimed.lock().len()
    }

    /// Claim a target path for `source`.
    ///
    /// `previous` is the target issued to this same item on an earlier
    /// attempt; it is already owned by the caller and is returned as-is so
    /// a retry overwrites its own bad copy instead of taking a new name.
    ///
    /// A file created in the target after seeding is not known here. The
    /// writer finds it (`AlreadyExists`) and claims again without
    /// `previous`, which then compares against it like any collision.
    pub fn claim(&self, source: &Path, previous: Option<&Path>) -> NamingResult<Claim> {
        let mut claimed = self.claimed.lock();

        if let Some(prev) = previous {
            if claimed.contains(prev) {
                return Ok(Claim {
                    target: prev.to_path_buf(),
                    already_present: false,
                    reissued: true,
                });
            }
        }

        let file_name = source.file_name().ok_or_else(|| NamingError::MissingFileName {
            path: source.to_path_buf(),
        })?;
        let candidate = self.target_dir.join(file_name);

        if claimed.insert(candidate.clone()) {
            return Ok(Claim {
                target: candidate,
                already_present: false,
                reissued: false,
            });
        }

        // Claimed already. A worker may still be mid-copy, so only compare
        // when something is actually on disk.
        if candidate.is_file() {
            let same = self
                .ops
                .content_equal(source, &candidate)
                .map_err(|e| NamingError::Compare {
                    source_path: source.to_path_buf(),
                    target: candidate.clone(),
                    source: e,
                })?;
            if same {
                return Ok(Claim {
                    target: candidate,
                    already_present: true,
                    reissued: false,
                });
            }
        }

        let name = file_name.to_str().ok_or_else(|| NamingError::NonUtf8Name {
            path: source.to_path_buf(),
        })?;
        let (stem, ext) = split_name(name)?;

        for _ in 0..MAX_SUFFIX_ATTEMPTS {
            let alternate = self.target_dir.join(suffixed_name(stem, ext, Uuid::new_v4()));
            if claimed.insert(alternate.clone()) {
                debug!(
                    source = %source.display(),
                    target = %alternate.display(),
                    "Name collision resolved with suffix"
                );
                return Ok(Claim {
                    target: alternate,
                    already_present: false,
                    reissued: false,
                });
            }
        }

        Err(NamingError::Exhausted {
            name: name.to_string(),
            attempts: MAX_SUFFIX_ATTEMPTS,
        })
    }
}

/// Split a leaf name into stem and at most one extension.
///
/// `img001` -> (`img001`, None), `img001.jpg` -> (`img001`, Some(`jpg`)).
/// Any name with more than one period is rejected.
pub fn split_name(name: &str) -> NamingResult<(&str, Option<&str>)> {
    match name.split_once('.') {
        None => Ok((name, None)),
        Some((stem, ext)) if !ext.contains('.') => Ok((stem, Some(ext))),
        Some(_) => Err(NamingError::MalformedName {
            name: name.to_string(),
        }),
    }
}

/// Build the alternate leaf name for a collision
pub fn suffixed_name(stem: &str, ext: Option<&str>, suffix: Uuid) -> String {
    match ext {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}-{}", stem, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FileComparator;
    use std::thread;
    use tempfile::tempdir;

    fn oracle(dir: &Path) -> TargetNameOracle {
        TargetNameOracle::new(dir, Arc::new(FileComparator::default())).unwrap()
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("img001.jpg").unwrap(), ("img001", Some("jpg")));
        assert_eq!(split_name("README").unwrap(), ("README", None));
        assert_eq!(split_name(".hidden").unwrap(), ("", Some("hidden")));
        assert_eq!(split_name("trailing.").unwrap(), ("trailing", Some("")));
        for name in ["archive.tar.gz", "a.b.c", "two..dots"] {
            assert!(
                matches!(split_name(name), Err(NamingError::MalformedName { .. })),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_suffixed_name() {
        let id = Uuid::nil();
        assert_eq!(
            suffixed_name("img001", Some("jpg"), id),
            "img001_00000000-0000-0000-0000-000000000000.jpg"
        );
        assert_eq!(
            suffixed_name("README", None, id),
            "README-00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_fast_path_claim() {
        let target = tempdir().unwrap();
        let oracle = oracle(target.path());

        let claim = oracle.claim(Path::new("/mnt/card1/img001.jpg"), None).unwrap();
        assert_eq!(claim.target, target.path().join("img001.jpg"));
        assert!(!claim.already_present);
        assert!(!claim.reissued);
        assert_eq!(oracle.claimed_count(), 1);
    }

    #[test]
    fn test_seeded_identical_is_present() {
        let src = tempdir().unwrap();
        let target = tempdir().unwrap();
        fs::write(src.path().join("img001.jpg"), b"12345").unwrap();
        fs::write(target.path().join("img001.jpg"), b"12345").unwrap();

        let oracle = oracle(target.path());
        assert_eq!(oracle.claimed_count(), 1);

        let claim = oracle.claim(&src.path().join("img001.jpg"), None).unwrap();
        assert_eq!(claim.target, target.path().join("img001.jpg"));
        assert!(claim.already_present);
    }

    #[test]
    fn test_seeded_different_gets_suffix() {
        let src = tempdir().unwrap();
        let target = tempdir().unwrap();
        fs::write(src.path().join("img001.jpg"), b"12345").unwrap();
        fs::write(target.path().join("img001.jpg"), b"54321").unwrap();

        let oracle = oracle(target.path());
        let claim = oracle.claim(&src.path().join("img001.jpg"), None).unwrap();

        assert!(!claim.already_present);
        let leaf = claim.target.file_name().unwrap().to_str().unwrap().to_string();
        assert!(leaf.starts_with("img001_"), "{}", leaf);
        assert!(leaf.ends_with(".jpg"), "{}", leaf);
        assert_eq!(claim.target.parent().unwrap(), target.path());
    }

    #[test]
    fn test_claimed_but_absent_gets_suffix() {
        let target = tempdir().unwrap();
        let oracle = oracle(target.path());

        let first = oracle.claim(Path::new("/a/README"), None).unwrap();
        let second = oracle.claim(Path::new("/b/README"), None).unwrap();

        assert_ne!(first.target, second.target);
        let leaf = second.target.file_name().unwrap().to_str().unwrap();
        assert!(leaf.starts_with("README-"));
    }

    #[test]
    fn test_collision_with_malformed_name() {
        let target = tempdir().unwrap();
        let oracle = oracle(target.path());

        oracle.claim(Path::new("/a/photo.tar.gz"), None).unwrap();
        let err = oracle.claim(Path::new("/b/photo.tar.gz"), None).unwrap_err();
        assert!(matches!(err, NamingError::MalformedName { .. }));
    }

    #[test]
    fn test_previous_target_is_reissued() {
        let target = tempdir().unwrap();
        let oracle = oracle(target.path());

        let first = oracle.claim(Path::new("/a/img.jpg"), None).unwrap();
        let again = oracle
            .claim(Path::new("/a/img.jpg"), Some(&first.target))
            .unwrap();

        assert_eq!(first.target, again.target);
        assert!(!again.already_present);
        assert!(again.reissued);
        assert_eq!(oracle.claimed_count(), 1);
    }

    #[test]
    fn test_irregular_target_entry_rejected() {
        let target = tempdir().unwrap();
        fs::create_dir(target.path().join("subdir")).unwrap();

        let result = TargetNameOracle::new(target.path(), Arc::new(FileComparator::default()));
        assert!(matches!(
            result,
            Err(NamingError::IrregularTargetEntry {
                kind: EntryType::Directory,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_target_rejected() {
        let dir = tempdir().unwrap();
        let result = TargetNameOracle::new(
            dir.path().join("missing"),
            Arc::new(FileComparator::default()),
        );
        assert!(matches!(result, Err(NamingError::InvalidTarget { .. })));
    }

    #[test]
    fn test_concurrent_claims_are_unique() {
        let target = tempdir().unwrap();
        let oracle = Arc::new(oracle(target.path()));

        let handles: Vec<_> = (0..8)
            .map(|card| {
                let oracle = Arc::clone(&oracle);
                thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            let src = PathBuf::from(format!("/mnt/card{}/img{:03}.jpg", card, i));
                            oracle.claim(&src, None).unwrap().target
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for target in handle.join().unwrap() {
                assert!(all.insert(target), "target issued twice");
            }
        }
        assert_eq!(all.len(), 400);
        assert_eq!(oracle.claimed_count(), 400);
    }
}
