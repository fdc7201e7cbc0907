//! Integration tests for cardslurp
//!
//! Every test builds real card and target directories under a tempdir and
//! runs the full coordinator against them.

use cardslurp::config::SlurpConfig;
use cardslurp::content::{FileComparator, FileOps, WriteMode};
use cardslurp::coordinator::SlurpCoordinator;
use cardslurp::error::{ItemError, NamingError, SlurpError, WalkError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn config(target: &Path, roots: &[&Path]) -> SlurpConfig {
    let mut config = SlurpConfig::new(target, roots.iter().map(|r| r.to_path_buf()).collect());
    config.worker_count = 4;
    config.max_retries = 2;
    config.verify_passes = 1;
    config
}

fn target_names(target: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(target)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn card_with(files: &[(&str, &[u8])]) -> TempDir {
    let card = tempdir().unwrap();
    for (name, data) in files {
        let path = card.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, data).unwrap();
    }
    card
}

#[test]
fn test_copies_single_file() {
    let card = card_with(&[("img001.jpg", b"12345")]);
    let target = tempdir().unwrap();

    let summary = SlurpCoordinator::new(config(target.path(), &[card.path()]))
        .run()
        .unwrap();

    assert!(summary.completed);
    assert_eq!(summary.files_copied, 1);
    assert_eq!(summary.files_skipped, 0);
    assert_eq!(summary.bytes_copied, 5);
    assert_eq!(fs::read(target.path().join("img001.jpg")).unwrap(), b"12345");
}

#[test]
fn test_identical_file_is_skipped() {
    let card = card_with(&[("img001.jpg", b"12345")]);
    let target = tempdir().unwrap();
    fs::write(target.path().join("img001.jpg"), b"12345").unwrap();

    let summary = SlurpCoordinator::new(config(target.path(), &[card.path()]))
        .run()
        .unwrap();

    assert_eq!(summary.files_copied, 0);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(target_names(target.path()), vec!["img001.jpg"]);
}

#[test]
fn test_different_content_gets_suffixed_name() {
    let card = card_with(&[("img001.jpg", b"new content")]);
    let target = tempdir().unwrap();
    fs::write(target.path().join("img001.jpg"), b"old").unwrap();

    let summary = SlurpCoordinator::new(config(target.path(), &[card.path()]))
        .run()
        .unwrap();

    assert_eq!(summary.files_copied, 1);
    assert_eq!(fs::read(target.path().join("img001.jpg")).unwrap(), b"old");

    let names = target_names(target.path());
    assert_eq!(names.len(), 2);
    let suffixed = names.iter().find(|n| *n != "img001.jpg").unwrap();
    assert!(suffixed.starts_with("img001_"));
    assert!(suffixed.ends_with(".jpg"));
    assert_eq!(fs::read(target.path().join(suffixed)).unwrap(), b"new content");
}

#[test]
fn test_nested_files_flatten_into_target() {
    let card = card_with(&[
        ("DCIM/100CANON/IMG_0001.CR2", b"raw-1"),
        ("DCIM/101CANON/IMG_0002.CR2", b"raw-2"),
        ("MISC/notes", b"no extension"),
    ]);
    let target = tempdir().unwrap();

    let summary = SlurpCoordinator::new(config(target.path(), &[card.path()]))
        .run()
        .unwrap();

    assert_eq!(summary.files_copied, 3);
    assert_eq!(
        target_names(target.path()),
        vec!["IMG_0001.CR2", "IMG_0002.CR2", "notes"]
    );
}

#[test]
fn test_second_run_is_idempotent() {
    let card = card_with(&[("a.jpg", b"aaa"), ("b.jpg", b"bbb"), ("sub/c.jpg", b"ccc")]);
    let target = tempdir().unwrap();

    let first = SlurpCoordinator::new(config(target.path(), &[card.path()]))
        .run()
        .unwrap();
    assert_eq!(first.files_copied, 3);

    let second = SlurpCoordinator::new(config(target.path(), &[card.path()]))
        .run()
        .unwrap();
    assert_eq!(second.files_copied, 0);
    assert_eq!(second.files_skipped, 3);
    assert_eq!(target_names(target.path()).len(), 3);
}

#[test]
fn test_multiple_roots_dedup_and_collide() {
    let card1 = card_with(&[("same.jpg", b"shared"), ("clash.jpg", b"card one")]);
    let card2 = card_with(&[("same.jpg", b"shared"), ("clash.jpg", b"card two")]);
    let target = tempdir().unwrap();

    // One worker: a claim never races an unfinished copy of the same name
    let mut cfg = config(target.path(), &[card1.path(), card2.path()]);
    cfg.worker_count = 1;
    let summary = SlurpCoordinator::new(cfg).run().unwrap();

    assert!(summary.completed);
    assert_eq!(summary.files_located, 4);
    assert_eq!(summary.files_copied, 3);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.roots.len(), 2);
    assert_eq!(summary.roots[0].root, card1.path());
    assert_eq!(summary.roots[0].located, 2);
    assert_eq!(summary.roots[1].located, 2);

    let names = target_names(target.path());
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"same.jpg".to_string()));
    assert!(names.contains(&"clash.jpg".to_string()));

    let mut contents: Vec<Vec<u8>> = names
        .iter()
        .filter(|n| n.starts_with("clash"))
        .map(|n| fs::read(target.path().join(n)).unwrap())
        .collect();
    contents.sort();
    assert_eq!(contents, vec![b"card one".to_vec(), b"card two".to_vec()]);
}

#[cfg(unix)]
#[test]
fn test_unsupported_entry_aborts_before_copy() {
    let good = card_with(&[("ok.jpg", b"fine")]);
    let bad = card_with(&[("ok2.jpg", b"fine too")]);
    std::os::unix::fs::symlink(bad.path().join("ok2.jpg"), bad.path().join("link.jpg")).unwrap();
    let target = tempdir().unwrap();

    let err = SlurpCoordinator::new(config(target.path(), &[good.path(), bad.path()]))
        .run()
        .unwrap_err();

    match err {
        SlurpError::Walk(WalkError::UnsupportedEntry { root, .. }) => {
            assert_eq!(root, bad.path());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(target_names(target.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_aborts_before_copy() {
    use std::os::unix::fs::PermissionsExt;

    let good = card_with(&[("ok.jpg", b"fine")]);
    let bad = card_with(&[("locked/secret.jpg", b"hidden")]);
    let locked = bad.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read it anyway
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let target = tempdir().unwrap();
    let result = SlurpCoordinator::new(config(target.path(), &[good.path(), bad.path()])).run();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    match result {
        Err(SlurpError::Walk(walk)) => assert_eq!(walk.root(), bad.path()),
        other => panic!("unexpected {:?}", other),
    }
    assert!(target_names(target.path()).is_empty());
}

#[test]
fn test_target_with_subdirectory_is_fatal() {
    let card = card_with(&[("a.jpg", b"a")]);
    let target = tempdir().unwrap();
    fs::create_dir(target.path().join("nested")).unwrap();

    let err = SlurpCoordinator::new(config(target.path(), &[card.path()]))
        .run()
        .unwrap_err();

    assert!(matches!(
        err,
        SlurpError::Naming(NamingError::IrregularTargetEntry { .. })
    ));
    assert_eq!(target_names(target.path()), vec!["nested"]);
}

/// Copies for real but every comparison reports a mismatch
struct AlwaysMismatch(FileComparator);

impl FileOps for AlwaysMismatch {
    fn copy(&self, src: &Path, dst: &Path, mode: WriteMode) -> io::Result<u64> {
        self.0.copy(src, dst, mode)
    }

    fn content_equal(&self, _a: &Path, _b: &Path) -> io::Result<bool> {
        Ok(false)
    }
}

#[test]
fn test_retry_ceiling_is_major_error() {
    let card = card_with(&[("img001.jpg", b"12345")]);
    let target = tempdir().unwrap();

    let coordinator = SlurpCoordinator::with_file_ops(
        config(target.path(), &[card.path()]),
        Arc::new(AlwaysMismatch(FileComparator::default())),
    );
    let err = coordinator.run().unwrap_err();

    match err {
        SlurpError::Item {
            path,
            source,
            summary,
        } => {
            assert_eq!(path, card.path().join("img001.jpg"));
            assert!(matches!(source, ItemError::OutOfRetries { retries: 2 }));
            assert_eq!(summary.files_failed, 1);
            assert_eq!(summary.retries, 2);
            assert_eq!(summary.minor_errors.len(), 3);
        }
        other => panic!("unexpected {:?}", other),
    }
    // Every attempt wrote the same target path
    assert_eq!(target_names(target.path()), vec!["img001.jpg"]);
}

/// Fails every copy of a file named `bad.jpg`
struct FailingCopy(FileComparator);

impl FileOps for FailingCopy {
    fn copy(&self, src: &Path, dst: &Path, mode: WriteMode) -> io::Result<u64> {
        if src.file_name().is_some_and(|n| n == "bad.jpg") {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only target"));
        }
        self.0.copy(src, dst, mode)
    }

    fn content_equal(&self, a: &Path, b: &Path) -> io::Result<bool> {
        self.0.content_equal(a, b)
    }
}

#[test]
fn test_copy_error_aborts_run() {
    let card = card_with(&[("bad.jpg", b"nope")]);
    let target = tempdir().unwrap();

    let mut cfg = config(target.path(), &[card.path()]);
    cfg.worker_count = 1;
    let err = SlurpCoordinator::with_file_ops(cfg, Arc::new(FailingCopy(FileComparator::default())))
        .run()
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Major error copying"));
    assert_eq!(err.partial_summary().map(|s| s.files_failed), Some(1));
    assert!(matches!(
        err,
        SlurpError::Item {
            source: ItemError::Copy { .. },
            ..
        }
    ));
}

#[test]
fn test_preset_shutdown_leaves_run_incomplete() {
    let card = card_with(&[("a.jpg", b"a"), ("b.jpg", b"b")]);
    let target = tempdir().unwrap();

    let coordinator = SlurpCoordinator::new(config(target.path(), &[card.path()]));
    coordinator
        .shutdown_flag()
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let summary = coordinator.run().unwrap();
    assert!(!summary.completed);
    assert_eq!(summary.files_located, 2);
    assert_eq!(summary.files_copied, 0);
}

#[test]
fn test_missing_root_is_fatal() {
    let target = tempdir().unwrap();
    let missing = PathBuf::from("/definitely/not/a/card");

    let err = SlurpCoordinator::new(config(target.path(), &[missing.as_path()]))
        .run()
        .unwrap_err();
    assert!(matches!(err, SlurpError::Walk(WalkError::InvalidRoot { .. })));
}
