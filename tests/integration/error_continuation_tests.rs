use sizedupe::duplicates::{
    Candidate, DuplicateFinder, FinderConfig, FinderError, HashScheduler, MetaKey,
    PipelineState,
};
use sizedupe::scanner::{AccessError, FileRecord, FileRef, HashMode, Hasher, Walker};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn finder(config: FinderConfig) -> DuplicateFinder {
    DuplicateFinder::new(config, Box::new(Walker::new())).unwrap()
}

#[test]
fn test_missing_files_are_excluded_not_fatal() {
    let records = vec![
        FileRecord::new(PathBuf::from("nonexistent_1.txt"), 100, None),
        FileRecord::new(PathBuf::from("nonexistent_2.txt"), 100, None),
    ];

    let report = finder(FinderConfig::default())
        .find_duplicates_from_records(records)
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(report.summary.unreadable_files, 2);
    assert_eq!(report.summary.meta_candidates, 2);
}

#[test]
fn test_unreadable_member_leaves_rest_of_group() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, "twelve bytes").unwrap();
    fs::write(&b, "twelve bytes").unwrap();

    let records = vec![
        FileRecord::new(a.clone(), 12, None),
        FileRecord::new(b.clone(), 12, None),
        FileRecord::new(dir.path().join("gone.txt"), 12, None),
    ];

    let report = finder(FinderConfig::default())
        .find_duplicates_from_records(records)
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    let paths: Vec<_> = report.groups[0].paths().collect();
    assert_eq!(paths, vec![a.as_path(), b.as_path()]);
    assert_eq!(report.summary.unreadable_files, 1);
}

#[test]
fn test_scheduler_reports_each_failure() {
    let hasher = Arc::new(Hasher::new());
    let scheduler = HashScheduler::new(hasher, 3).unwrap();
    let candidates: Vec<Candidate> = (0..5)
        .map(|i| Candidate {
            meta: MetaKey::size_only(10),
            file: FileRef::new(PathBuf::from(format!("missing_{i}.bin")), 10),
        })
        .collect();

    let (grouping, stats) = scheduler.run(candidates, HashMode::Full);

    assert!(grouping.is_empty());
    assert_eq!(stats.input_files, 5);
    assert_eq!(stats.failed_files, 5);
    assert_eq!(stats.errors.len(), 5);
    assert!(stats
        .errors
        .iter()
        .all(|e| matches!(e, AccessError::NotFound(_))));
}

#[test]
fn test_file_shrunk_after_enumeration() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    fs::write(&a, vec![1u8; 64]).unwrap();
    fs::write(&b, vec![1u8; 64]).unwrap();

    let records = vec![
        FileRecord::new(a, 64, None),
        FileRecord::new(b.clone(), 64, None),
    ];
    fs::write(&b, vec![1u8; 10]).unwrap();

    let report = finder(FinderConfig::default())
        .find_duplicates_from_records(records)
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(report.summary.unreadable_files, 1);
}

#[test]
fn test_shutdown_before_scan() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), "x").unwrap();
    let flag = Arc::new(AtomicBool::new(true));

    let err = finder(FinderConfig::default().with_shutdown_flag(flag))
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap_err();

    assert!(matches!(
        err,
        FinderError::Interrupted {
            stage: PipelineState::Enumerated
        }
    ));
}

#[cfg(unix)]
#[test]
fn test_permission_denied_file_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    let locked = dir.path().join("locked.txt");
    for path in [&a, &b, &locked] {
        fs::write(path, "same content").unwrap();
    }
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::File::open(&locked).is_ok() {
        // Running with privileges that ignore file modes.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let report = finder(FinderConfig::default())
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 2);
    assert_eq!(report.summary.unreadable_files, 1);
}
