use sizedupe::duplicates::{DuplicateFinder, FinderConfig, MetaOptions};
use sizedupe::scanner::Walker;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn finder(config: FinderConfig) -> DuplicateFinder {
    DuplicateFinder::new(config, Box::new(Walker::new())).unwrap()
}

#[test]
fn test_duplicates_across_roots() {
    let dir1 = tempdir().unwrap();
    let dir2 = tempdir().unwrap();
    fs::write(dir1.path().join("file1.txt"), "duplicate content").unwrap();
    fs::write(dir2.path().join("file2.txt"), "duplicate content").unwrap();

    let report = finder(FinderConfig::default())
        .find_duplicates(&[dir1.path().to_path_buf(), dir2.path().to_path_buf()])
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 2);
    assert_eq!(report.summary.total_files, 2);
}

#[test]
fn test_overlapping_roots_count_files_once() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(dir.path().join("a.txt"), "overlap").unwrap();
    fs::write(sub.join("b.txt"), "overlap").unwrap();

    let report = finder(FinderConfig::default())
        .find_duplicates(&[dir.path().to_path_buf(), sub.clone()])
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 2);
}

#[test]
fn test_same_root_given_twice() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "twice").unwrap();
    fs::write(dir.path().join("b.txt"), "twice").unwrap();
    let root = dir.path().to_path_buf();

    let report = finder(FinderConfig::default())
        .find_duplicates(&[root.clone(), root])
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 2);
}

#[test]
fn test_filename_must_equal_across_roots() {
    let dir1 = tempdir().unwrap();
    let dir2 = tempdir().unwrap();
    fs::write(dir1.path().join("same.txt"), "payload").unwrap();
    fs::write(dir2.path().join("same.txt"), "payload").unwrap();
    fs::write(dir2.path().join("renamed.txt"), "payload").unwrap();

    let options = MetaOptions {
        filename_must_equal: true,
        ..Default::default()
    };
    let report = finder(FinderConfig::default().with_meta_options(options))
        .find_duplicates(&[dir1.path().to_path_buf(), dir2.path().to_path_buf()])
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    let names: Vec<_> = report.groups[0]
        .paths()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["same.txt", "same.txt"]);
}

#[test]
fn test_one_missing_root_fails_the_run() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "x").unwrap();

    let result = finder(FinderConfig::default())
        .find_duplicates(&[dir.path().to_path_buf(), PathBuf::from("/no/such/root")]);

    assert!(result.is_err());
}
