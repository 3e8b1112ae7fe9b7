use sizedupe::duplicates::{DuplicateFinder, FinderConfig};
use sizedupe::scanner::Walker;
use std::fs;
use tempfile::tempdir;

fn finder() -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default(), Box::new(Walker::new())).unwrap()
}

#[cfg(unix)]
#[test]
fn test_symlink_next_to_target_is_one_file() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let target = root.join("target.txt");
    fs::write(&target, "linked content").unwrap();
    std::os::unix::fs::symlink(&target, root.join("link.txt")).unwrap();

    let report = finder().find_duplicates(&[root]).unwrap();

    assert!(report.is_empty());
    assert_eq!(report.summary.total_files, 2);
    assert_eq!(report.summary.meta_candidates, 0);
}

#[cfg(unix)]
#[test]
fn test_symlink_resolves_to_target_path() {
    let dir = tempdir().unwrap();
    let base = fs::canonicalize(dir.path()).unwrap();
    let outside = base.join("outside");
    let root = base.join("root");
    fs::create_dir_all(&outside).unwrap();
    fs::create_dir_all(&root).unwrap();

    let target = outside.join("real.txt");
    fs::write(&target, "copy me").unwrap();
    fs::write(root.join("copy.txt"), "copy me").unwrap();
    std::os::unix::fs::symlink(&target, root.join("alias.txt")).unwrap();

    let report = finder().find_duplicates(&[root.clone()]).unwrap();

    assert_eq!(report.groups.len(), 1);
    let paths: Vec<_> = report.groups[0].paths().collect();
    assert_eq!(paths, vec![target.as_path(), root.join("copy.txt").as_path()]);
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_is_skipped() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a"), "pair").unwrap();
    fs::write(root.join("b"), "pair").unwrap();
    std::os::unix::fs::symlink(root.join("missing"), root.join("dangling")).unwrap();

    let report = finder().find_duplicates(&[root]).unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.summary.total_files, 2);
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_not_descended() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let real = root.join("real");
    fs::create_dir(&real).unwrap();
    fs::write(real.join("only.txt"), "single").unwrap();
    std::os::unix::fs::symlink(&real, root.join("loop")).unwrap();

    let report = finder().find_duplicates(&[root]).unwrap();

    assert!(report.is_empty());
    assert_eq!(report.summary.total_files, 1);
}

#[test]
fn test_hardlinks_are_separate_paths() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    let hardlink = dir.path().join("hardlink.txt");
    fs::write(&original, "identical content").unwrap();

    if let Err(e) = fs::hard_link(&original, &hardlink) {
        eprintln!("Skipping hardlink test: failed to create hardlink: {}", e);
        return;
    }

    let report = finder()
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 2);
}
