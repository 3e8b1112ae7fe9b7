use sizedupe::duplicates::{
    DuplicateFinder, DuplicateReport, FinderConfig, FinderError, MetaOptions,
};
use sizedupe::efu::{self, EfuRow};
use sizedupe::scanner::{
    EfuListService, EnumerationBackend, EnumerationError, EnumerationQuery, IndexBackend, Walker,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn row(path: &Path, size: Option<u64>) -> EfuRow {
    EfuRow {
        filename: path.to_string_lossy().into_owned(),
        size,
        date_modified: None,
        date_created: None,
        attributes: Some(0),
    }
}

fn write_list(path: &Path, rows: &[EfuRow]) {
    efu::write_rows(File::create(path).unwrap(), rows).unwrap();
}

#[test]
fn test_index_backend_matches_walker() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap().join("data");
    fs::create_dir_all(root.join("sub")).unwrap();
    let a = root.join("a.txt");
    let b = root.join("sub").join("b.txt");
    let c = root.join("c.txt");
    fs::write(&a, "index content").unwrap();
    fs::write(&b, "index content").unwrap();
    fs::write(&c, "different bytes").unwrap();

    let list = dir.path().join("list.efu");
    write_list(&list, &[row(&a, Some(13)), row(&b, None), row(&c, Some(15))]);

    let roots = vec![root.clone()];
    let indexed = DuplicateFinder::new(
        FinderConfig::default(),
        Box::new(IndexBackend::new(EfuListService::new(&list))),
    )
    .unwrap()
    .find_duplicates(&roots)
    .unwrap();
    let walked = DuplicateFinder::new(FinderConfig::default(), Box::new(Walker::new()))
        .unwrap()
        .find_duplicates(&roots)
        .unwrap();

    assert_eq!(indexed.groups, walked.groups);
    assert_eq!(indexed.groups.len(), 1);
    assert_eq!(indexed.summary.total_files, 3);
}

fn both_backends(
    list: &Path,
    roots: &[PathBuf],
    config: FinderConfig,
) -> (DuplicateReport, DuplicateReport) {
    let indexed = DuplicateFinder::new(
        config.clone(),
        Box::new(IndexBackend::new(EfuListService::new(list))),
    )
    .unwrap()
    .find_duplicates(roots)
    .unwrap();
    let walked = DuplicateFinder::new(config, Box::new(Walker::new()))
        .unwrap()
        .find_duplicates(roots)
        .unwrap();
    (indexed, walked)
}

#[cfg(unix)]
#[test]
fn test_index_backend_matches_walker_for_link_to_outside() {
    let dir = tempdir().unwrap();
    let base = fs::canonicalize(dir.path()).unwrap();
    let outside = base.join("outside");
    let root = base.join("root");
    fs::create_dir_all(&outside).unwrap();
    fs::create_dir_all(&root).unwrap();

    let target = outside.join("real.txt");
    let copy = root.join("copy.txt");
    let alias = root.join("alias.txt");
    fs::write(&target, "copy me").unwrap();
    fs::write(&copy, "copy me").unwrap();
    std::os::unix::fs::symlink(&target, &alias).unwrap();

    let list = base.join("list.efu");
    write_list(&list, &[row(&alias, None), row(&copy, None)]);

    let (indexed, walked) = both_backends(&list, &[root], FinderConfig::default());

    assert_eq!(indexed.groups, walked.groups);
    assert_eq!(indexed.groups.len(), 1);
    let paths: Vec<_> = indexed.groups[0].paths().collect();
    assert_eq!(paths, vec![target.as_path(), copy.as_path()]);
}

#[test]
fn test_index_backend_matches_walker_on_close_mtimes() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap().join("data");
    fs::create_dir_all(&root).unwrap();
    let a = root.join("a.txt");
    let b = root.join("b.txt");
    fs::write(&a, "same stamp").unwrap();
    fs::write(&b, "same stamp").unwrap();
    // Both fall in the same 100 ns FILETIME tick
    filetime::set_file_mtime(&a, filetime::FileTime::from_unix_time(1_600_000_000, 10)).unwrap();
    filetime::set_file_mtime(&b, filetime::FileTime::from_unix_time(1_600_000_000, 50)).unwrap();

    let tick =
        efu::to_filetime(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000));
    let dated = |path: &Path| EfuRow {
        date_modified: Some(tick),
        ..row(path, None)
    };
    let list = dir.path().join("list.efu");
    write_list(&list, &[dated(&a), dated(&b)]);

    let options = MetaOptions {
        modified_date_must_equal: true,
        ..Default::default()
    };
    let (indexed, walked) = both_backends(
        &list,
        &[root],
        FinderConfig::default().with_meta_options(options),
    );

    assert_eq!(indexed.groups, walked.groups);
}

#[test]
fn test_index_entries_outside_roots_are_ignored() {
    let dir = tempdir().unwrap();
    let base = fs::canonicalize(dir.path()).unwrap();
    let inside = base.join("inside");
    let outside = base.join("outside");
    fs::create_dir_all(&inside).unwrap();
    fs::create_dir_all(&outside).unwrap();
    fs::write(inside.join("a"), "shared").unwrap();
    fs::write(outside.join("b"), "shared").unwrap();

    let list = base.join("list.efu");
    write_list(
        &list,
        &[
            row(&inside.join("a"), None),
            row(&outside.join("b"), None),
            row(&inside.join("deleted"), Some(6)),
        ],
    );

    let backend = IndexBackend::new(EfuListService::new(&list));
    let records = backend
        .enumerate(&[inside.clone()], &EnumerationQuery::default())
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file.path, inside.join("a"));
    assert_eq!(records[0].file.size, 6);
}

#[test]
fn test_index_list_missing() {
    let dir = tempdir().unwrap();
    let backend = IndexBackend::new(EfuListService::new(dir.path().join("absent.efu")));

    let err = backend
        .enumerate(&[dir.path().to_path_buf()], &EnumerationQuery::default())
        .unwrap_err();

    assert!(matches!(err, EnumerationError::Unavailable { .. }));
}

#[test]
fn test_index_list_malformed_fails_enumeration() {
    let dir = tempdir().unwrap();
    let list = dir.path().join("bad.efu");
    fs::write(&list, "Name,Size\nfoo,1\n").unwrap();

    let finder = DuplicateFinder::new(
        FinderConfig::default(),
        Box::new(IndexBackend::new(EfuListService::new(&list))),
    )
    .unwrap();
    let err = finder
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap_err();

    assert!(matches!(
        err,
        FinderError::Enumeration {
            source: EnumerationError::Malformed { .. }
        }
    ));
}

#[cfg(unix)]
#[test]
fn test_command_service_output() {
    use sizedupe::scanner::CommandService;

    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("x1"), "same").unwrap();
    fs::write(root.join("x2"), "same").unwrap();
    let list = root.join("list.efu");
    write_list(&list, &[row(&root.join("x1"), None), row(&root.join("x2"), None)]);

    let command: Vec<String> = vec![
        "sh".into(),
        "-c".into(),
        format!("cat '{}'", list.display()),
    ];
    let service = CommandService::from_command_line(&command).unwrap();
    let records = IndexBackend::new(service)
        .enumerate(&[PathBuf::from(&root)], &EnumerationQuery::default())
        .unwrap();

    assert_eq!(records.len(), 2);
}

#[cfg(unix)]
#[test]
fn test_command_service_failure() {
    use sizedupe::scanner::CommandService;

    let dir = tempdir().unwrap();
    let command: Vec<String> = vec!["sh".into(), "-c".into(), "exit 3".into()];
    let service = CommandService::from_command_line(&command).unwrap();

    let err = IndexBackend::new(service)
        .enumerate(&[dir.path().to_path_buf()], &EnumerationQuery::default())
        .unwrap_err();

    assert!(matches!(err, EnumerationError::Unavailable { .. }));
}
