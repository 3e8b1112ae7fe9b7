use clap::Parser;
use sizedupe::cli::Cli;
use sizedupe::duplicates::{DuplicateFinder, FinderConfig};
use sizedupe::efu;
use sizedupe::error::ExitCode;
use sizedupe::output::efu::SUMMARY_PREFIX;
use sizedupe::output::{EfuExporter, JsonOutput};
use sizedupe::scanner::Walker;
use std::fs::{self, File};
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn fixture() -> TempDir {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("one.txt"), "duplicate body").unwrap();
    fs::write(data.join("two.txt"), "duplicate body").unwrap();
    fs::write(data.join("three.txt"), "duplicate body").unwrap();
    fs::write(data.join("other.txt"), "something else entirely").unwrap();
    fs::write(dir.path().join("config.toml"), "").unwrap();
    dir
}

fn run(dir: &Path, extra: &[&str]) -> ExitCode {
    let config = dir.join("config.toml");
    let data = dir.join("data");
    let mut args = vec![
        "sizedupe",
        "-q",
        "--no-progress",
        "--config",
        config.to_str().unwrap(),
        data.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    sizedupe::run_app(Cli::parse_from(args)).unwrap()
}

#[test]
fn test_efu_export_rows() {
    let dir = fixture();
    let finder = DuplicateFinder::new(FinderConfig::default(), Box::new(Walker::new())).unwrap();
    let report = finder.find_duplicates(&[dir.path().join("data")]).unwrap();

    let out = dir.path().join("result.efu");
    EfuExporter::new(&report).write_file(&out).unwrap();

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("Filename,Size,Date Modified,Date Created,Attributes"));

    let rows = efu::read_rows(File::open(&out).unwrap()).unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows[..3].iter().all(|r| r.size == Some(14)));
    assert!(rows[..3].iter().all(|r| r.date_modified.is_some()));
    assert!(rows[3].filename.starts_with(SUMMARY_PREFIX));
    assert!(rows[3].filename.contains("Files:3"));
    assert_eq!(rows[3].size, Some(14));
    assert_eq!(rows[3].attributes, Some(0));
}

#[test]
fn test_json_export() {
    let dir = fixture();
    let finder = DuplicateFinder::new(FinderConfig::default(), Box::new(Walker::new())).unwrap();
    let report = finder.find_duplicates(&[dir.path().join("data")]).unwrap();

    let out = dir.path().join("result.json");
    JsonOutput::new(&report, ExitCode::Success)
        .write_file(&out)
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["precision"], "full-hash");
    assert_eq!(value["duplicates"].as_array().unwrap().len(), 1);
    assert_eq!(value["duplicates"][0]["files"].as_array().unwrap().len(), 3);
    assert_eq!(value["summary"]["duplicate_files"], 2);
    assert_eq!(value["summary"]["reclaimable_space"], 28);
}

#[test]
fn test_run_app_writes_efu() {
    let dir = fixture();
    let out = dir.path().join("report.efu");

    let code = run(dir.path(), &["-o", out.to_str().unwrap()]);

    assert_eq!(code, ExitCode::Success);
    let rows = efu::read_rows(File::open(&out).unwrap()).unwrap();
    assert_eq!(rows.len(), 4);
}

#[test]
fn test_run_app_writes_json() {
    let dir = fixture();
    let out = dir.path().join("report.json");

    let code = run(
        dir.path(),
        &["--format", "json", "-o", out.to_str().unwrap()],
    );

    assert_eq!(code, ExitCode::Success);
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["summary"]["exit_code_name"], "SD000");
}

#[test]
fn test_run_app_no_duplicates() {
    let dir = fixture();
    let out = dir.path().join("report.efu");

    let code = run(
        dir.path(),
        &["--min-size", "20", "-o", out.to_str().unwrap()],
    );

    assert_eq!(code, ExitCode::NoDuplicates);
    let rows = efu::read_rows(File::open(&out).unwrap()).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_run_app_export_failure_is_partial() {
    let dir = fixture();
    let out = dir.path().join("missing-dir").join("report.efu");

    let code = run(dir.path(), &["-o", out.to_str().unwrap()]);

    assert_eq!(code, ExitCode::PartialSuccess);
}

#[test]
fn test_run_app_viewer_failure_is_partial() {
    let dir = fixture();
    let out = dir.path().join("report.efu");

    let code = run(
        dir.path(),
        &[
            "-o",
            out.to_str().unwrap(),
            "--open",
            "--viewer",
            "sizedupe-no-such-viewer",
        ],
    );

    assert_eq!(code, ExitCode::PartialSuccess);
    assert!(out.is_file());
}

#[test]
fn test_run_app_missing_root_fails() {
    let dir = fixture();
    let config = dir.path().join("config.toml");
    let missing = dir.path().join("nowhere");
    let cli = Cli::parse_from([
        "sizedupe",
        "-q",
        "--no-progress",
        "--config",
        config.to_str().unwrap(),
        missing.to_str().unwrap(),
    ]);

    let err = sizedupe::run_app(cli).unwrap_err();

    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert_eq!(sizedupe::error::failed_stage(&err), Some("enumerate"));
}

#[test]
fn test_efu_paths_with_special_characters() {
    let dir = tempdir().unwrap();
    let names: &[&str] = if cfg!(windows) {
        &["comma, name.txt", "ünïcödé.txt"]
    } else {
        &["comma, name.txt", "file_with_\"quote\".txt", "ünïcödé.txt"]
    };
    for name in names {
        fs::write(dir.path().join(name), "special").unwrap();
    }

    let finder = DuplicateFinder::new(FinderConfig::default(), Box::new(Walker::new())).unwrap();
    let report = finder.find_duplicates(&[dir.path().to_path_buf()]).unwrap();
    let out = dir.path().join("special.efu");
    EfuExporter::new(&report).write_file(&out).unwrap();

    let rows = efu::read_rows(File::open(&out).unwrap()).unwrap();
    let written: Vec<String> = report.groups[0]
        .paths()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let read: Vec<String> = rows[..names.len()]
        .iter()
        .map(|r| r.filename.clone())
        .collect();
    assert_eq!(read, written);
}
