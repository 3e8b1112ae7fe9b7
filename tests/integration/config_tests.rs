use clap::Parser;
use figment::providers::{Env, Serialized};
use figment::Figment;
use sizedupe::cli::{BackendKind, Cli, ExportFormat};
use sizedupe::config::{Config, ConfigError};
use sizedupe::duplicates::Precision;
use sizedupe::scanner::HashAlgorithm;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.precision, Precision::FullHash);
    assert_eq!(config.worker_count, 4);
    assert_eq!(config.backend, BackendKind::Walk);
    assert_eq!(config.format, ExportFormat::Efu);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("SIZEDUPE_IT_WORKER_COUNT", "16");
    std::env::set_var("SIZEDUPE_IT_PRECISION", "none");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("SIZEDUPE_IT_"));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.worker_count, 16);
    assert_eq!(config.precision, Precision::Metadata);

    std::env::remove_var("SIZEDUPE_IT_WORKER_COUNT");
    std::env::remove_var("SIZEDUPE_IT_PRECISION");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
precision = "small-hash"
filename_must_equal = true
min_size = 4096
worker_count = 2
prefix_algorithm = "blake3"
full_algorithm = "sha256"
format = "json"
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::load(Some(&config_path)).unwrap();

    assert_eq!(config.precision, Precision::SmallHash);
    assert!(config.filename_must_equal);
    assert_eq!(config.min_size, Some(4096));
    assert_eq!(config.worker_count, 2);
    assert_eq!(config.prefix_algorithm, HashAlgorithm::Blake3);
    assert_eq!(config.full_algorithm, HashAlgorithm::Sha256);
    assert_eq!(config.format, ExportFormat::Json);
    // Untouched fields keep their defaults
    assert_eq!(config.backend, BackendKind::Walk);
}

#[test]
fn test_cli_overrides_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "worker_count = 2\nprecision = \"small-hash\"\n").unwrap();

    let cli = Cli::parse_from([
        "sizedupe",
        "--config",
        config_path.to_str().unwrap(),
        "-j",
        "6",
        "--max-size",
        "1MiB",
        "/tmp",
    ]);
    let config = Config::resolve(&cli).unwrap();

    assert_eq!(config.worker_count, 6);
    assert_eq!(config.precision, Precision::SmallHash);
    assert_eq!(config.max_size, Some(1024 * 1024));
}

#[test]
fn test_invalid_toml_values() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(&config_path, "worker_count = 0\n").unwrap();
    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::InvalidWorkerCount)
    ));

    fs::write(&config_path, "min_size = 10\nmax_size = 5\n").unwrap();
    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::InvalidSizeRange { min: 10, max: 5 })
    ));

    fs::write(&config_path, "backend = \"index\"\n").unwrap();
    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::MissingIndexSource)
    ));

    fs::write(&config_path, "precision = \"sometimes\"\n").unwrap();
    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::Extract(_))
    ));
}

#[test]
fn test_index_command_from_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "backend = \"index\"\nindex_command = [\"es\", \"-export-efu\", \"-\"]\n",
    )
    .unwrap();

    let config = Config::load(Some(&config_path)).unwrap();

    assert_eq!(config.backend, BackendKind::Index);
    assert_eq!(config.index_command, vec!["es", "-export-efu", "-"]);
}

#[test]
fn test_dump_config_round_trips() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let mut config = Config::default();
    config.precision = Precision::Metadata;
    config.viewer = Some("everything".to_string());

    fs::write(&config_path, config.to_toml().unwrap()).unwrap();
    let loaded = Config::load(Some(&config_path)).unwrap();

    assert_eq!(loaded, config);
}
