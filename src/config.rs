//! Layered application configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file: `--config PATH`, or `config.toml` in the platform config
//!    directory when present
//! 3. Environment variables prefixed with `SIZEDUPE_` (e.g.
//!    `SIZEDUPE_WORKER_COUNT=8`)
//! 4. Command-line flags
//!
//! ```toml
//! precision = "small-hash"
//! filename_must_equal = true
//! min_size = 4096
//! worker_count = 8
//! backend = "index"
//! index_command = ["es", "-export-efu", "-"]
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::{BackendKind, Cli, ExportFormat};
use crate::duplicates::{MetaOptions, Precision};
use crate::scanner::{HashAlgorithm, Hasher, PREFIX_SIZE};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SIZEDUPE_";

/// Errors from loading or validating the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or had the wrong types.
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// Worker count must be positive.
    #[error("worker_count must be at least 1")]
    InvalidWorkerCount,

    /// Prefix size must be positive.
    #[error("prefix_size must be at least 1")]
    InvalidPrefixSize,

    /// `min_size` is larger than `max_size`.
    #[error("min_size ({min}) is larger than max_size ({max})")]
    InvalidSizeRange {
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
    },

    /// The index backend was selected without a list or command.
    #[error("The index backend needs index_list or index_command")]
    MissingIndexSource,

    /// The configuration could not be rendered as TOML.
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stage-0 key includes the file name
    pub filename_must_equal: bool,
    /// Stage-0 key includes the modification time
    pub modified_date_must_equal: bool,
    /// How far the pipeline advances
    pub precision: Precision,
    /// Smallest file size considered, in bytes
    pub min_size: Option<u64>,
    /// Largest file size considered, in bytes
    pub max_size: Option<u64>,
    /// Hashing threads
    pub worker_count: usize,
    /// Leading bytes hashed in the prefix stage
    pub prefix_size: usize,
    /// Prefix-stage algorithm
    pub prefix_algorithm: HashAlgorithm,
    /// Full-stage algorithm
    pub full_algorithm: HashAlgorithm,
    /// Enumeration backend
    pub backend: BackendKind,
    /// EFU file list for the index backend
    pub index_list: Option<PathBuf>,
    /// Command printing an EFU list for the index backend; roots are appended
    pub index_command: Vec<String>,
    /// Report destination
    pub output: Option<PathBuf>,
    /// Report format
    pub format: ExportFormat,
    /// Open the report after writing it
    pub open_viewer: bool,
    /// Viewer program, instead of the platform opener
    pub viewer: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filename_must_equal: false,
            modified_date_must_equal: false,
            precision: Precision::FullHash,
            min_size: None,
            max_size: None,
            worker_count: 4,
            prefix_size: PREFIX_SIZE,
            prefix_algorithm: HashAlgorithm::Xxh3,
            full_algorithm: HashAlgorithm::Blake3,
            backend: BackendKind::Walk,
            index_list: None,
            index_command: Vec::new(),
            output: None,
            format: ExportFormat::Efu,
            open_viewer: false,
            viewer: None,
        }
    }
}

impl Config {
    /// Platform config file path (`.../sizedupe/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "sizedupe", "sizedupe")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults merged with a TOML file.
    ///
    /// With `file = None`, the platform config file is used if it exists.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        match file.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => {
                log::debug!("Reading config file {}", path.display());
                figment.merge(Toml::file(path))
            }
            None => figment,
        }
    }

    /// Load defaults, the config file and `SIZEDUPE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit file is missing, a source
    /// cannot be parsed, or the result is invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = file {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }

        let config: Config = Self::figment(file)
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Load every layer and apply the command line on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if loading fails or the merged result is invalid.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Override fields with flags given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        self.filename_must_equal |= cli.filename_must_equal;
        self.modified_date_must_equal |= cli.modified_date_must_equal;
        self.open_viewer |= cli.open;

        if let Some(precision) = cli.precision {
            self.precision = precision;
        }
        if cli.min_size.is_some() {
            self.min_size = cli.min_size;
        }
        if cli.max_size.is_some() {
            self.max_size = cli.max_size;
        }
        if let Some(workers) = cli.workers {
            self.worker_count = usize::from(workers);
        }
        if let Some(algorithm) = cli.prefix_algorithm {
            self.prefix_algorithm = algorithm;
        }
        if let Some(algorithm) = cli.full_algorithm {
            self.full_algorithm = algorithm;
        }
        if let Some(backend) = cli.backend {
            self.backend = backend;
        }
        if cli.index_list.is_some() {
            self.index_list.clone_from(&cli.index_list);
        }
        if cli.output.is_some() {
            self.output.clone_from(&cli.output);
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if cli.viewer.is_some() {
            self.viewer.clone_from(&cli.viewer);
        }
    }

    /// Check value ranges and required combinations.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if self.prefix_size == 0 {
            return Err(ConfigError::InvalidPrefixSize);
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(ConfigError::InvalidSizeRange { min, max });
            }
        }
        if self.backend == BackendKind::Index
            && self.index_list.is_none()
            && self.index_command.is_empty()
        {
            return Err(ConfigError::MissingIndexSource);
        }
        Ok(())
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Stage-0 key options and size range.
    #[must_use]
    pub fn meta_options(&self) -> MetaOptions {
        MetaOptions {
            filename_must_equal: self.filename_must_equal,
            modified_date_must_equal: self.modified_date_must_equal,
            min_size: self.min_size,
            max_size: self.max_size,
        }
    }

    /// Hasher built from the algorithm and prefix settings.
    #[must_use]
    pub fn hasher(&self) -> Hasher {
        Hasher::new()
            .with_prefix_algorithm(self.prefix_algorithm)
            .with_full_algorithm(self.full_algorithm)
            .with_prefix_len(self.prefix_size)
    }
}
