//! Configuration for chunkload.
//!
//! Configuration is YAML with environment variable interpolation. When no
//! file is given, the conventional environment variables (`indir`, `outdir`,
//! `logsdir`, `schemadir`, `mysql*`) fill the same structure directly, so a
//! plain `.env` file is enough to run.

mod vars;

pub use vars::{InterpolationResult, interpolate, load_env_file};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, CreateDirSnafu, ReadFileSnafu};

/// Filesystem locations shared by both pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory scanned for source CSV files.
    pub input_dir: PathBuf,
    /// Directory receiving chunk files; also the load source.
    pub output_dir: PathBuf,
    /// Directory receiving per-run log files.
    pub log_dir: PathBuf,
    /// Directory holding `{dataset}.json` schema documents.
    pub schema_dir: PathBuf,
}

/// MySQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

fn default_port() -> u16 {
    3306
}

/// Output format of a chunk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

/// Settings for the split pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    /// Extension (without dot) of input files to pick up.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Formats written for every chunk.
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
    /// Parallel file workers (default: available CPUs).
    #[serde(default)]
    pub workers: Option<usize>,
    /// Remove chunk files left by an earlier run before splitting.
    #[serde(default = "default_true")]
    pub clean_output: bool,
    /// Codec used when `parquet` is among the formats.
    #[serde(default)]
    pub parquet_compression: ParquetCompression,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            formats: default_formats(),
            workers: None,
            clean_output: true,
            parquet_compression: ParquetCompression::default(),
        }
    }
}

impl SplitConfig {
    /// Number of workers to run, never less than one.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Csv]
}

fn default_true() -> bool {
    true
}

/// Storage options appended to `CREATE TABLE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableOptions {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default = "default_collation")]
    pub collation: String,
    #[serde(default = "default_row_format")]
    pub row_format: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            charset: default_charset(),
            collation: default_collation(),
            row_format: default_row_format(),
        }
    }
}

fn default_engine() -> String {
    "InnoDB".to_string()
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_collation() -> String {
    "utf8mb4_unicode_ci".to_string()
}

fn default_row_format() -> String {
    "COMPRESSED".to_string()
}

/// Settings for the load pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    /// Refuse to load unless the split marker is present.
    #[serde(default = "default_true")]
    pub require_split_marker: bool,
    #[serde(default)]
    pub table_options: TableOptions,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            require_split_marker: true,
            table_options: TableOptions::default(),
        }
    }
}

/// Metrics export configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Prometheus text file written when the process exits.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

/// Main configuration for chunkload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file, or from the conventional environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("No config file given, reading settings from the environment");
                Self::from_env()
            }
        }
    }

    /// Build a configuration from the conventional variables, taking every value verbatim.
    ///
    /// Split and load settings keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        let mut var = |name: &str| {
            std::env::var(name).unwrap_or_else(|_| {
                errors.push(format!("environment variable '{name}' is not set"));
                String::new()
            })
        };
        let input_dir = var("indir");
        let output_dir = var("outdir");
        let log_dir = var("logsdir");
        let schema_dir = var("schemadir");
        let host = var("mysqlHost");
        let port = var("mysqlPort");
        let user = var("mysqlUsername");
        let password = var("mysqlPassword");
        let database = var("mysqlDatabase");
        if !errors.is_empty() {
            return Err(ConfigError::EnvInterpolation {
                message: errors.join("\n"),
            });
        }

        let port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: "database.port".to_string(),
            message: format!("'{port}' is not a valid port (from mysqlPort)"),
        })?;

        let config = Config {
            paths: PathsConfig {
                input_dir: input_dir.into(),
                output_dir: output_dir.into(),
                log_dir: log_dir.into(),
                schema_dir: schema_dir.into(),
            },
            database: DatabaseConfig {
                host,
                port,
                user,
                password,
                database,
            },
            split: SplitConfig::default(),
            load: LoadConfig::default(),
            metrics: MetricsConfig::default(),
        };
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let result = interpolate(contents);
        if !result.is_ok() {
            return Err(ConfigError::EnvInterpolation {
                message: result.errors.join("\n"),
            });
        }

        let config: Config =
            serde_yaml::from_str(&result.text).map_err(|source| ConfigError::YamlParse { source })?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let paths = [
            ("paths.input_dir", &self.paths.input_dir),
            ("paths.output_dir", &self.paths.output_dir),
            ("paths.log_dir", &self.paths.log_dir),
            ("paths.schema_dir", &self.paths.schema_dir),
        ];
        for (field, path) in paths {
            ensure!(
                !path.as_os_str().is_empty(),
                crate::error::EmptyPathSnafu { field }
            );
        }

        let strings = [
            ("database.host", &self.database.host),
            ("database.user", &self.database.user),
            ("database.database", &self.database.database),
            ("split.extension", &self.split.extension),
        ];
        for (field, value) in strings {
            ensure!(
                !value.trim().is_empty(),
                crate::error::InvalidValueSnafu {
                    field,
                    message: "must not be empty",
                }
            );
        }

        if self.split.extension.starts_with('.') {
            return Err(ConfigError::InvalidValue {
                field: "split.extension".to_string(),
                message: "give the extension without a leading dot".to_string(),
            });
        }
        if self.split.formats.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "split.formats".to_string(),
                message: "at least one output format is required".to_string(),
            });
        }
        if !self.split.formats.contains(&OutputFormat::Csv) {
            return Err(ConfigError::InvalidValue {
                field: "split.formats".to_string(),
                message: "must include csv; the load pipeline only imports csv chunks"
                    .to_string(),
            });
        }
        let options = &self.load.table_options;
        let table_options = [
            ("load.table_options.engine", &options.engine),
            ("load.table_options.charset", &options.charset),
            ("load.table_options.collation", &options.collation),
            ("load.table_options.row_format", &options.row_format),
        ];
        for (field, value) in table_options {
            ensure!(
                !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                crate::error::InvalidValueSnafu {
                    field,
                    message: "must be a bare word such as InnoDB or utf8mb4",
                }
            );
        }

        if self.split.clean_output && self.paths.input_dir == self.paths.output_dir {
            return Err(ConfigError::InvalidValue {
                field: "paths.output_dir".to_string(),
                message: "must differ from paths.input_dir when split.clean_output is on"
                    .to_string(),
            });
        }
        if self.split.workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "split.workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Create the output and log directories if they do not exist.
    pub fn prepare_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.paths.output_dir, &self.paths.log_dir] {
            std::fs::create_dir_all(dir).context(CreateDirSnafu { path: dir })?;
        }
        Ok(())
    }
}
