//! Error types for chunkload using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase. Variant names are unique across
//! enums so the generated selectors do not collide.

use std::path::PathBuf;

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to load the `.env` file.
    #[snafu(display("Failed to load env file {}: {source}", path.display()))]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required path setting is empty.
    #[snafu(display("Configuration field '{field}' cannot be empty"))]
    EmptyPath { field: String },

    /// A setting has an unusable value.
    #[snafu(display("Invalid value for '{field}': {message}"))]
    InvalidValue { field: String, message: String },

    /// Failed to create a configured directory.
    #[snafu(display("Failed to create directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Reader Errors ============

/// Errors that can occur while scanning and splitting an input CSV file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// Failed to open the input file.
    #[snafu(display("Failed to open input {}: {source}", path.display()))]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input has no header line.
    #[snafu(display("Input {} is empty (no header row)", path.display()))]
    EmptyInput { path: PathBuf },

    /// Failed to read the header row.
    #[snafu(display("Failed to read header of {}: {source}", path.display()))]
    HeaderParse {
        path: PathBuf,
        source: arrow::error::ArrowError,
    },

    /// A row could not be decoded (e.g. wrong number of fields).
    #[snafu(display("Failed to decode CSV in {}: {source}", path.display()))]
    CsvDecode {
        path: PathBuf,
        source: arrow::error::ArrowError,
    },
}

// ============ Writer Errors ============

/// Errors that can occur while writing a chunk to an output file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriterError {
    /// Failed to create the output file.
    #[snafu(display("Failed to create output {}: {source}", path.display()))]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to encode rows as CSV.
    #[snafu(display("Failed to write CSV {}: {source}", path.display()))]
    CsvEncode {
        path: PathBuf,
        source: arrow::error::ArrowError,
    },

    /// Failed to encode rows as Parquet.
    #[snafu(display("Failed to write Parquet {}: {source}", path.display()))]
    ParquetEncode {
        path: PathBuf,
        source: parquet::errors::ParquetError,
    },

    /// Failed to flush or stat the output file.
    #[snafu(display("Failed to flush output {}: {source}", path.display()))]
    FlushOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Log Errors ============

/// Errors that can occur while opening a run log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LogError {
    /// Failed to create the log file.
    #[snafu(display("Failed to create log file {}: {source}", path.display()))]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Split Errors ============

/// Errors isolated to a single input file during a split run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FileError {
    /// Reading or parsing the input failed.
    #[snafu(display("{source}"))]
    ReadInput { source: ReaderError },

    /// The per-file run log could not be opened.
    #[snafu(display("{source}"))]
    OpenRunLog { source: LogError },

    /// The worker task panicked or was cancelled.
    #[snafu(display("Split task failed: {source}"))]
    TaskJoin { source: tokio::task::JoinError },
}

/// Run-level errors for the split pipeline.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SplitError {
    /// Failed to list the input directory.
    #[snafu(display("Failed to list input directory {}: {source}", path.display()))]
    ListInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to remove stale output files.
    #[snafu(display("Failed to clean output {}: {source}", path.display()))]
    CleanOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write or remove the completion marker.
    #[snafu(display("Failed to update split marker {}: {source}", path.display()))]
    WriteManifest {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize the completion marker.
    #[snafu(display("Failed to serialize split marker: {source}"))]
    EncodeManifest { source: serde_json::Error },

    /// One or more files or chunks failed.
    #[snafu(display("{files} file(s) and {chunks} chunk(s) failed during split"))]
    FilesFailed { files: usize, chunks: usize },
}

// ============ Schema Errors ============

/// Errors that can occur while loading a schema document.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    /// Schema document does not exist.
    #[snafu(display("Schema not found: {}", path.display()))]
    SchemaNotFound { path: PathBuf },

    /// Schema document exists but could not be read.
    #[snafu(display("Failed to read schema {}: {source}", path.display()))]
    SchemaRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Schema document is not a usable mapping.
    #[snafu(display("Malformed schema {}: {message}", path.display()))]
    SchemaMalformed { path: PathBuf, message: String },

    /// Table or column name is not a plain SQL identifier.
    #[snafu(display("Invalid identifier '{name}'"))]
    InvalidIdentifier { name: String },

    /// Column type is not a recognised SQL type expression.
    #[snafu(display("Invalid type '{column_type}' for column '{column}'"))]
    InvalidColumnType { column: String, column_type: String },
}

// ============ Database Errors ============

/// Errors reported by a database session.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    /// Failed to connect to the server.
    #[snafu(display("Failed to connect to {target}: {source}"))]
    Connect {
        target: String,
        source: mysql_async::Error,
    },

    /// The server rejected a statement.
    #[snafu(display("Server error {code}: {message}"))]
    Server { code: u16, message: String },

    /// Driver or I/O level failure.
    #[snafu(display("Database driver error: {source}"))]
    Driver { source: mysql_async::Error },
}

impl From<mysql_async::Error> for DatabaseError {
    fn from(source: mysql_async::Error) -> Self {
        match source {
            mysql_async::Error::Server(err) => DatabaseError::Server {
                code: err.code,
                message: err.message,
            },
            other => DatabaseError::Driver { source: other },
        }
    }
}

// ============ Load Errors ============

/// Errors that can occur during a load run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoadError {
    /// Schema could not be loaded.
    #[snafu(display("Schema error: {source}"))]
    Schema { source: SchemaError },

    /// Database operation failed.
    #[snafu(display("Database error: {source}"))]
    Database { source: DatabaseError },

    /// Truncate or import attempted before the table was recreated.
    #[snafu(display("Table '{table}' has not been recreated in this run"))]
    TableNotReady { table: String },

    /// The run imported zero rows across all files.
    #[snafu(display("No data was imported into '{table}'"))]
    NoDataImported { table: String },

    /// The split pipeline has not completed for the output directory.
    #[snafu(display("Split marker missing: {}", path.display()))]
    MissingSplitMarker { path: PathBuf },

    /// The split marker exists but cannot be parsed.
    #[snafu(display("Invalid split marker {}: {source}", path.display()))]
    InvalidSplitMarker {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to list the output directory.
    #[snafu(display("Failed to list output directory {}: {source}", path.display()))]
    ListOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to resolve an import file to an absolute path.
    #[snafu(display("Failed to resolve {}: {source}", path.display()))]
    ResolvePath {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The load run log could not be opened.
    #[snafu(display("{source}"))]
    LoadLog { source: LogError },
}

impl From<DatabaseError> for LoadError {
    fn from(source: DatabaseError) -> Self {
        LoadError::Database { source }
    }
}

impl From<SchemaError> for LoadError {
    fn from(source: SchemaError) -> Self {
        LoadError::Schema { source }
    }
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization and export.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder: {source}"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Failed to write the metrics textfile.
    #[snafu(display("Failed to write metrics to {}: {source}", path.display()))]
    WriteTextfile {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Split pipeline error.
    #[snafu(display("Split error: {source}"))]
    Split { source: SplitError },

    /// Load pipeline error.
    #[snafu(display("Load error: {source}"))]
    Load { source: LoadError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<SplitError> for PipelineError {
    fn from(source: SplitError) -> Self {
        PipelineError::Split { source }
    }
}

impl From<LoadError> for PipelineError {
    fn from(source: LoadError) -> Self {
        PipelineError::Load { source }
    }
}

impl From<MetricsError> for PipelineError {
    fn from(source: MetricsError) -> Self {
        PipelineError::Metrics { source }
    }
}
