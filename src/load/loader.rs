//! Bulk import of chunk files.
//!
//! Every file of an [`ImportBatch`] is loaded with `LOAD DATA LOCAL INFILE`
//! inside one transaction. The header line is skipped and columns map by
//! position to the schema's column order.

use snafu::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use super::schema::SchemaDefinition;
use super::session::SqlSession;
use crate::emit;
use crate::error::{ListOutputSnafu, LoadError, ResolvePathSnafu};
use crate::metrics::events::{FileImported, FileStatus};

/// Files to import into one table, in import order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBatch {
    pub table: String,
    pub files: Vec<PathBuf>,
}

impl ImportBatch {
    /// Find files in `dir` whose name starts with `table` and ends with
    /// `.{extension}`.
    ///
    /// Files are ordered by chunk number (`{base}_{n}`), then by name, and
    /// returned as absolute paths.
    pub fn discover(dir: &Path, table: &str, extension: &str) -> Result<Self, LoadError> {
        let suffix = format!(".{extension}");
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir).context(ListOutputSnafu { path: dir })? {
            let entry = entry.context(ListOutputSnafu { path: dir })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(table) && name.ends_with(&suffix) && entry.path().is_file() {
                files.push(entry.path());
            }
        }

        files.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Self::from_files(table, files)
    }

    /// Build a batch from explicit paths, kept in the given order.
    pub fn from_files(table: &str, files: Vec<PathBuf>) -> Result<Self, LoadError> {
        let files = files
            .into_iter()
            .map(|path| std::fs::canonicalize(&path).context(ResolvePathSnafu { path }))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            table: table.to_string(),
            files,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// `(chunk number, file name)`; names without a numeric suffix sort last.
fn sort_key(path: &Path) -> (u64, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let number = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit_once('_'))
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(u64::MAX);
    (number, name)
}

/// Quote a path as a MySQL string literal.
fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let escaped = raw.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// `LOAD DATA` statement for one file.
pub fn load_statement(path: &Path, schema: &SchemaDefinition) -> String {
    let columns = schema.column_names().collect::<Vec<_>>().join(", ");
    format!(
        "LOAD DATA LOCAL INFILE {} INTO TABLE {} \
         FIELDS TERMINATED BY ',' OPTIONALLY ENCLOSED BY '\"' \
         LINES TERMINATED BY '\\n' IGNORE 1 LINES ({columns})",
        quote_path(path),
        schema.table
    )
}

/// Rows imported from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImport {
    pub path: PathBuf,
    pub rows: u64,
}

/// Outcome of a load run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub files: Vec<FileImport>,
    pub total_rows: u64,
}

/// Imports an [`ImportBatch`] into the schema's table.
pub struct BulkLoader<'a> {
    schema: &'a SchemaDefinition,
}

impl<'a> BulkLoader<'a> {
    pub fn new(schema: &'a SchemaDefinition) -> Self {
        Self { schema }
    }

    /// Import every file in one transaction.
    ///
    /// A file importing zero rows is a warning. A database error or a zero
    /// total rolls the transaction back.
    pub async fn import(
        &self,
        session: &mut dyn SqlSession,
        batch: &ImportBatch,
    ) -> Result<LoadReport, LoadError> {
        let table = &self.schema.table;
        let start = Instant::now();

        session.begin().await?;

        let mut files = Vec::with_capacity(batch.files.len());
        let mut total_rows = 0u64;

        for path in &batch.files {
            let file_start = Instant::now();
            let rows = match session.execute(&load_statement(path, self.schema)).await {
                Ok(rows) => rows,
                Err(e) => {
                    error!("Failed to import {}: {}", path.display(), e);
                    rollback(session, table).await;
                    return Err(e.into());
                }
            };

            let status = if rows == 0 {
                warn!("No rows imported from {}", path.display());
                FileStatus::Empty
            } else {
                info!(
                    "Imported {rows} rows from {} in {:.6} seconds",
                    path.display(),
                    file_start.elapsed().as_secs_f64()
                );
                FileStatus::Success
            };
            emit!(FileImported {
                table: table.clone(),
                rows,
                status,
            });

            total_rows += rows;
            files.push(FileImport {
                path: path.clone(),
                rows,
            });
        }

        if total_rows == 0 {
            error!(
                "No data imported into {table} from {} file(s)",
                batch.files.len()
            );
            rollback(session, table).await;
            return Err(LoadError::NoDataImported {
                table: table.clone(),
            });
        }

        session.commit().await?;
        info!(
            "Total rows imported into {table}: {total_rows} in {:.6} seconds",
            start.elapsed().as_secs_f64()
        );

        Ok(LoadReport {
            table: table.clone(),
            files,
            total_rows,
        })
    }
}

async fn rollback(session: &mut dyn SqlSession, table: &str) {
    match session.rollback().await {
        Ok(()) => info!("Rolled back import into {table}"),
        Err(e) => error!("Rollback of {table} failed: {e}"),
    }
}
