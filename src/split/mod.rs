//! Split pipeline.
//!
//! Lists the input directory and splits every matching file into
//! size-tiered chunks, one blocking task per file with at most
//! `split.workers` files in flight. Failures are isolated to the file or
//! chunk they happen in and collected into the [`SplitReport`]. The
//! completion marker is written only when nothing failed.

pub mod manifest;
pub mod policy;
mod task;

use futures::stream::{FuturesUnordered, StreamExt};
use snafu::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{OutputFormat, PathsConfig, SplitConfig};
use crate::error::{CleanOutputSnafu, FileError, ListInputSnafu, SplitError, WriterError};
use crate::sink::{ChunkWriterRef, writers_for};
use crate::source::list_input_files;

pub use manifest::{MARKER_FILE, ManifestEntry, SplitManifest};
pub use policy::chunk_size_for;

use task::{SplitContext, SplitFuture, spawn_split_task};

/// Result of splitting one input file.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub source: PathBuf,
    pub base: String,
    pub total_rows: usize,
    pub chunk_size: usize,
    /// Chunks the file divides into.
    pub chunks: usize,
    /// Chunks written in every configured format.
    pub chunks_written: usize,
    /// Per-file log, absent in dry-run mode.
    pub log_path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// A chunk that could not be written in one format.
#[derive(Debug)]
pub struct ChunkFailure {
    pub source_file: PathBuf,
    pub number: usize,
    pub format: OutputFormat,
    pub error: WriterError,
}

/// An input file that could not be split.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: FileError,
}

/// Outcome of a split run.
#[derive(Debug, Default)]
pub struct SplitReport {
    pub files: Vec<FileSummary>,
    pub file_failures: Vec<FileFailure>,
    pub chunk_failures: Vec<ChunkFailure>,
    pub marker: Option<PathBuf>,
}

impl SplitReport {
    /// True when every file and chunk succeeded.
    pub fn is_success(&self) -> bool {
        self.file_failures.is_empty() && self.chunk_failures.is_empty()
    }

    /// Rows read across all successfully split files.
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.total_rows).sum()
    }

    /// Turn collected failures into an error.
    pub fn into_result(self) -> Result<Self, SplitError> {
        ensure!(
            self.is_success(),
            crate::error::FilesFailedSnafu {
                files: self.file_failures.len(),
                chunks: self.chunk_failures.len(),
            }
        );
        Ok(self)
    }
}

/// Splits every input file into chunk files.
pub struct SplitPipeline {
    input_dir: PathBuf,
    output_dir: PathBuf,
    log_dir: PathBuf,
    extension: String,
    clean_output: bool,
    workers: usize,
    writers: Arc<[ChunkWriterRef]>,
}

impl SplitPipeline {
    pub fn new(paths: &PathsConfig, split: &SplitConfig) -> Self {
        Self {
            input_dir: paths.input_dir.clone(),
            output_dir: paths.output_dir.clone(),
            log_dir: paths.log_dir.clone(),
            extension: split.extension.clone(),
            clean_output: split.clean_output,
            workers: split.worker_count(),
            writers: writers_for(split).into(),
        }
    }

    /// Replace the chunk writers.
    pub fn with_writers(mut self, writers: Vec<ChunkWriterRef>) -> Self {
        self.writers = writers.into();
        self
    }

    /// Run the split over the whole input directory.
    ///
    /// Returns `Err` only for run-level problems (listing, cleanup, marker).
    /// Per-file and per-chunk failures are in the report.
    pub async fn run(&self, dry_run: bool) -> Result<SplitReport, SplitError> {
        let start = Instant::now();

        if !dry_run {
            if SplitManifest::remove(&self.output_dir)? {
                debug!("Removed previous split marker");
            }
            if self.clean_output {
                let removed = clean_stale_outputs(&self.output_dir)?;
                if removed > 0 {
                    info!(
                        "Removed {} stale chunk file(s) from {}",
                        removed,
                        self.output_dir.display()
                    );
                }
            }
        }

        let files =
            list_input_files(&self.input_dir, &self.extension).context(ListInputSnafu {
                path: &self.input_dir,
            })?;
        if files.is_empty() {
            warn!(
                "No *.{} files found in {}",
                self.extension,
                self.input_dir.display()
            );
        } else {
            info!(
                "Splitting {} file(s) with {} worker(s)",
                files.len(),
                self.workers
            );
        }

        let ctx = SplitContext {
            output_dir: self.output_dir.clone(),
            log_dir: self.log_dir.clone(),
            writers: Arc::clone(&self.writers),
            dry_run,
        };

        let mut report = SplitReport::default();
        let mut pending = files.into_iter();
        let mut in_flight: FuturesUnordered<SplitFuture> = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.workers
                && let Some(path) = pending.next()
            {
                in_flight.push(spawn_split_task(path, ctx.clone()));
            }

            let Some((path, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(outcome) => {
                    debug!(
                        file = %path.display(),
                        rows = outcome.summary.total_rows,
                        chunks = outcome.summary.chunks_written,
                        "File split"
                    );
                    report.files.push(outcome.summary);
                    report.chunk_failures.extend(outcome.chunk_failures);
                }
                Err(error) => {
                    error!("Skipping {}: {}", path.display(), error);
                    report.file_failures.push(FileFailure { path, error });
                }
            }
        }

        // Completion order is arbitrary; report in input order.
        report.files.sort_by(|a, b| a.source.cmp(&b.source));

        if !dry_run && report.is_success() {
            let entries = report
                .files
                .iter()
                .map(|f| ManifestEntry {
                    source: f.source.clone(),
                    base: f.base.clone(),
                    rows: f.total_rows,
                    chunk_size: f.chunk_size,
                    chunks: f.chunks_written,
                })
                .collect();
            report.marker = Some(SplitManifest::new(entries).write(&self.output_dir)?);
        }

        info!(
            "Split finished in {:.6} seconds: {} file(s), {} rows, {} failed file(s), {} failed chunk(s)",
            start.elapsed().as_secs_f64(),
            report.files.len(),
            report.total_rows(),
            report.file_failures.len(),
            report.chunk_failures.len()
        );

        Ok(report)
    }
}

/// Delete chunk outputs (`*.csv`, `*.parquet`) left in `output_dir`.
pub fn clean_stale_outputs(output_dir: &Path) -> Result<usize, SplitError> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(SplitError::CleanOutput {
                path: output_dir.to_path_buf(),
                source,
            });
        }
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry.context(CleanOutputSnafu { path: output_dir })?.path();
        let is_chunk = path.extension().and_then(|e| e.to_str()).is_some_and(|ext| {
            [OutputFormat::Csv, OutputFormat::Parquet]
                .iter()
                .any(|f| f.extension() == ext)
        });
        if is_chunk && path.is_file() {
            fs::remove_file(&path).context(CleanOutputSnafu { path: &path })?;
            removed += 1;
        }
    }
    Ok(removed)
}
