//! Per-file split work.
//!
//! Each input file is split on tokio's blocking pool inside its own
//! [`RunLog`] scope, so concurrent files write to separate log files.

use snafu::prelude::*;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::policy::chunk_size_for;
use super::{ChunkFailure, FileSummary};
use crate::emit;
use crate::error::{FileError, OpenRunLogSnafu, ReadInputSnafu, TaskJoinSnafu};
use crate::logging::RunLog;
use crate::metrics::events::{
    ChunkWriteCompleted, ChunkWriteFailed, ChunkWritten, FileStatus, InputFileProcessed,
    RowsSplit,
};
use crate::sink::ChunkWriterRef;
use crate::source::{ChunkSplitter, base_name};

/// Everything one file task needs.
#[derive(Clone)]
pub(super) struct SplitContext {
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub writers: Arc<[ChunkWriterRef]>,
    pub dry_run: bool,
}

/// What a finished file task reports.
pub(super) struct FileOutcome {
    pub summary: FileSummary,
    pub chunk_failures: Vec<ChunkFailure>,
}

/// Future type for file split operations.
pub(super) type SplitFuture =
    Pin<Box<dyn Future<Output = (PathBuf, Result<FileOutcome, FileError>)> + Send>>;

/// Spawn a blocking task that splits one input file.
pub(super) fn spawn_split_task(path: PathBuf, ctx: SplitContext) -> SplitFuture {
    Box::pin(async move {
        let task_path = path.clone();
        let joined = tokio::task::spawn_blocking(move || split_file(&task_path, &ctx)).await;
        let result = joined.context(TaskJoinSnafu).and_then(|r| r);
        (path, result)
    })
}

/// Split one file. In dry-run mode only the plan is computed and no files are created.
pub(super) fn split_file(path: &Path, ctx: &SplitContext) -> Result<FileOutcome, FileError> {
    if ctx.dry_run {
        return plan_file(path);
    }

    let log = RunLog::create(&ctx.log_dir, &format!("split_{}", base_name(path)))
        .context(OpenRunLogSnafu)?;

    log.in_scope(|| {
        let start = Instant::now();
        let result = write_chunks(path, ctx, log.path());
        let elapsed = start.elapsed();

        match &result {
            Ok(outcome) => {
                let status = if outcome.summary.total_rows == 0 {
                    FileStatus::Empty
                } else {
                    FileStatus::Success
                };
                info!("Total execution time: {:.6} seconds", elapsed.as_secs_f64());
                emit!(InputFileProcessed {
                    status,
                    duration: elapsed,
                });
            }
            Err(e) => {
                error!("Failed to split {}: {}", path.display(), e);
                emit!(InputFileProcessed {
                    status: FileStatus::Failed,
                    duration: elapsed,
                });
            }
        }
        result
    })
}

fn write_chunks(path: &Path, ctx: &SplitContext, log_path: &Path) -> Result<FileOutcome, FileError> {
    let start = Instant::now();
    info!("Processing file: {}", path.display());

    let splitter = ChunkSplitter::open(path).context(ReadInputSnafu)?;
    let total_rows = splitter.count_rows().context(ReadInputSnafu)?;
    let chunk_size = chunk_size_for(total_rows);
    info!("Rows: {total_rows} rows, chunk size: {chunk_size}");

    let mut chunks_written = 0;
    let mut chunk_failures = Vec::new();

    for chunk in splitter.chunks(chunk_size).context(ReadInputSnafu)? {
        let chunk = chunk.context(ReadInputSnafu)?;
        info!("[Batch {}]", chunk.number);

        let mut chunk_ok = true;
        for writer in ctx.writers.iter() {
            let write_start = Instant::now();
            let result = writer.write(&chunk, &ctx.output_dir);
            emit!(ChunkWriteCompleted {
                duration: write_start.elapsed(),
            });

            match result {
                Ok(written) => {
                    let name = written
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    info!("File name: {name}");
                    info!(
                        "Execution time: {:.6} seconds",
                        written.elapsed.as_secs_f64()
                    );
                    info!("Rows: {} rows", written.rows);
                    emit!(ChunkWritten {
                        rows: written.rows as u64,
                        bytes: written.bytes,
                        format: writer.format().extension(),
                    });
                }
                Err(e) => {
                    error!("Failed to write chunk {}: {}", chunk.stem(), e);
                    emit!(ChunkWriteFailed {
                        format: writer.format().extension(),
                    });
                    chunk_ok = false;
                    chunk_failures.push(ChunkFailure {
                        source_file: path.to_path_buf(),
                        number: chunk.number,
                        format: writer.format(),
                        error: e,
                    });
                }
            }
        }
        if chunk_ok {
            chunks_written += 1;
        }
    }

    emit!(RowsSplit {
        count: total_rows as u64,
    });

    Ok(FileOutcome {
        summary: FileSummary {
            source: path.to_path_buf(),
            base: splitter.base_name().to_string(),
            total_rows,
            chunk_size,
            chunks: total_rows.div_ceil(chunk_size),
            chunks_written,
            log_path: Some(log_path.to_path_buf()),
            elapsed: start.elapsed(),
        },
        chunk_failures,
    })
}

fn plan_file(path: &Path) -> Result<FileOutcome, FileError> {
    let splitter = ChunkSplitter::open(path).context(ReadInputSnafu)?;
    let total_rows = splitter.count_rows().context(ReadInputSnafu)?;
    let chunk_size = chunk_size_for(total_rows);
    let chunks = total_rows.div_ceil(chunk_size);

    info!(
        "[dry-run] {}: {total_rows} rows, chunk size {chunk_size}, {chunks} chunk(s)",
        path.display()
    );

    Ok(FileOutcome {
        summary: FileSummary {
            source: path.to_path_buf(),
            base: splitter.base_name().to_string(),
            total_rows,
            chunk_size,
            chunks,
            chunks_written: 0,
            log_path: None,
            elapsed: Duration::ZERO,
        },
        chunk_failures: Vec::new(),
    })
}
