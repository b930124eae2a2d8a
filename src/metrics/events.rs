//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in a run. Events
//! implement the `InternalEvent` trait which records the corresponding
//! counter or histogram.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Outcome of a unit of work (an input file or an import file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Success,
    Empty,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Success => "success",
            FileStatus::Empty => "empty",
            FileStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a chunk file has been written.
pub struct ChunkWritten {
    pub rows: u64,
    pub bytes: u64,
    pub format: &'static str,
}

impl InternalEvent for ChunkWritten {
    fn emit(self) {
        trace!(rows = self.rows, bytes = self.bytes, format = self.format, "Chunk written");
        counter!("chunkload_chunks_written_total", "format" => self.format).increment(1);
        counter!("chunkload_chunk_bytes_written_total", "format" => self.format)
            .increment(self.bytes);
    }
}

/// Event emitted when a chunk write fails.
pub struct ChunkWriteFailed {
    pub format: &'static str,
}

impl InternalEvent for ChunkWriteFailed {
    fn emit(self) {
        trace!(format = self.format, "Chunk write failed");
        counter!("chunkload_chunk_write_failures_total", "format" => self.format).increment(1);
    }
}

/// Event emitted when a chunk write completes, successful or not.
pub struct ChunkWriteCompleted {
    pub duration: Duration,
}

impl InternalEvent for ChunkWriteCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Chunk write completed"
        );
        histogram!("chunkload_chunk_write_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when rows have been read from an input file.
pub struct RowsSplit {
    pub count: u64,
}

impl InternalEvent for RowsSplit {
    fn emit(self) {
        trace!(count = self.count, "Rows split");
        counter!("chunkload_rows_split_total").increment(self.count);
    }
}

/// Event emitted when an input file has been processed.
pub struct InputFileProcessed {
    pub status: FileStatus,
    pub duration: Duration,
}

impl InternalEvent for InputFileProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Input file processed");
        counter!("chunkload_input_files_total", "status" => self.status.as_str()).increment(1);
        histogram!("chunkload_input_file_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when an import file has been loaded.
pub struct FileImported {
    pub table: String,
    pub rows: u64,
    pub status: FileStatus,
}

impl InternalEvent for FileImported {
    fn emit(self) {
        trace!(table = %self.table, rows = self.rows, "File imported");
        counter!(
            "chunkload_import_files_total",
            "table" => self.table.clone(),
            "status" => self.status.as_str()
        )
        .increment(1);
        counter!("chunkload_rows_imported_total", "table" => self.table).increment(self.rows);
    }
}

/// Event emitted when a load run finishes.
pub struct LoadCompleted {
    pub table: String,
    pub duration: Duration,
    pub success: bool,
}

impl InternalEvent for LoadCompleted {
    fn emit(self) {
        let status = if self.success { "success" } else { "failed" };
        trace!(table = %self.table, status, "Load completed");
        counter!("chunkload_load_runs_total", "table" => self.table.clone(), "status" => status)
            .increment(1);
        histogram!("chunkload_load_duration_seconds", "table" => self.table)
            .record(self.duration.as_secs_f64());
    }
}
