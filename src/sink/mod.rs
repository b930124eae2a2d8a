//! Chunk output.
//!
//! A [`ChunkWriter`] persists one chunk as `{base}_{number}.{ext}` in a
//! destination directory. One writer exists per configured output format.

pub mod csv;
pub mod parquet;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{OutputFormat, SplitConfig};
use crate::error::WriterError;
use crate::source::Chunk;

pub use self::csv::CsvChunkWriter;
pub use self::parquet::ParquetChunkWriter;

/// A chunk persisted to disk.
#[derive(Debug, Clone)]
pub struct WrittenChunk {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Writes chunks in one output format.
pub trait ChunkWriter: Send + Sync {
    /// The format this writer produces.
    fn format(&self) -> OutputFormat;

    /// Write `chunk` into `dir`, returning where it went and how long it took.
    fn write(&self, chunk: &Chunk, dir: &Path) -> Result<WrittenChunk, WriterError>;
}

/// Shared handle to a chunk writer.
pub type ChunkWriterRef = Arc<dyn ChunkWriter>;

/// Output file name for a chunk in the given format.
pub fn chunk_file_name(base: &str, number: usize, format: OutputFormat) -> String {
    format!("{base}_{number}.{}", format.extension())
}

/// Build one writer per configured output format.
pub fn writers_for(config: &SplitConfig) -> Vec<ChunkWriterRef> {
    config
        .formats
        .iter()
        .map(|format| -> ChunkWriterRef {
            match format {
                OutputFormat::Csv => Arc::new(CsvChunkWriter::new()),
                OutputFormat::Parquet => {
                    Arc::new(ParquetChunkWriter::new(config.parquet_compression))
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_file_name() {
        assert_eq!(
            chunk_file_name("accident", 2, OutputFormat::Csv),
            "accident_2.csv"
        );
        assert_eq!(
            chunk_file_name("accident", 10, OutputFormat::Parquet),
            "accident_10.parquet"
        );
    }

    #[test]
    fn test_writers_follow_configured_formats() {
        let config = SplitConfig {
            formats: vec![OutputFormat::Parquet, OutputFormat::Csv],
            ..SplitConfig::default()
        };
        let formats: Vec<_> = writers_for(&config).iter().map(|w| w.format()).collect();
        assert_eq!(formats, vec![OutputFormat::Parquet, OutputFormat::Csv]);
    }
}
