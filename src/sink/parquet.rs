//! Parquet chunk writer.
//!
//! Writes each chunk as a single-row-group Parquet file with the
//! configured compression codec.

use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use snafu::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

use super::{ChunkWriter, WrittenChunk, chunk_file_name};
use crate::config::{OutputFormat, ParquetCompression};
use crate::error::{CreateOutputSnafu, FlushOutputSnafu, ParquetEncodeSnafu, WriterError};
use crate::source::Chunk;

/// Writes each chunk as a Parquet file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetChunkWriter {
    compression: ParquetCompression,
}

impl ParquetChunkWriter {
    pub fn new(compression: ParquetCompression) -> Self {
        Self { compression }
    }

    fn writer_properties(&self) -> WriterProperties {
        let mut builder = WriterProperties::builder();

        builder = builder.set_compression(match self.compression {
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Lz4 => Compression::LZ4,
        });

        builder.build()
    }
}

impl ChunkWriter for ParquetChunkWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Parquet
    }

    fn write(&self, chunk: &Chunk, dir: &Path) -> Result<WrittenChunk, WriterError> {
        let start = Instant::now();
        let path = dir.join(chunk_file_name(
            &chunk.base,
            chunk.number,
            OutputFormat::Parquet,
        ));

        let file = File::create(&path).context(CreateOutputSnafu { path: &path })?;
        let mut writer = ArrowWriter::try_new(
            file,
            chunk.batch.schema(),
            Some(self.writer_properties()),
        )
        .context(ParquetEncodeSnafu { path: &path })?;

        writer
            .write(&chunk.batch)
            .context(ParquetEncodeSnafu { path: &path })?;
        writer.close().context(ParquetEncodeSnafu { path: &path })?;

        let bytes = std::fs::metadata(&path)
            .context(FlushOutputSnafu { path: &path })?
            .len();

        Ok(WrittenChunk {
            path,
            rows: chunk.rows(),
            bytes,
            elapsed: start.elapsed(),
        })
    }
}
