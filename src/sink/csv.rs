//! CSV chunk writer.

use arrow::csv::WriterBuilder;
use snafu::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use super::{ChunkWriter, WrittenChunk, chunk_file_name};
use crate::config::OutputFormat;
use crate::error::{CreateOutputSnafu, CsvEncodeSnafu, FlushOutputSnafu, WriterError};
use crate::source::Chunk;

/// Writes each chunk as a CSV file with a header row.
#[derive(Debug, Clone, Default)]
pub struct CsvChunkWriter;

impl CsvChunkWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ChunkWriter for CsvChunkWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn write(&self, chunk: &Chunk, dir: &Path) -> Result<WrittenChunk, WriterError> {
        let start = Instant::now();
        let path = dir.join(chunk_file_name(&chunk.base, chunk.number, OutputFormat::Csv));

        let file = File::create(&path).context(CreateOutputSnafu { path: &path })?;
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .build(BufWriter::new(file));
        writer
            .write(&chunk.batch)
            .context(CsvEncodeSnafu { path: &path })?;

        let mut out = writer.into_inner();
        out.flush().context(FlushOutputSnafu { path: &path })?;
        let bytes = out
            .get_ref()
            .metadata()
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
