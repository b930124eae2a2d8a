//! CSV chunk reader.
//!
//! Reads a CSV file with a header row and yields its rows as Arrow
//! RecordBatches of at most `chunk_size` rows. Every column is read as
//! nullable UTF-8 so cell text survives the split unchanged.

use arrow::array::RecordBatch;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use snafu::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{
    CsvDecodeSnafu, EmptyInputSnafu, HeaderParseSnafu, OpenInputSnafu, ReaderError,
};
use crate::source::scanner::base_name;

/// Batch size used for the row counting pass.
const COUNT_BATCH_SIZE: usize = 64 * 1024;

/// A contiguous run of rows from one input file.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Base name of the parent input file.
    pub base: String,
    /// 1-based position of this chunk within its file.
    pub number: usize,
    /// The rows.
    pub batch: RecordBatch,
}

impl Chunk {
    /// Number of rows in the chunk.
    pub fn rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// `{base}_{number}`, the stem shared by every output of this chunk.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.base, self.number)
    }
}

/// Splits one CSV input file into chunks.
///
/// The header is read once on open. Each call to [`ChunkSplitter::chunks`]
/// reopens the file, so the sequence can be replayed from the start.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    path: PathBuf,
    base: String,
    schema: SchemaRef,
}

impl ChunkSplitter {
    /// Open an input file and read its header.
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let file = File::open(path).context(OpenInputSnafu { path })?;
        let len = file.metadata().context(OpenInputSnafu { path })?.len();
        ensure!(len > 0, EmptyInputSnafu { path });

        let (inferred, _) = Format::default()
            .with_header(true)
            .infer_schema(file, Some(0))
            .context(HeaderParseSnafu { path })?;

        ensure!(!inferred.fields().is_empty(), EmptyInputSnafu { path });

        let fields: Vec<Field> = inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect();

        debug!(
            path = %path.display(),
            columns = fields.len(),
            "Read CSV header"
        );

        Ok(Self {
            path: path.to_path_buf(),
            base: base_name(path),
            schema: Arc::new(Schema::new(fields)),
        })
    }

    /// Path of the input file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name used for output files.
    pub fn base_name(&self) -> &str {
        &self.base
    }

    /// Column layout taken from the header row.
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Count data rows (excluding the header).
    ///
    /// Parses every row, so a malformed file fails here before any chunk
    /// is written.
    pub fn count_rows(&self) -> Result<usize, ReaderError> {
        let mut total = 0;
        for batch in self.open_reader(COUNT_BATCH_SIZE)? {
            total += batch.context(CsvDecodeSnafu { path: &self.path })?.num_rows();
        }
        Ok(total)
    }

    /// Iterate the file as chunks of at most `chunk_size` rows.
    pub fn chunks(&self, chunk_size: usize) -> Result<Chunks, ReaderError> {
        Ok(Chunks {
            reader: self.open_reader(chunk_size.max(1))?,
            path: self.path.clone(),
            base: self.base.clone(),
            next_number: 1,
            failed: false,
        })
    }

    fn open_reader(&self, batch_size: usize) -> Result<arrow::csv::Reader<File>, ReaderError> {
        let file = File::open(&self.path).context(OpenInputSnafu { path: &self.path })?;
        ReaderBuilder::new(self.schema())
            .with_header(true)
            .with_batch_size(batch_size)
            .build(file)
            .context(CsvDecodeSnafu { path: &self.path })
    }
}

/// Lazy sequence of chunks from one input file.
///
/// Ends after the first decode error; the rest of the file is not parsed.
pub struct Chunks {
    reader: arrow::csv::Reader<File>,
    path: PathBuf,
    base: String,
    next_number: usize,
    failed: bool,
}

impl Iterator for Chunks {
    type Item = Result<Chunk, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let batch = match self.reader.next()? {
            Ok(batch) => batch,
            Err(source) => {
                self.failed = true;
                return Some(Err(ReaderError::CsvDecode {
                    path: self.path.clone(),
                    source,
                }));
            }
        };

        let number = self.next_number;
        self.next_number += 1;

        Some(Ok(Chunk {
            base: self.base.clone(),
            number,
            batch,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use arrow::array::{Array, StringArray};
    use tempfile::TempDir;

    /// Write a CSV with an `id,name` header and `rows` data lines.
    pub(crate) fn write_csv(dir: &Path, name: &str, rows: usize) -> PathBuf {
        let mut contents = String::from("id,name\n");
        for i in 0..rows {
            contents.push_str(&format!("{i},name_{i}\n"));
        }
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_fifteen_thousand_rows_split_in_two() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "orders.csv", 15_000);

        let splitter = ChunkSplitter::open(&path).unwrap();
        assert_eq!(splitter.base_name(), "orders");
        assert_eq!(splitter.count_rows().unwrap(), 15_000);

        let chunks: Vec<Chunk> = splitter
            .chunks(10_000)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Chunk::rows).collect();
        let numbers: Vec<usize> = chunks.iter().map(|c| c.number).collect();

        assert_eq!(sizes, vec![10_000, 5_000]);
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(chunks[1].stem(), "orders_2");
    }

    #[test]
    fn test_chunks_cover_every_row_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "t.csv", 2_345);
        let splitter = ChunkSplitter::open(&path).unwrap();

        let mut expected_id = 0;
        let mut expected_number = 1;
        for chunk in splitter.chunks(1_000).unwrap() {
            let chunk = chunk.unwrap();
            assert!(chunk.rows() <= 1_000);
            assert_eq!(chunk.number, expected_number);
            expected_number += 1;

            let ids = chunk
                .batch
                .column(0)
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap();
            for i in 0..ids.len() {
                assert_eq!(ids.value(i), expected_id.to_string());
                expected_id += 1;
            }
        }
        assert_eq!(expected_id, 2_345);
        assert_eq!(expected_number - 1, 3);
    }

    #[test]
    fn test_chunks_are_restartable() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "t.csv", 30);
        let splitter = ChunkSplitter::open(&path).unwrap();

        let first: Vec<usize> = splitter.chunks(7).unwrap().map(|c| c.unwrap().rows()).collect();
        let second: Vec<usize> = splitter.chunks(7).unwrap().map(|c| c.unwrap().rows()).collect();
        assert_eq!(first, vec![7, 7, 7, 7, 2]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_only_yields_no_chunks() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "t.csv", 0);
        let splitter = ChunkSplitter::open(&path).unwrap();
        assert_eq!(splitter.count_rows().unwrap(), 0);
        assert_eq!(splitter.chunks(1_000).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        let err = ChunkSplitter::open(&path).unwrap_err();
        assert!(matches!(err, ReaderError::EmptyInput { .. }));
    }

    #[test]
    fn test_malformed_row_fails_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "id,name\n1,a\n2,b,extra\n3,c\n").unwrap();

        let splitter = ChunkSplitter::open(&path).unwrap();
        assert!(matches!(
            splitter.count_rows(),
            Err(ReaderError::CsvDecode { .. })
        ));
        let results: Vec<_> = splitter.chunks(1_000).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_quoted_fields_keep_their_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quoted.csv");
        std::fs::write(&path, "id,remark\n1,\"late, bus\"\n2,plain\n").unwrap();

        let splitter = ChunkSplitter::open(&path).unwrap();
        let chunk = splitter.chunks(10).unwrap().next().unwrap().unwrap();
        let remarks = chunk
            .batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(remarks.value(0), "late, bus");
        assert_eq!(chunk.batch.schema().field(1).name(), "remark");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ChunkSplitter::open(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, ReaderError::OpenInput { .. }));
    }
}
