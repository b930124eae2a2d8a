//! Input side of the split pipeline.
//!
//! Lists source files in the input directory and reads each one as a
//! sequence of fixed-size row chunks.

pub mod reader;
pub mod scanner;

pub use reader::{Chunk, ChunkSplitter, Chunks};
pub use scanner::{base_name, list_input_files};
