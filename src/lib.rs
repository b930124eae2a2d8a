//! chunkload: split large CSV files into size-tiered chunks and bulk-load
//! them into MySQL.
//!
//! The split pipeline turns every CSV in an input directory into
//! `{base}_{n}.csv` (and optionally `.parquet`) chunks. The load pipeline
//! rebuilds a table from a JSON schema document and imports the matching
//! chunks with `LOAD DATA LOCAL INFILE` in one transaction.
//!
//! # Example
//!
//! ```ignore
//! use chunkload::{Config, workflow, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::load(None)?;
//!     let report = workflow::split(&config, false).await?;
//!     println!("Split {} rows", report.total_rows());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod load;
pub mod logging;
pub mod metrics;
pub mod sink;
pub mod source;
pub mod split;
pub mod workflow;

// Re-export main types
pub use config::Config;
pub use load::{LoadPipeline, LoadReport, LoadRequest};
pub use split::{SplitPipeline, SplitReport};
