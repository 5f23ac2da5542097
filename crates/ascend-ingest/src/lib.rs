//! Ascend Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Scheduled relocation of data files between two storage endpoints.
//!
//! Each pass lists a source directory, pulls the last record out of every
//! delimited-text and spreadsheet file, records it in a shared central log,
//! moves the file to the destination (copy, verify, then delete), and mails
//! a short report per file.
//!
//! # Example
//!
//! ```no_run
//! use ascend_ingest::{config::IngestSettings, pipeline::IngestPipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = IngestSettings::load()?;
//!     let pipeline = IngestPipeline::from_settings(&settings)?;
//!     let report = pipeline.run_once().await?;
//!     tracing::info!("{} files processed", report.processed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pipeline;
pub mod storage;

pub use config::IngestSettings;
pub use pipeline::{IngestPipeline, RunReport};
