//! Ascend Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and diagnostic logging for the Ascend workspace.
//!
//! - **Error Handling**: [`AscendError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]

pub mod error;
pub mod logging;

pub use error::{AscendError, Result};
