//! Starcat Common Library
//!
//! Shared error types and logging setup for the Starcat workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`StarcatError`] and the [`Result`] alias used by
//!   configuration and filesystem helpers
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`], the single
//!   place where the `tracing` subscriber is installed
//!
//! # Example
//!
//! ```no_run
//! use starcat_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, StarcatError};
