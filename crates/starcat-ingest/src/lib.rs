//! Starcat Ingest
//!
//! Bulk acquisition of FITS catalog files over HTTP and their ingestion into
//! MySQL/MariaDB.
//!
//! The pipeline has three stages, each usable on its own:
//!
//! 1. [`index::CatalogIndex`] resolves a directory listing into catalog URLs and
//!    [`download::DownloadManager`] fetches them with a worker pool, skipping
//!    files that are already complete on disk
//! 2. [`schema::SchemaInference`] reads one sample file and renders the
//!    `CREATE TABLE` statement for its binary table
//! 3. [`load::CatalogLoader`] inserts every file's rows, one database session
//!    per file, isolating failures to the file that caused them
//!
//! The [`fits`] module is the native reader (and test writer) for the file
//! format.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod fits;
pub mod index;
pub mod load;
pub mod progress;
pub mod schema;
pub mod value;

pub use config::IngestConfig;
pub use download::{DownloadConfig, DownloadManager, DownloadReport};
pub use index::{CatalogIndex, RemoteResource};
pub use load::{CatalogLoader, LoadConfig, LoadReport};
pub use schema::{SchemaInference, TableDefinition};
pub use value::{RawValue, SqlValue};
