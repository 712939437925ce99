// Catalog loading
//
// Each catalog file is loaded by its own task through its own database
// session. Rows are decoded off the async runtime, sanitized, and inserted one
// statement at a time in file order. Failures stay scoped to the file.

pub mod loader;
pub mod report;
pub mod store;

pub use loader::CatalogLoader;
pub use report::{FileFailure, FileOutcome, FileStatus, LoadReport};
pub use store::{CatalogStore, DatabaseConfig, MySqlSession, MySqlStore, RowSession, StoreError};

/// HDU index of the catalog table (the first extension)
pub const DEFAULT_TABLE_HDU: usize = 1;

/// Default number of files loaded concurrently
pub const DEFAULT_LOAD_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub table_hdu: usize,
    pub workers: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            table_hdu: DEFAULT_TABLE_HDU,
            workers: DEFAULT_LOAD_WORKERS,
        }
    }
}
