//! Concurrent per-file loading

use std::path::PathBuf;
use std::sync::Arc;

use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use super::report::{FileFailure, FileOutcome, FileStatus, LoadReport};
use super::store::{CatalogStore, RowSession};
use super::LoadConfig;
use crate::fits::{FitsError, FitsFile};
use crate::schema::TableDefinition;
use crate::value::{display_row, sanitize_row, SqlValue};

/// Why a file's rows could not be materialized
enum ReadFailure {
    MissingTable(String),
    Unreadable(String),
    Layout(String),
}

/// Loads catalog files into one table, one database session per file
pub struct CatalogLoader<S: CatalogStore> {
    store: Arc<S>,
    definition: Arc<TableDefinition>,
    insert_sql: Arc<str>,
    config: LoadConfig,
    progress: Option<ProgressBar>,
}

impl<S: CatalogStore> CatalogLoader<S> {
    pub fn new(store: Arc<S>, definition: TableDefinition, config: LoadConfig) -> Self {
        let insert_sql: Arc<str> = Arc::from(definition.insert_sql());
        Self {
            store,
            definition: Arc::new(definition),
            insert_sql,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    /// Load `files` with at most `workers` in flight
    ///
    /// A failure in one file never affects another; every file gets an entry
    /// in the report, in input order.
    pub async fn run(&self, files: Vec<PathBuf>) -> LoadReport {
        let workers = self.config.workers.max(1);
        info!(
            files = files.len(),
            workers,
            table = %self.definition.table_name,
            "Starting load run"
        );

        let mut results: Vec<(usize, FileOutcome)> = stream::iter(files.into_iter().enumerate())
            .map(|(index, path)| {
                let store = self.store.clone();
                let definition = self.definition.clone();
                let insert_sql = self.insert_sql.clone();
                let table_hdu = self.config.table_hdu;
                let progress = self.progress.clone();

                async move {
                    let task_path = path.clone();
                    let handle = tokio::spawn(async move {
                        load_file(store, definition, insert_sql, table_hdu, task_path).await
                    });

                    let status = match handle.await {
                        Ok(status) => status,
                        Err(e) => {
                            error!(path = %path.display(), error = %e, "Load worker panicked");
                            FileStatus::Failed {
                                failure: FileFailure::Worker {
                                    reason: e.to_string(),
                                },
                            }
                        }
                    };

                    if let Some(pb) = &progress {
                        pb.inc(1);
                    }
                    (index, FileOutcome { path, status })
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);

        let report = LoadReport {
            files: results.into_iter().map(|(_, outcome)| outcome).collect(),
        };

        info!(
            total = report.total(),
            loaded = report.loaded(),
            skipped = report.skipped(),
            failed = report.failed(),
            rows = report.rows_inserted(),
            "Load run finished"
        );

        report
    }
}

async fn load_file<S: CatalogStore>(
    store: Arc<S>,
    definition: Arc<TableDefinition>,
    insert_sql: Arc<str>,
    table_hdu: usize,
    path: PathBuf,
) -> FileStatus {
    let mut session = match store.open_session().await {
        Ok(session) => session,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Could not open database session");
            return FileStatus::Failed {
                failure: FileFailure::Session {
                    reason: e.to_string(),
                },
            };
        }
    };

    let status = insert_file(&mut session, definition, &insert_sql, table_hdu, &path).await;

    if let Err(e) = session.close().await {
        warn!(path = %path.display(), error = %e, "Failed to close database session");
    }

    status
}

async fn insert_file<R: RowSession>(
    session: &mut R,
    definition: Arc<TableDefinition>,
    insert_sql: &str,
    table_hdu: usize,
    path: &std::path::Path,
) -> FileStatus {
    let blocking_path = path.to_path_buf();
    let read = tokio::task::spawn_blocking(move || read_rows(&blocking_path, &definition, table_hdu)).await;

    let rows = match read {
        Ok(Ok(rows)) => rows,
        Ok(Err(ReadFailure::MissingTable(reason))) => {
            info!(path = %path.display(), hdu = table_hdu, reason = %reason, "No table in file, skipping");
            return FileStatus::Skipped { reason };
        }
        Ok(Err(ReadFailure::Unreadable(reason))) => {
            error!(path = %path.display(), reason = %reason, "Could not read catalog file");
            return FileStatus::Failed {
                failure: FileFailure::Unreadable { reason },
            };
        }
        Ok(Err(ReadFailure::Layout(reason))) => {
            error!(path = %path.display(), reason = %reason, "Column layout does not match table");
            return FileStatus::Failed {
                failure: FileFailure::LayoutMismatch { reason },
            };
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "File reader task failed");
            return FileStatus::Failed {
                failure: FileFailure::Worker {
                    reason: e.to_string(),
                },
            };
        }
    };

    debug!(path = %path.display(), rows = rows.len(), "Inserting rows");

    for (row_index, row) in rows.iter().enumerate() {
        if let Err(e) = session.insert_row(insert_sql, row).await {
            error!(
                path = %path.display(),
                row_index,
                values = %display_row(row),
                error = %e,
                "Row rejected, abandoning file"
            );
            return FileStatus::Failed {
                failure: FileFailure::RowRejected {
                    row_index,
                    values: row.clone(),
                    reason: e.to_string(),
                },
            };
        }
    }

    info!(path = %path.display(), rows = rows.len(), "Loaded file");
    FileStatus::Loaded { rows: rows.len() }
}

fn read_rows(
    path: &std::path::Path,
    definition: &TableDefinition,
    table_hdu: usize,
) -> Result<Vec<Vec<SqlValue>>, ReadFailure> {
    let mut file = FitsFile::open(path).map_err(|e| ReadFailure::Unreadable(e.to_string()))?;

    let table = file.binary_table(table_hdu).map_err(|e| match e {
        FitsError::MissingTable { .. } => ReadFailure::MissingTable(e.to_string()),
        other => ReadFailure::Unreadable(other.to_string()),
    })?;

    definition.check_layout(&table).map_err(ReadFailure::Layout)?;

    let rows = file
        .read_rows(&table)
        .map_err(|e| ReadFailure::Unreadable(e.to_string()))?;

    Ok(rows.into_iter().map(sanitize_row).collect())
}
