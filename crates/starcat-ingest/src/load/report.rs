//! Per-file results of a load run

use std::path::PathBuf;

use serde::Serialize;

use crate::value::SqlValue;

/// Why a file was not fully loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileFailure {
    Session { reason: String },
    Unreadable { reason: String },
    LayoutMismatch { reason: String },
    RowRejected {
        row_index: usize,
        values: Vec<SqlValue>,
        reason: String,
    },
    Worker { reason: String },
}

impl FileFailure {
    pub fn reason(&self) -> &str {
        match self {
            FileFailure::Session { reason }
            | FileFailure::Unreadable { reason }
            | FileFailure::LayoutMismatch { reason }
            | FileFailure::RowRejected { reason, .. }
            | FileFailure::Worker { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Loaded { rows: usize },
    Skipped { reason: String },
    Failed { failure: FileFailure },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Result of a load run, one entry per file in discovery order
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub files: Vec<FileOutcome>,
}

impl LoadReport {
    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn loaded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Loaded { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
            .count()
    }

    pub fn rows_inserted(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.status {
                FileStatus::Loaded { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome_for(&self, path: &std::path::Path) -> Option<&FileStatus> {
        self.files.iter().find(|f| f.path == path).map(|f| &f.status)
    }
}
