//! Per-resource results of a download run

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use url::Url;

/// Lifecycle of one resource within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Pending,
    InFlight,
    Complete,
    Failed,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceState::Pending => "pending",
            ResourceState::InFlight => "in_flight",
            ResourceState::Complete => "complete",
            ResourceState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How the worker finished with a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Local file already matched the remote length
    AlreadyComplete { bytes: u64 },
    Downloaded { bytes: u64, attempts: u32 },
    Failed { attempts: u32, reason: String },
    /// Not processed (or interrupted) because the run was cancelled
    Cancelled,
}

impl TransferOutcome {
    /// Final state implied by the outcome
    pub fn state(&self) -> ResourceState {
        match self {
            TransferOutcome::AlreadyComplete { .. } | TransferOutcome::Downloaded { .. } => {
                ResourceState::Complete
            }
            TransferOutcome::Failed { .. } => ResourceState::Failed,
            TransferOutcome::Cancelled => ResourceState::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub url: Url,
    pub path: Option<PathBuf>,
    pub state: ResourceState,
    #[serde(flatten)]
    pub outcome: TransferOutcome,
}

/// Result of a download run, one entry per resource in listing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub resources: Vec<ResourceReport>,
}

impl DownloadReport {
    fn count(&self, pred: impl Fn(&TransferOutcome) -> bool) -> usize {
        self.resources.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn total(&self) -> usize {
        self.resources.len()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::AlreadyComplete { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Cancelled))
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.resources
            .iter()
            .map(|r| match r.outcome {
                TransferOutcome::Downloaded { bytes, .. } => bytes,
                _ => 0,
            })
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.cancelled() == 0
    }
}
