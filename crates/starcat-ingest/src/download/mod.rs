// Resumable bulk download
//
// A fixed pool of workers pulls catalog files from a shared queue and streams
// each one to the output directory. Files already on disk with the advertised
// remote length are skipped, so an interrupted run can simply be restarted.
//
// - Client: transport seam (reqwest in production, fakes in tests)
// - Transfer: completeness check, bounded retry, streamed write for one file
// - Manager: worker pool, queue, cancellation and state tracking
// - Report: per-resource outcomes

pub mod client;
pub mod manager;
pub mod report;
pub mod transfer;

use std::path::PathBuf;
use std::time::Duration;

pub use client::{HttpResourceClient, ResourceBody, ResourceClient, TransportError};
pub use manager::DownloadManager;
pub use report::{DownloadReport, ResourceReport, ResourceState, TransferOutcome};

/// Default number of concurrent download workers
pub const DEFAULT_WORKERS: usize = 100;

/// Default number of attempts per file
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay between attempts; attempt `n` waits `n` times this
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How long an idle worker waits on the queue before re-checking cancellation
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Write buffer size for streamed transfers
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Download manager settings
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub workers: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub chunk_size: usize,
}

impl DownloadConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}
