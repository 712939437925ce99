//! Worker pool driving transfers from a shared queue

use std::sync::Arc;

use indicatif::ProgressBar;
use starcat_common::Result;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::ResourceClient;
use super::report::{DownloadReport, ResourceReport, ResourceState, TransferOutcome};
use super::transfer::{destination, transfer_resource};
use super::DownloadConfig;
use crate::index::RemoteResource;

/// One queued resource, identified by its position in the listing
#[derive(Debug, Clone)]
struct DownloadTask {
    index: usize,
    resource: RemoteResource,
}

#[derive(Debug)]
enum QueueItem {
    Task(DownloadTask),
    /// Tells exactly one worker to exit
    Shutdown,
}

type SharedQueue = Arc<Mutex<mpsc::UnboundedReceiver<QueueItem>>>;

/// Observable per-resource state for the current run
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    states: Arc<RwLock<Vec<ResourceState>>>,
}

impl StateTable {
    async fn reset(&self, len: usize) {
        *self.states.write().await = vec![ResourceState::Pending; len];
    }

    async fn set(&self, index: usize, state: ResourceState) {
        if let Some(slot) = self.states.write().await.get_mut(index) {
            *slot = state;
        }
    }

    pub async fn get(&self, index: usize) -> Option<ResourceState> {
        self.states.read().await.get(index).copied()
    }

    pub async fn snapshot(&self) -> Vec<ResourceState> {
        self.states.read().await.clone()
    }

    /// Number of resources currently in `state`
    pub async fn count(&self, state: ResourceState) -> usize {
        self.states.read().await.iter().filter(|s| **s == state).count()
    }
}

/// Downloads a set of resources with a fixed pool of workers
pub struct DownloadManager {
    client: Arc<dyn ResourceClient>,
    config: Arc<DownloadConfig>,
    states: StateTable,
    progress: Option<ProgressBar>,
}

impl DownloadManager {
    pub fn new(client: Arc<dyn ResourceClient>, config: DownloadConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            states: StateTable::default(),
            progress: None,
        }
    }

    /// Advance `progress` once per processed resource
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Handle to the live state table
    pub fn state_table(&self) -> StateTable {
        self.states.clone()
    }

    /// Download every resource, returning one report entry per resource in input order
    ///
    /// Cancelling `cancel` stops new transfers, interrupts running ones between
    /// chunks and drains the queue. Partial files are left on disk.
    pub async fn run(
        &self,
        resources: Vec<RemoteResource>,
        cancel: CancellationToken,
    ) -> Result<DownloadReport> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let total = resources.len();
        self.states.reset(total).await;

        let worker_count = self.config.workers.clamp(1, total.max(1));
        info!(
            resources = total,
            workers = worker_count,
            output_dir = %self.config.output_dir.display(),
            "Starting download run"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let queue: SharedQueue = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                queue: queue.clone(),
                client: self.client.clone(),
                config: self.config.clone(),
                states: self.states.clone(),
                cancel: cancel.clone(),
                progress: self.progress.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        for (index, resource) in resources.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(enqueued = index, total, "Cancelled while enqueueing");
                break;
            }
            let task = DownloadTask {
                index,
                resource: resource.clone(),
            };
            if tx.send(QueueItem::Task(task)).is_err() {
                break;
            }
        }
        for _ in 0..worker_count {
            if tx.send(QueueItem::Shutdown).is_err() {
                break;
            }
        }
        drop(tx);

        let mut outcomes: Vec<Option<TransferOutcome>> = vec![None; total];
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(results) => {
                    debug!(worker = idx, processed = results.len(), "Worker finished");
                    for (index, outcome) in results {
                        if let Some(slot) = outcomes.get_mut(index) {
                            *slot = Some(outcome);
                        }
                    }
                }
                Err(e) => error!(worker = idx, error = %e, "Download worker panicked"),
            }
        }

        let resources = resources
            .into_iter()
            .zip(outcomes)
            .map(|(resource, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    if cancel.is_cancelled() {
                        TransferOutcome::Cancelled
                    } else {
                        TransferOutcome::Failed {
                            attempts: 0,
                            reason: "worker exited before reporting".to_string(),
                        }
                    }
                });
                ResourceReport {
                    path: destination(&self.config.output_dir, &resource),
                    url: resource.url,
                    state: outcome.state(),
                    outcome,
                }
            })
            .collect();

        let report = DownloadReport { resources };
        info!(
            total = report.total(),
            downloaded = report.downloaded(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            bytes = report.bytes_downloaded(),
            "Download run finished"
        );

        for failed in report
            .resources
            .iter()
            .filter(|r| r.state == ResourceState::Failed)
        {
            if let TransferOutcome::Failed { attempts, reason } = &failed.outcome {
                warn!(url = %failed.url, attempts, reason = %reason, "Resource failed");
            }
        }

        Ok(report)
    }
}

struct Worker {
    id: usize,
    queue: SharedQueue,
    client: Arc<dyn ResourceClient>,
    config: Arc<DownloadConfig>,
    states: StateTable,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl Worker {
    async fn run(self) -> Vec<(usize, TransferOutcome)> {
        let mut results = Vec::new();

        loop {
            let item = {
                let mut rx = self.queue.lock().await;
                tokio::time::timeout(self.config.poll_interval, rx.recv()).await
            };

            let task = match item {
                // Idle; loop back so cancellation is observed
                Err(_) => continue,
                Ok(None) | Ok(Some(QueueItem::Shutdown)) => break,
                Ok(Some(QueueItem::Task(task))) => task,
            };

            if self.cancel.is_cancelled() {
                debug!(worker = self.id, url = %task.resource.url, "Draining cancelled task");
                results.push((task.index, TransferOutcome::Cancelled));
                continue;
            }

            self.states.set(task.index, ResourceState::InFlight).await;
            let outcome =
                transfer_resource(self.client.as_ref(), &self.config, &task.resource, &self.cancel)
                    .await;
            self.states.set(task.index, outcome.state()).await;

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
            results.push((task.index, outcome));
        }

        debug!(worker = self.id, "Worker observed shutdown");
        results
    }
}
