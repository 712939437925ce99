//! Transfer of a single resource

use std::io;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{ResourceClient, TransportError};
use super::report::TransferOutcome;
use super::DownloadConfig;
use crate::index::RemoteResource;

enum AttemptError {
    Transport(TransportError),
    Io(io::Error),
    Cancelled,
}

impl From<TransportError> for AttemptError {
    fn from(e: TransportError) -> Self {
        AttemptError::Transport(e)
    }
}

impl From<io::Error> for AttemptError {
    fn from(e: io::Error) -> Self {
        AttemptError::Io(e)
    }
}

/// Local path for `resource`: the URL's last path segment inside `output_dir`
pub fn destination(output_dir: &Path, resource: &RemoteResource) -> Option<PathBuf> {
    resource.file_name().map(|name| output_dir.join(name))
}

/// Bring the local copy of `resource` up to date
///
/// Skips the transfer when the local file already has the remote length.
/// Otherwise downloads the whole file, retrying transient failures up to
/// `max_retries` attempts with a linearly growing delay.
pub async fn transfer_resource(
    client: &dyn ResourceClient,
    config: &DownloadConfig,
    resource: &RemoteResource,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let url = &resource.url;

    if cancel.is_cancelled() {
        return TransferOutcome::Cancelled;
    }

    let Some(path) = destination(&config.output_dir, resource) else {
        warn!(url = %url, "URL has no file name");
        return TransferOutcome::Failed {
            attempts: 0,
            reason: "URL has no file name".to_string(),
        };
    };

    if let Some(bytes) = already_complete(client, resource, &path).await {
        info!(url = %url, path = %path.display(), bytes, "Already downloaded, skipping");
        return TransferOutcome::AlreadyComplete { bytes };
    }

    let mut last_error = String::new();
    for attempt in 1..=config.max_retries {
        if cancel.is_cancelled() {
            return TransferOutcome::Cancelled;
        }

        debug!(url = %url, attempt, "Starting transfer");
        match attempt_transfer(client, config, resource, &path, cancel).await {
            Ok(bytes) => {
                info!(url = %url, path = %path.display(), bytes, attempt, "Downloaded");
                return TransferOutcome::Downloaded {
                    bytes,
                    attempts: attempt,
                };
            }
            Err(AttemptError::Cancelled) => {
                info!(url = %url, path = %path.display(), "Transfer cancelled, partial file left");
                return TransferOutcome::Cancelled;
            }
            Err(AttemptError::Io(e)) => {
                warn!(url = %url, path = %path.display(), error = %e, "Local write failed");
                return TransferOutcome::Failed {
                    attempts: attempt,
                    reason: format!("IO error: {e}"),
                };
            }
            Err(AttemptError::Transport(e)) if !e.is_retryable() => {
                warn!(url = %url, error = %e, attempt, "Transfer failed");
                return TransferOutcome::Failed {
                    attempts: attempt,
                    reason: e.to_string(),
                };
            }
            Err(AttemptError::Transport(e)) => {
                warn!(
                    url = %url,
                    error = %e,
                    attempt,
                    max_retries = config.max_retries,
                    "Transfer attempt failed"
                );
                last_error = e.to_string();

                if attempt < config.max_retries {
                    let delay = config.retry_delay * attempt;
                    tokio::select! {
                        _ = cancel.cancelled() => return TransferOutcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    warn!(
        url = %url,
        attempts = config.max_retries,
        reason = %last_error,
        "Giving up after exhausting retries"
    );
    TransferOutcome::Failed {
        attempts: config.max_retries,
        reason: last_error,
    }
}

/// Local length when it equals the remote length
async fn already_complete(
    client: &dyn ResourceClient,
    resource: &RemoteResource,
    path: &Path,
) -> Option<u64> {
    let local = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return None,
    };

    match client.remote_length(&resource.url).await {
        Ok(Some(remote)) if remote == local => Some(local),
        Ok(Some(remote)) => {
            info!(url = %resource.url, local, remote, "Local file incomplete, re-downloading");
            None
        }
        Ok(None) => {
            info!(url = %resource.url, local, "Remote length unknown, re-downloading");
            None
        }
        Err(e) => {
            warn!(url = %resource.url, error = %e, "Length check failed, re-downloading");
            None
        }
    }
}

async fn attempt_transfer(
    client: &dyn ResourceClient,
    config: &DownloadConfig,
    resource: &RemoteResource,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<u64, AttemptError> {
    let mut body = client.fetch(&resource.url).await?;

    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::with_capacity(config.chunk_size, file);
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                writer.flush().await?;
                return Err(AttemptError::Cancelled);
            }
            next = body.chunks.next() => next,
        };

        let Some(chunk) = next else { break };
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;

    if let Some(expected) = body.content_length {
        if written != expected {
            return Err(TransportError::IncompleteBody {
                expected,
                received: written,
            }
            .into());
        }
    }

    Ok(written)
}
