//! HTTP transport seam for the download manager

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Transport failures, classified by whether another attempt may succeed
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Response stream failed: {0}")]
    Stream(String),

    #[error("Incomplete body: expected {expected} bytes, received {received}")]
    IncompleteBody { expected: u64, received: u64 },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server returned HTTP {status}")]
    Status { status: u16 },

    #[error("Invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    /// Whether the failure is transient and the transfer may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connection(_)
            | TransportError::Stream(_)
            | TransportError::IncompleteBody { .. }
            | TransportError::Request(_) => true,
            TransportError::Status { .. } | TransportError::Invalid(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::Invalid(e.to_string())
        } else if e.is_connect() || e.is_timeout() {
            TransportError::Connection(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Stream(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status {
                status: status.as_u16(),
            }
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Streaming response body
pub struct ResourceBody {
    /// Declared `Content-Length`, when the server sent one
    pub content_length: Option<u64>,
    pub chunks: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl std::fmt::Debug for ResourceBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Remote side of a transfer
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Remote byte length from a metadata-only request; `None` when not advertised
    async fn remote_length(&self, url: &Url) -> Result<Option<u64>, TransportError>;

    /// Start a streamed GET of `url`; non-success statuses are errors
    async fn fetch(&self, url: &Url) -> Result<ResourceBody, TransportError>;
}

/// [`ResourceClient`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpResourceClient {
    client: Client,
}

impl HttpResourceClient {
    /// Build a client with a connect timeout; transfers themselves are unbounded
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("starcat-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Invalid(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn remote_length(&self, url: &Url) -> Result<Option<u64>, TransportError> {
        let response = self.client.head(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        // content_length() reflects the (empty) body of a HEAD response
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        debug!(url = %url, length = ?length, "Fetched remote length");
        Ok(length)
    }

    async fn fetch(&self, url: &Url) -> Result<ResourceBody, TransportError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let content_length = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed();

        Ok(ResourceBody {
            content_length,
            chunks,
        })
    }
}
