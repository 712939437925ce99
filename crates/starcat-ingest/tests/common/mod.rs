//! Shared fakes and fixtures for starcat-ingest integration tests
//!
//! - [`FakeClient`]: scripted [`ResourceClient`] counting fetches per URL
//! - [`FakeStore`]: in-memory [`CatalogStore`] recording inserted rows and
//!   rejecting any row that contains the text `"bad"`
//! - fixture writers for catalog files

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use starcat_ingest::download::{ResourceBody, ResourceClient, TransportError};
use starcat_ingest::fits::BinTableWriter;
use starcat_ingest::load::{CatalogStore, RowSession, StoreError};
use starcat_ingest::{RawValue, SqlValue};
use tokio_util::sync::CancellationToken;
use url::Url;

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,starcat_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fake HTTP client
// ============================================================================

/// How the fake server responds for one URL
#[derive(Clone)]
pub enum Behavior {
    /// Serve the body in 4-byte chunks with an accurate length
    Serve(Vec<u8>),
    /// Every HEAD and GET fails with this error
    Fail(TransportError),
    /// Send the first chunk, then stall until the transfer is cancelled
    Stall(Vec<u8>),
    /// Send the first chunk, cancel `token`, then stall
    CancelMidStream {
        body: Vec<u8>,
        token: CancellationToken,
    },
}

#[derive(Default)]
pub struct FakeClient {
    behaviors: HashMap<String, Behavior>,
    fetches: Mutex<HashMap<String, usize>>,
    heads: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &Url, behavior: Behavior) -> Self {
        self.behaviors.insert(url.to_string(), behavior);
        self
    }

    pub fn fetch_count(&self, url: &Url) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(url.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    fn behavior(&self, url: &Url) -> Result<Behavior, TransportError> {
        self.behaviors
            .get(url.as_str())
            .cloned()
            .ok_or(TransportError::Status { status: 404 })
    }
}

fn chunked(body: &[u8]) -> Vec<Result<Bytes, TransportError>> {
    body.chunks(4)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect()
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn remote_length(&self, url: &Url) -> Result<Option<u64>, TransportError> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        match self.behavior(url)? {
            Behavior::Serve(body)
            | Behavior::Stall(body)
            | Behavior::CancelMidStream { body, .. } => {
                Ok(Some(body.len() as u64))
            }
            Behavior::Fail(e) => Err(e),
        }
    }

    async fn fetch(&self, url: &Url) -> Result<ResourceBody, TransportError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        match self.behavior(url)? {
            Behavior::Serve(body) => Ok(ResourceBody {
                content_length: Some(body.len() as u64),
                chunks: stream::iter(chunked(&body)).boxed(),
            }),
            Behavior::Fail(e) => Err(e),
            Behavior::Stall(body) => {
                let first = Bytes::copy_from_slice(&body[..4.min(body.len())]);
                Ok(ResourceBody {
                    content_length: Some(body.len() as u64),
                    chunks: stream::once(async move { Ok(first) })
                        .chain(stream::pending())
                        .boxed(),
                })
            }
            Behavior::CancelMidStream { body, token } => {
                let first = Bytes::copy_from_slice(&body[..4.min(body.len())]);
                let tail = stream::once(async move {
                    token.cancel();
                    std::future::pending::<Result<Bytes, TransportError>>().await
                });
                Ok(ResourceBody {
                    content_length: Some(body.len() as u64),
                    chunks: stream::once(async move { Ok(first) }).chain(tail).boxed(),
                })
            }
        }
    }
}

// ============================================================================
// Fake catalog store
// ============================================================================

#[derive(Default)]
struct StoreState {
    rows: Mutex<Vec<Vec<SqlValue>>>,
    statements: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<StoreState>,
    refuse_sessions: bool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose sessions can never be opened
    pub fn unreachable() -> Self {
        Self {
            refuse_sessions: true,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<Vec<SqlValue>> {
        self.state.rows.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.statements.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_sessions(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    state: Arc<StoreState>,
}

#[async_trait]
impl CatalogStore for FakeStore {
    type Session = FakeSession;

    async fn open_session(&self) -> Result<FakeSession, StoreError> {
        if self.refuse_sessions {
            return Err(StoreError::Connect("connection refused".to_string()));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_active.fetch_max(active, Ordering::SeqCst);
        // Give other workers a chance to overlap
        tokio::task::yield_now().await;
        Ok(FakeSession {
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl RowSession for FakeSession {
    async fn insert_row(&mut self, statement: &str, values: &[SqlValue]) -> Result<(), StoreError> {
        if values.iter().any(|v| *v == SqlValue::Text("bad".to_string())) {
            return Err(StoreError::Rejected(
                "Incorrect string value for column 'designation'".to_string(),
            ));
        }
        self.state.statements.lock().unwrap().push(statement.to_string());
        self.state.rows.lock().unwrap().push(values.to_vec());
        Ok(())
    }

    async fn close(self) -> Result<(), StoreError> {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Catalog fixtures
// ============================================================================

/// Gaia-like catalog with `source_id`, `designation`, `ra`, `duplicated_source`
pub fn gaia_writer(first_id: i64, designations: &[&str]) -> BinTableWriter {
    let rows = designations.iter().enumerate().map(|(i, name)| {
        vec![
            RawValue::Integer(first_id + i as i64),
            RawValue::Text((*name).to_string()),
            RawValue::Float(45.0 + i as f64),
            RawValue::Boolean(i % 2 == 0),
        ]
    });

    BinTableWriter::new()
        .column("source_id", "K")
        .column("designation", "16A")
        .column("ra", "D")
        .column("duplicated_source", "L")
        .rows(rows)
}

pub fn write_gaia_file(dir: &Path, name: &str, first_id: i64, designations: &[&str]) -> PathBuf {
    let path = dir.join(name);
    gaia_writer(first_id, designations).write_to(&path).unwrap();
    path
}

pub fn gaia_bytes(first_id: i64, designations: &[&str]) -> Vec<u8> {
    gaia_writer(first_id, designations).to_bytes().unwrap()
}

/// A valid file holding only an empty primary HDU
pub fn write_primary_only(dir: &Path, name: &str) -> PathBuf {
    let mut block = Vec::new();
    for card in [
        "SIMPLE  =                    T",
        "BITPIX  =                    8",
        "NAXIS   =                    0",
        "END",
    ] {
        block.extend(format!("{card:<80}").into_bytes());
    }
    block.resize(2880, b' ');

    let path = dir.join(name);
    std::fs::write(&path, block).unwrap();
    path
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}
