//! End-to-end: listing → download → schema → load

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{gaia_bytes, init_test_tracing, FakeStore};
use starcat_ingest::catalog::discover_catalog_files;
use starcat_ingest::download::HttpResourceClient;
use starcat_ingest::index::ResolutionError;
use starcat_ingest::load::LoadConfig;
use starcat_ingest::{CatalogIndex, CatalogLoader, DownloadConfig, DownloadManager, SchemaInference};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILES: [&str; 5] = [
    "GaiaSource_000-000-000.fits",
    "GaiaSource_000-000-001.fits",
    "GaiaSource_000-000-002.fits",
    "GaiaSource_000-000-003.fits",
    "GaiaSource_000-000-004.fits",
];

fn listing_html() -> String {
    let mut html = String::from("<html><body><h1>Index of /fits</h1>\n");
    html.push_str("<a href=\"../\">Parent Directory</a>\n");
    for name in FILES {
        html.push_str(&format!("<a href=\"{name}\">{name}</a>\n"));
    }
    html.push_str("<a href=\"_MD5SUM.txt\">_MD5SUM.txt</a>\n</body></html>");
    html
}

#[tokio::test]
async fn test_listing_to_loaded_rows() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/fits/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html()))
        .mount(&server)
        .await;

    for (i, name) in FILES.iter().enumerate() {
        let first_id = (i as i64) * 1000;
        Mock::given(method("GET"))
            .and(path(format!("/fits/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(gaia_bytes(first_id, &["Gaia DR1 a", "Gaia DR1 b"])),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let listing = Url::parse(&format!("{}/fits/", server.uri())).unwrap();
    let client = HttpResourceClient::new(Duration::from_secs(5)).unwrap();

    let resources = CatalogIndex::new(client.client().clone(), ".fits")
        .resolve(&listing)
        .await
        .unwrap();
    assert_eq!(resources.len(), 5);
    assert_eq!(resources[0].file_name(), Some(FILES[0]));

    let download = DownloadManager::new(
        Arc::new(client),
        DownloadConfig::new(dir.path())
            .with_workers(100)
            .with_poll_interval(Duration::from_millis(20)),
    )
    .run(resources, CancellationToken::new())
    .await
    .unwrap();
    assert_eq!(download.downloaded(), 5);

    let files = discover_catalog_files(dir.path(), ".fits").unwrap();
    assert_eq!(files.len(), 5);

    let definition = SchemaInference::new(1)
        .infer_from_dir(dir.path(), ".fits", "gdr1_gaia_source_fits")
        .unwrap();
    assert!(definition
        .create_table_sql()
        .starts_with("CREATE TABLE `gdr1_gaia_source_fits` (\n  `source_id` BIGINT,"));

    let store = FakeStore::new();
    let report = CatalogLoader::new(Arc::new(store.clone()), definition, LoadConfig::default())
        .run(files)
        .await;

    assert_eq!(report.loaded(), 5);
    assert_eq!(report.rows_inserted(), 10);
    assert_eq!(store.rows().len(), 10);
}

#[tokio::test]
async fn test_listing_error_status_is_fatal() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex("^/fits/?$"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let listing = Url::parse(&format!("{}/fits/", server.uri())).unwrap();
    let err = CatalogIndex::new(reqwest::Client::new(), ".fits")
        .resolve(&listing)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolutionError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_unreachable_listing_is_request_error() {
    let listing = Url::parse("http://127.0.0.1:9/fits/").unwrap();
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let err = CatalogIndex::new(client, ".fits")
        .resolve(&listing)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolutionError::Request { .. }));
}
