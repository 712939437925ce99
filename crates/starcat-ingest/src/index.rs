//! Catalog listing resolution
//!
//! Resolves an HTTP directory listing into the ordered set of catalog file
//! URLs it links to. Matching is by href suffix, so `index.html`, sort links
//! and parent-directory anchors are ignored.

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

/// Error types for listing resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Failed to fetch listing {url}: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Listing {url} returned HTTP {status}")]
    Status { url: Url, status: u16 },

    #[error("Invalid link selector: {0}")]
    Selector(String),
}

/// A catalog file on the remote server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteResource {
    pub url: Url,
}

impl RemoteResource {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// Last non-empty path segment, used unmodified as the local file name
    pub fn file_name(&self) -> Option<&str> {
        self.url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()
    }
}

/// Resolves a listing page into [`RemoteResource`]s
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    client: Client,
    extension: String,
}

impl CatalogIndex {
    pub fn new(client: Client, extension: impl Into<String>) -> Self {
        Self {
            client,
            extension: extension.into(),
        }
    }

    /// Fetch `listing` and return every linked catalog file in document order
    pub async fn resolve(&self, listing: &Url) -> Result<Vec<RemoteResource>, ResolutionError> {
        info!(url = %listing, "Resolving catalog listing");

        let request_err = |source| ResolutionError::Request {
            url: listing.clone(),
            source,
        };

        let response = self
            .client
            .get(listing.clone())
            .send()
            .await
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::Status {
                url: listing.clone(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(request_err)?;
        let resources = extract_links(&html, listing, &self.extension)?;

        info!(
            url = %listing,
            count = resources.len(),
            extension = %self.extension,
            "Resolved catalog listing"
        );

        Ok(resources)
    }
}

/// Collect `<a href>` targets ending with `extension`, resolved against `base`
pub fn extract_links(
    html: &str,
    base: &Url,
    extension: &str,
) -> Result<Vec<RemoteResource>, ResolutionError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("a[href]").map_err(|e| ResolutionError::Selector(e.to_string()))?;

    let mut resources = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.ends_with(extension) {
            continue;
        }

        match base.join(href) {
            Ok(url) => {
                debug!(url = %url, "Discovered catalog file");
                resources.push(RemoteResource::new(url));
            }
            Err(e) => warn!(href = href, error = %e, "Skipping unresolvable link"),
        }
    }

    Ok(resources)
}
