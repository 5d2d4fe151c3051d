use crate::catalog::types::{CatalogDescriptor, CatalogPage, CatalogType, Item, StreamInfo};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the catalog source adapter
///
/// The crawler treats every one of these as a local failure scoped to the
/// item or catalog being processed.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Malformed data: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Classifies a reqwest error for the given URL
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else if err.is_decode() {
            Self::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Result type alias for source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Supplies catalogs, items and streams to the crawler
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Lists every catalog the addon's manifest advertises
    async fn fetch_manifest_catalogs(&self, addon_url: &str) -> SourceResult<Vec<CatalogDescriptor>>;

    /// Fetches one page of a catalog starting at `skip`
    async fn fetch_page(
        &self,
        addon_url: &str,
        catalog_id: &str,
        catalog_type: CatalogType,
        skip: usize,
    ) -> SourceResult<CatalogPage>;

    /// Requests the streams for an item from a stream addon
    async fn fetch_streams(&self, addon_url: &str, item: &Item) -> SourceResult<Vec<StreamInfo>>;

    /// Lists the episodes of a series
    async fn fetch_series_episodes(&self, addon_url: &str, series: &Item) -> SourceResult<Vec<Item>>;

    /// Issues a warm-up request against a stream URL and returns the HTTP status
    async fn probe_stream(&self, url: &str) -> SourceResult<u16>;
}
