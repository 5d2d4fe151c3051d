//! HTTP catalog source for Stremio-style addons
//!
//! Endpoints used:
//! - `{addon}/manifest.json` for the catalog list
//! - `{addon}/catalog/{type}/{id}/skip={n}.json` for catalog pages
//! - `{addon}/meta/series/{id}.json` for series episodes
//! - `{addon}/stream/{type}/{id}.json` for streams

use crate::catalog::source::{CatalogSource, SourceError, SourceResult};
use crate::catalog::types::{
    CatalogDescriptor, CatalogPage, CatalogType, Item, ItemType, StreamInfo,
};
use crate::config::{parse_time_string, HttpConfig};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    catalogs: Vec<ManifestCatalog>,
}

#[derive(Debug, Deserialize)]
struct ManifestCatalog {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    extra: Vec<ManifestExtra>,
}

#[derive(Debug, Deserialize)]
struct ManifestExtra {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    metas: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    meta: Option<MetaDetail>,
}

#[derive(Debug, Deserialize)]
struct MetaDetail {
    #[serde(default)]
    videos: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Builds the shared HTTP client
///
/// # Arguments
///
/// * `config` - The HTTP section of the configuration
///
/// # Returns
///
/// * `Ok(Client)` - Client with user agent, timeout and optional proxy applied
/// * `Err(PrefetchError)` - Bad timeout string or the client could not be built
pub fn build_http_client(config: &HttpConfig) -> crate::Result<Client> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = parse_time_string(&config.request_timeout)?.as_duration() {
        builder = builder.timeout(timeout).connect_timeout(timeout);
    }

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    Ok(builder.build()?)
}

/// Catalog source that talks to addons over HTTP
#[derive(Debug, Clone)]
pub struct AddonClient {
    client: Client,
    /// Type segment each manifest declared, keyed by (addon, catalog id)
    manifest_types: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl AddonClient {
    /// Creates a client from the HTTP configuration
    pub fn new(config: &HttpConfig) -> crate::Result<Self> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    /// Wraps an already configured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            manifest_types: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Path segment for a catalog page request
    ///
    /// Uses the type the manifest declared when it has been seen, since mixed
    /// catalogs are served under their own type name (e.g. "anime" or "all").
    fn catalog_path_type(&self, addon_url: &str, catalog_id: &str, catalog_type: CatalogType) -> String {
        let key = (addon_url.to_string(), catalog_id.to_string());
        if let Some(kind) = self
            .manifest_types
            .lock()
            .ok()
            .and_then(|types| types.get(&key).cloned())
        {
            return kind;
        }
        match catalog_type {
            CatalogType::Series => "series".to_string(),
            CatalogType::Movie => "movie".to_string(),
            CatalogType::Mixed => "all".to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SourceResult<T> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))
    }
}

/// Extracts an IMDb-style id from a catalog meta
fn extract_external_id(meta: &Value) -> Option<String> {
    ["imdb_id", "id"]
        .iter()
        .filter_map(|key| meta.get(key).and_then(Value::as_str))
        .find(|id| id.starts_with("tt"))
        .map(str::to_string)
}

/// Builds "Name (Year)" with the year from `year` or the start of `released`
fn display_title(meta: &Value) -> String {
    let name = meta
        .get("name")
        .or_else(|| meta.get("title"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown Title");

    let year = match meta.get("year") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => meta
            .get("released")
            .and_then(Value::as_str)
            .and_then(|r| r.get(..4))
            .map(str::to_string),
    };

    match year {
        Some(year) => format!("{} ({})", name, year),
        None => name.to_string(),
    }
}

/// Normalizes a catalog meta into an item, dropping entries that cannot be prefetched
fn item_from_meta(meta: &Value, catalog_type: CatalogType) -> Option<Item> {
    let external_id = extract_external_id(meta)?;
    let item_type = match meta.get("type").and_then(Value::as_str) {
        Some("movie") => ItemType::Movie,
        Some("series") => ItemType::Series,
        _ => match catalog_type {
            CatalogType::Movie => ItemType::Movie,
            CatalogType::Series => ItemType::Series,
            CatalogType::Mixed => return None,
        },
    };
    let title = display_title(meta);

    Some(match item_type {
        ItemType::Series => Item::series(external_id, title),
        _ => Item::movie(external_id, title),
    })
}

fn as_u32(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

#[async_trait]
impl CatalogSource for AddonClient {
    async fn fetch_manifest_catalogs(&self, addon_url: &str) -> SourceResult<Vec<CatalogDescriptor>> {
        let addon_url = addon_url.trim_end_matches('/');
        let url = format!("{}/manifest.json", addon_url);
        let manifest: Manifest = self.get_json(&url).await?;

        if let Ok(mut types) = self.manifest_types.lock() {
            for c in &manifest.catalogs {
                types.insert((addon_url.to_string(), c.id.clone()), c.kind.clone());
            }
        }

        Ok(manifest
            .catalogs
            .into_iter()
            .map(|c| {
                let kind = c.kind.to_lowercase();
                CatalogDescriptor {
                    name: c.name.unwrap_or_else(|| c.id.clone()),
                    id: c.id,
                    catalog_type: CatalogType::from_manifest_str(&kind),
                    search_only: c.extra.len() == 1 && c.extra[0].name == "search",
                }
            })
            .collect())
    }

    async fn fetch_page(
        &self,
        addon_url: &str,
        catalog_id: &str,
        catalog_type: CatalogType,
        skip: usize,
    ) -> SourceResult<CatalogPage> {
        let addon_url = addon_url.trim_end_matches('/');
        let path_type = self.catalog_path_type(addon_url, catalog_id, catalog_type);
        let url = format!(
            "{}/catalog/{}/{}/skip={}.json",
            addon_url,
            path_type,
            catalog_id,
            skip
        );
        let response: CatalogResponse = self.get_json(&url).await?;

        let fetched = response.metas.len();
        let items: Vec<Item> = response
            .metas
            .iter()
            .filter_map(|meta| item_from_meta(meta, catalog_type))
            .collect();

        if items.len() < fetched {
            debug!(
                "Dropped {} malformed entries from {}",
                fetched - items.len(),
                url
            );
        }

        Ok(CatalogPage {
            items,
            fetched,
            has_more: fetched > 0,
        })
    }

    async fn fetch_streams(&self, addon_url: &str, item: &Item) -> SourceResult<Vec<StreamInfo>> {
        let url = format!(
            "{}/stream/{}/{}.json",
            addon_url.trim_end_matches('/'),
            item.item_type.stream_path(),
            item.stream_id()
        );
        let response: StreamResponse = self.get_json(&url).await?;

        Ok(response
            .streams
            .into_iter()
            .map(|s| StreamInfo {
                name: s.name.unwrap_or_default(),
                description: s.description.or(s.title).unwrap_or_default(),
                url: s.url,
            })
            .collect())
    }

    async fn fetch_series_episodes(&self, addon_url: &str, series: &Item) -> SourceResult<Vec<Item>> {
        let url = format!(
            "{}/meta/series/{}.json",
            addon_url.trim_end_matches('/'),
            series.external_id
        );
        let response: MetaResponse = self.get_json(&url).await?;
        let meta = response
            .meta
            .ok_or_else(|| SourceError::Malformed(format!("no meta object in {}", url)))?;

        Ok(meta
            .videos
            .iter()
            .filter_map(|video| {
                let season = as_u32(video.get("season"))?;
                let episode = as_u32(video.get("episode").or_else(|| video.get("number")))?;
                Some(Item::episode(
                    series.external_id.clone(),
                    format!("{} S{:02}E{:02}", series.title, season, episode),
                    season,
                    episode,
                ))
            })
            .collect())
    }

    async fn probe_stream(&self, url: &str) -> SourceResult<u16> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?;
        Ok(response.status().as_u16())
    }
}
