//! In-memory catalog source for engine and pipeline tests

use crate::catalog::{
    CatalogDescriptor, CatalogPage, CatalogSource, CatalogType, Item, SourceError, SourceResult,
    StreamInfo,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A request received by [`MockCatalogSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Manifest(String),
    Page { catalog_id: String, skip: usize },
    Streams { addon_url: String, stream_id: String },
    Episodes(String),
    Probe(String),
}

#[derive(Default)]
struct MockState {
    manifests: HashMap<String, Vec<CatalogDescriptor>>,
    failed_manifests: HashSet<String>,
    /// Items per (addon, catalog id)
    catalogs: HashMap<(String, String), Vec<Item>>,
    failed_pages: HashMap<String, usize>,
    page_size: usize,
    streams: HashMap<String, Vec<StreamInfo>>,
    failed_streams: HashSet<String>,
    failed_stream_addons: HashSet<String>,
    episodes: HashMap<String, Vec<Item>>,
    failed_episodes: HashSet<String>,
    probe_status: HashMap<String, u16>,
    failed_probes: HashSet<String>,
    latency: Duration,
    calls: Vec<SourceCall>,
}

/// Scriptable [`CatalogSource`] that records every call
///
/// Unknown items answer with an empty stream list, which counts as a
/// successful prefetch. Probes answer 200 unless scripted otherwise. Clones
/// share state, so a test can keep a handle after giving one to an engine.
#[derive(Clone)]
pub struct MockCatalogSource {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockCatalogSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalogSource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                page_size: 100,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a catalog to an addon's manifest along with its items
    pub fn add_catalog(
        &self,
        addon_url: &str,
        catalog_id: &str,
        catalog_type: CatalogType,
        items: Vec<Item>,
    ) {
        let mut state = self.state();
        state
            .manifests
            .entry(addon_url.to_string())
            .or_default()
            .push(CatalogDescriptor {
                id: catalog_id.to_string(),
                name: catalog_id.to_string(),
                catalog_type: Some(catalog_type),
                search_only: false,
            });
        state
            .catalogs
            .insert((addon_url.to_string(), catalog_id.to_string()), items);
    }

    /// Adds a manifest entry that cannot be prefetched
    pub fn add_descriptor(&self, addon_url: &str, descriptor: CatalogDescriptor) {
        self.state()
            .manifests
            .entry(addon_url.to_string())
            .or_default()
            .push(descriptor);
    }

    /// Sets how many items each page holds
    pub fn set_page_size(&self, page_size: usize) {
        self.state().page_size = page_size.max(1);
    }

    /// Delays every request by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    pub fn fail_manifest(&self, addon_url: &str) {
        self.state().failed_manifests.insert(addon_url.to_string());
    }

    /// Fails page requests of a catalog from offset `from_skip` on
    pub fn fail_pages_from(&self, catalog_id: &str, from_skip: usize) {
        self.state()
            .failed_pages
            .insert(catalog_id.to_string(), from_skip);
    }

    pub fn set_streams(&self, stream_id: &str, streams: Vec<StreamInfo>) {
        self.state().streams.insert(stream_id.to_string(), streams);
    }

    pub fn fail_streams(&self, stream_id: &str) {
        self.state().failed_streams.insert(stream_id.to_string());
    }

    /// Fails every stream request sent to one addon
    pub fn fail_stream_addon(&self, addon_url: &str) {
        self.state()
            .failed_stream_addons
            .insert(addon_url.to_string());
    }

    pub fn set_episodes(&self, series_id: &str, episodes: Vec<Item>) {
        self.state().episodes.insert(series_id.to_string(), episodes);
    }

    pub fn fail_episodes(&self, series_id: &str) {
        self.state().failed_episodes.insert(series_id.to_string());
    }

    pub fn set_probe_status(&self, url: &str, status: u16) {
        self.state().probe_status.insert(url.to_string(), status);
    }

    pub fn fail_probe(&self, url: &str) {
        self.state().failed_probes.insert(url.to_string());
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<SourceCall> {
        self.state().calls.clone()
    }

    /// Stream ids requested so far, in order
    pub fn stream_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SourceCall::Streams { stream_id, .. } => Some(stream_id),
                _ => None,
            })
            .collect()
    }

    /// Warm-up URLs probed so far, in order
    pub fn probed_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SourceCall::Probe(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Page offsets requested for a catalog, in order
    pub fn page_requests(&self, catalog_id: &str) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SourceCall::Page { catalog_id: id, skip } if id == catalog_id => Some(skip),
                _ => None,
            })
            .collect()
    }

    /// Records the call and returns the configured latency
    fn record(&self, call: SourceCall) -> Duration {
        let mut state = self.state();
        state.calls.push(call);
        state.latency
    }

    async fn simulate_latency(&self, latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    async fn fetch_manifest_catalogs(&self, addon_url: &str) -> SourceResult<Vec<CatalogDescriptor>> {
        let latency = self.record(SourceCall::Manifest(addon_url.to_string()));
        self.simulate_latency(latency).await;

        let state = self.state();
        if state.failed_manifests.contains(addon_url) {
            return Err(SourceError::Status {
                status: 500,
                url: format!("{}/manifest.json", addon_url),
            });
        }
        Ok(state.manifests.get(addon_url).cloned().unwrap_or_default())
    }

    async fn fetch_page(
        &self,
        addon_url: &str,
        catalog_id: &str,
        _catalog_type: CatalogType,
        skip: usize,
    ) -> SourceResult<CatalogPage> {
        let latency = self.record(SourceCall::Page {
            catalog_id: catalog_id.to_string(),
            skip,
        });
        self.simulate_latency(latency).await;

        let state = self.state();
        if let Some(&from) = state.failed_pages.get(catalog_id) {
            if skip >= from {
                return Err(SourceError::Status {
                    status: 500,
                    url: format!("{}/catalog/{}/skip={}.json", addon_url, catalog_id, skip),
                });
            }
        }

        let items = state
            .catalogs
            .get(&(addon_url.to_string(), catalog_id.to_string()))
            .map(|all| {
                all.iter()
                    .skip(skip)
                    .take(state.page_size)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let has_more = !items.is_empty();
        Ok(CatalogPage::new(items, has_more))
    }

    async fn fetch_streams(&self, addon_url: &str, item: &Item) -> SourceResult<Vec<StreamInfo>> {
        let stream_id = item.stream_id();
        let latency = self.record(SourceCall::Streams {
            addon_url: addon_url.to_string(),
            stream_id: stream_id.clone(),
        });
        self.simulate_latency(latency).await;

        let state = self.state();
        if state.failed_stream_addons.contains(addon_url) || state.failed_streams.contains(&stream_id) {
            return Err(SourceError::Http(format!("connection refused: {}", stream_id)));
        }
        Ok(state.streams.get(&stream_id).cloned().unwrap_or_default())
    }

    async fn fetch_series_episodes(&self, _addon_url: &str, series: &Item) -> SourceResult<Vec<Item>> {
        let latency = self.record(SourceCall::Episodes(series.external_id.clone()));
        self.simulate_latency(latency).await;

        let state = self.state();
        if state.failed_episodes.contains(&series.external_id) {
            return Err(SourceError::Malformed(format!(
                "no meta for {}",
                series.external_id
            )));
        }
        Ok(state
            .episodes
            .get(&series.external_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn probe_stream(&self, url: &str) -> SourceResult<u16> {
        let latency = self.record(SourceCall::Probe(url.to_string()));
        self.simulate_latency(latency).await;

        let state = self.state();
        if state.failed_probes.contains(url) {
            return Err(SourceError::Timeout(url.to_string()));
        }
        Ok(state.probe_status.get(url).copied().unwrap_or(200))
    }
}
