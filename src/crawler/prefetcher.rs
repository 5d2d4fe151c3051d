//! Prefetching of a single item

use crate::catalog::{CatalogSource, Item};
use crate::config::RunConfig;
use crate::crawler::warmer::{StreamWarmer, WarmBudget, WarmOutcome};
use crate::storage::{Storage, StorageResult};
use chrono::Utc;
use tracing::{debug, warn};

/// Result of prefetching one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Still fresh, no request was made
    Cached,
    /// A stream addon answered
    Prefetched,
    /// Every stream addon failed
    Failed,
}

/// Outcome plus the request counters behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchReport {
    pub outcome: ItemOutcome,
    pub stream_requests_sent: u32,
    pub stream_requests_successful: u32,
    pub warm: WarmOutcome,
}

impl PrefetchReport {
    fn cached() -> Self {
        Self {
            outcome: ItemOutcome::Cached,
            stream_requests_sent: 0,
            stream_requests_successful: 0,
            warm: WarmOutcome::default(),
        }
    }

    /// Whether any network request was made for the item
    pub fn performed_io(&self) -> bool {
        self.stream_requests_sent > 0
    }
}

/// Requests an item's streams from the stream addons and records freshness
pub struct ItemPrefetcher<'a> {
    source: &'a dyn CatalogSource,
    config: &'a RunConfig,
}

impl<'a> ItemPrefetcher<'a> {
    pub fn new(source: &'a dyn CatalogSource, config: &'a RunConfig) -> Self {
        Self { source, config }
    }

    /// Checks the freshness cache for an item
    pub fn is_fresh(&self, storage: &dyn Storage, item: &Item) -> StorageResult<bool> {
        storage.is_fresh(&item.key(), self.config.cache_validity, Utc::now())
    }

    /// Prefetches one movie or episode
    ///
    /// Network failures become a `Failed` outcome. Only storage errors are
    /// returned, since without the freshness store the run cannot continue.
    pub async fn prefetch(
        &self,
        item: &Item,
        storage: &mut dyn Storage,
        budget: &mut WarmBudget,
    ) -> StorageResult<PrefetchReport> {
        if self.is_fresh(storage, item)? {
            debug!("{} is fresh, skipping", item.title);
            return Ok(PrefetchReport::cached());
        }

        let report = self.fetch_streams(item, budget).await;

        if report.outcome == ItemOutcome::Prefetched {
            storage.mark_prefetched(&item.key(), Some(&item.title), Utc::now())?;
        }

        Ok(report)
    }

    /// Requests streams without consulting or updating the freshness cache
    ///
    /// Addons are tried in order until one answers; only that answer is
    /// warmed, so the per-item warm quota holds across addons.
    pub async fn fetch_streams(&self, item: &Item, budget: &mut WarmBudget) -> PrefetchReport {
        let warming = &self.config.warming;
        let warmer = StreamWarmer::new(self.source, warming, self.config.delay);

        let mut report = PrefetchReport {
            outcome: ItemOutcome::Failed,
            stream_requests_sent: 0,
            stream_requests_successful: 0,
            warm: WarmOutcome::default(),
        };

        for addon in &self.config.stream_addons {
            report.stream_requests_sent += 1;
            match self.source.fetch_streams(addon, item).await {
                Ok(streams) => {
                    report.stream_requests_successful += 1;
                    report.outcome = ItemOutcome::Prefetched;
                    debug!("{}: {} streams from {}", item.title, streams.len(), addon);

                    if warming.enabled && !streams.is_empty() {
                        report.warm = warmer.warm(&item.title, &streams, budget).await;
                    }
                    break;
                }
                Err(e) => {
                    warn!("Stream request for {} at {} failed: {}", item.title, addon, e);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StreamInfo;
    use crate::storage::{CacheValidity, SqliteStorage};
    use crate::testing::MockCatalogSource;
    use std::time::Duration;

    const STREAMS: &str = "https://streams.example.com";

    fn config() -> RunConfig {
        RunConfig::new(vec![], vec![STREAMS.to_string()])
    }

    #[tokio::test]
    async fn test_prefetch_marks_fresh() {
        let source = MockCatalogSource::new();
        let config = config();
        let prefetcher = ItemPrefetcher::new(&source, &config);
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut budget = WarmBudget::new(0);
        let item = Item::movie("tt1", "One");

        let report = prefetcher.prefetch(&item, &mut storage, &mut budget).await.unwrap();
        assert_eq!(report.outcome, ItemOutcome::Prefetched);
        assert!(report.performed_io());
        assert!(prefetcher.is_fresh(&storage, &item).unwrap());

        let again = prefetcher.prefetch(&item, &mut storage, &mut budget).await.unwrap();
        assert_eq!(again.outcome, ItemOutcome::Cached);
        assert!(!again.performed_io());
        assert_eq!(source.stream_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_prefetch_is_not_marked() {
        let source = MockCatalogSource::new();
        source.fail_streams("tt1");
        let config = config();
        let prefetcher = ItemPrefetcher::new(&source, &config);
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut budget = WarmBudget::new(0);
        let item = Item::movie("tt1", "One");

        let report = prefetcher.prefetch(&item, &mut storage, &mut budget).await.unwrap();
        assert_eq!(report.outcome, ItemOutcome::Failed);
        assert!(!prefetcher.is_fresh(&storage, &item).unwrap());
    }

    #[tokio::test]
    async fn test_any_stream_addon_success_counts() {
        let source = MockCatalogSource::new();
        source.fail_stream_addon("https://broken.example.com");
        let config = RunConfig::new(
            vec![],
            vec!["https://broken.example.com".to_string(), STREAMS.to_string()],
        );
        let prefetcher = ItemPrefetcher::new(&source, &config);
        let mut budget = WarmBudget::new(0);

        let report = prefetcher
            .fetch_streams(&Item::movie("tt1", "One"), &mut budget)
            .await;
        assert_eq!(report.outcome, ItemOutcome::Prefetched);
        assert_eq!(report.stream_requests_sent, 2);
        assert_eq!(report.stream_requests_successful, 1);
    }

    #[tokio::test]
    async fn test_zero_validity_always_refetches() {
        let source = MockCatalogSource::new();
        let mut config = config();
        config.cache_validity = CacheValidity::Window(Duration::ZERO);
        let prefetcher = ItemPrefetcher::new(&source, &config);
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut budget = WarmBudget::new(0);
        let item = Item::movie("tt1", "One");

        prefetcher.prefetch(&item, &mut storage, &mut budget).await.unwrap();
        let again = prefetcher.prefetch(&item, &mut storage, &mut budget).await.unwrap();
        assert_eq!(again.outcome, ItemOutcome::Prefetched);
    }

    #[tokio::test]
    async fn test_warming_runs_when_enabled() {
        let source = MockCatalogSource::new();
        source.set_streams(
            "tt1",
            vec![StreamInfo {
                name: "Torrent".to_string(),
                description: String::new(),
                url: Some("https://cdn.example.com/a".to_string()),
            }],
        );
        let mut config = config();
        config.warming.enabled = true;
        config.warming.max_requests_per_item = 1;
        let prefetcher = ItemPrefetcher::new(&source, &config);
        let mut budget = WarmBudget::new(5);

        let report = prefetcher
            .fetch_streams(&Item::movie("tt1", "One"), &mut budget)
            .await;
        assert_eq!(report.warm.sent, 1);
        assert_eq!(budget.remaining(), 4);
    }

    #[tokio::test]
    async fn test_first_answering_addon_ends_item() {
        let source = MockCatalogSource::new();
        source.set_streams(
            "tt1",
            (0..4)
                .map(|i| StreamInfo {
                    name: format!("Torrent {}", i),
                    description: String::new(),
                    url: Some(format!("https://cdn.example.com/{}", i)),
                })
                .collect(),
        );
        let mut config = RunConfig::new(
            vec![],
            vec![STREAMS.to_string(), "https://mirror.example.com".to_string()],
        );
        config.warming.enabled = true;
        config.warming.max_requests_per_item = 1;
        let prefetcher = ItemPrefetcher::new(&source, &config);
        let mut budget = WarmBudget::new(10);

        let report = prefetcher
            .fetch_streams(&Item::movie("tt1", "One"), &mut budget)
            .await;
        assert_eq!(report.outcome, ItemOutcome::Prefetched);
        assert_eq!(report.stream_requests_sent, 1);
        assert_eq!(report.warm.sent, 1);
        assert_eq!(source.probed_urls(), vec!["https://cdn.example.com/0"]);
    }
}
