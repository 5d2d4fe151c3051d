//! Crawl pipeline - main prefetch orchestration logic
//!
//! This module contains the main crawl loop that coordinates a run:
//! - Resolving the catalog selection against the addon manifests
//! - Paging through each catalog under the per-catalog and global limits
//! - Prefetching movies directly and series episode by episode
//! - Polling pause, cancel and the time budget between pages and items
//! - Publishing progress snapshots as the run advances

use crate::catalog::{CatalogDescriptor, CatalogSelection, CatalogSource, Item, ItemType};
use crate::config::RunConfig;
use crate::crawler::checkpoint::{Checkpoint, RunControl};
use crate::crawler::limits::{CatalogQuota, LimitTracker};
use crate::crawler::prefetcher::{ItemOutcome, ItemPrefetcher, PrefetchReport};
use crate::crawler::progress::{ProgressPhase, ProgressSnapshot};
use crate::crawler::warmer::WarmBudget;
use crate::output::{CatalogStats, RunStatistics, StopReason};
use crate::storage::Storage;
use crate::PrefetchError;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Share of fresh episodes at which a whole series counts as cached
const SERIES_FRESH_RATIO: f64 = 0.75;

/// Statistics collected by a pipeline, available however the run ended
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub statistics: RunStatistics,
    /// Catalogs the run reached, in processing order
    pub processed_catalogs: Vec<CatalogStats>,
    pub discovery_duration: Duration,
    pub processing_duration: Duration,
}

/// Result of dispatching one catalog item
struct Dispatched {
    outcome: ItemOutcome,
    performed_io: bool,
    /// Set when a checkpoint inside a series asked the run to stop
    stop: Option<StopReason>,
}

impl Dispatched {
    fn done(outcome: ItemOutcome, performed_io: bool) -> Self {
        Self {
            outcome,
            performed_io,
            stop: None,
        }
    }
}

/// Runs one prefetch pass over the selected catalogs
///
/// All state it mutates (statistics, freshness cache, warm budget) is owned or
/// exclusively borrowed, so exactly one pipeline works on a store at a time.
pub struct CrawlPipeline<'a> {
    source: &'a dyn CatalogSource,
    storage: &'a mut dyn Storage,
    config: &'a RunConfig,
    control: &'a dyn RunControl,
    progress: &'a watch::Sender<ProgressSnapshot>,
    statistics: RunStatistics,
    catalogs: Vec<CatalogStats>,
    tracker: LimitTracker,
    warm_budget: WarmBudget,
    started: Instant,
    discovery_duration: Duration,
    processing_duration: Duration,
}

impl<'a> CrawlPipeline<'a> {
    pub fn new(
        source: &'a dyn CatalogSource,
        storage: &'a mut dyn Storage,
        config: &'a RunConfig,
        control: &'a dyn RunControl,
        progress: &'a watch::Sender<ProgressSnapshot>,
    ) -> Self {
        let warm_requests = if config.warming.enabled {
            config.warming.max_requests_global
        } else {
            0
        };

        Self {
            source,
            storage,
            config,
            control,
            progress,
            statistics: RunStatistics::default(),
            catalogs: Vec::new(),
            tracker: LimitTracker::new(config.limits),
            warm_budget: WarmBudget::new(warm_requests),
            started: Instant::now(),
            discovery_duration: Duration::ZERO,
            processing_duration: Duration::ZERO,
        }
    }

    /// Runs the crawl until the catalogs are exhausted or a checkpoint stops it
    ///
    /// Network failures are counted and never returned. An error means the
    /// freshness store failed and the run cannot continue.
    pub async fn run(&mut self) -> Result<StopReason, PrefetchError> {
        self.started = Instant::now();
        let limits = *self.tracker.limits();
        self.publish(|p| {
            *p = ProgressSnapshot {
                phase: ProgressPhase::Discovering,
                movies_global_limit: limits.movies_global.as_config(),
                series_global_limit: limits.series_global.as_config(),
                ..Default::default()
            };
        });

        let selections = self.discover().await;
        self.discovery_duration = self.started.elapsed();
        info!(
            "Discovery finished: {} of {} enabled catalogs selected",
            selections.len(),
            self.config.enabled_catalogs().count()
        );

        let processing_started = Instant::now();
        let total = selections.len();
        let mut stop = None;

        for (index, selection) in selections.iter().enumerate() {
            if let Some(reason) = self.checkpoint().await {
                stop = Some(reason);
                break;
            }

            if self.tracker.catalog_exhausted(selection.catalog_type) {
                debug!(
                    "Skipping catalog {}: global {} limit reached",
                    selection.name, selection.catalog_type
                );
                continue;
            }

            if let Some(reason) = self.process_catalog(index, total, selection).await? {
                stop = Some(reason);
                break;
            }
        }

        self.processing_duration = processing_started.elapsed();
        self.publish(|p| {
            p.phase = ProgressPhase::Finished;
            p.current_item = None;
            p.current_item_type = None;
        });

        let reason = stop.unwrap_or(StopReason::Completed);
        info!(
            "Crawl stopped ({}): {} movies, {} series, {} episodes prefetched, {} cached, {} failed",
            reason,
            self.statistics.movies_prefetched,
            self.statistics.series_prefetched,
            self.statistics.episodes_prefetched,
            self.statistics.cached_count,
            self.statistics.failed_count
        );
        Ok(reason)
    }

    /// Consumes the pipeline and returns what it collected
    pub fn into_outcome(self) -> CrawlOutcome {
        CrawlOutcome {
            statistics: self.statistics,
            processed_catalogs: self.catalogs,
            discovery_duration: self.discovery_duration,
            processing_duration: self.processing_duration,
        }
    }

    /// Orders the enabled selections and keeps those the manifests can serve
    async fn discover(&mut self) -> Vec<CatalogSelection> {
        let mut selections: Vec<CatalogSelection> =
            self.config.enabled_catalogs().cloned().collect();

        if self.config.randomize_catalogs {
            selections.shuffle(&mut rand::thread_rng());
        } else {
            selections.sort_by_key(|c| c.order);
        }

        // One manifest request per addon; None when it failed
        let mut manifests: HashMap<String, Option<Vec<CatalogDescriptor>>> = HashMap::new();
        for selection in &selections {
            if manifests.contains_key(&selection.addon_url) {
                continue;
            }
            let manifest = match self.source.fetch_manifest_catalogs(&selection.addon_url).await {
                Ok(descriptors) => {
                    let filtered = descriptors.iter().filter(|d| !d.is_prefetchable()).count();
                    self.statistics.total_catalogs_in_manifest += descriptors.len() as u64;
                    self.statistics.filtered_catalogs += filtered as u64;
                    debug!(
                        "Manifest of {} lists {} catalogs ({} not prefetchable)",
                        selection.addon_url,
                        descriptors.len(),
                        filtered
                    );
                    Some(descriptors)
                }
                Err(e) => {
                    warn!("Failed to fetch manifest of {}: {}", selection.addon_url, e);
                    None
                }
            };
            manifests.insert(selection.addon_url.clone(), manifest);
        }

        let mut selected = Vec::with_capacity(selections.len());
        for selection in selections {
            let Some(descriptors) = manifests.get(&selection.addon_url).and_then(|m| m.as_ref())
            else {
                warn!(
                    "Skipping catalog {}: manifest of {} unavailable",
                    selection.catalog_id, selection.addon_url
                );
                self.statistics.errors += 1;
                continue;
            };

            match find_descriptor(descriptors, &selection) {
                Some(descriptor) if descriptor.is_prefetchable() => selected.push(selection),
                Some(_) => {
                    warn!(
                        "Catalog {} of {} cannot be prefetched, skipping",
                        selection.catalog_id, selection.addon_url
                    );
                }
                None => {
                    warn!(
                        "Catalog {} not found in manifest of {}",
                        selection.catalog_id, selection.addon_url
                    );
                    self.statistics.errors += 1;
                }
            }
        }

        self.statistics.selected_catalogs = selected.len() as u64;
        selected
    }

    /// Pages through one catalog
    ///
    /// Returns the stop reason when a checkpoint ends the whole run.
    async fn process_catalog(
        &mut self,
        index: usize,
        total: usize,
        selection: &CatalogSelection,
    ) -> Result<Option<StopReason>, PrefetchError> {
        let catalog_type = selection.catalog_type;
        let mut quota = CatalogQuota::new(self.config.limits.per_catalog(catalog_type));
        let mut stats = CatalogStats::new(&selection.name, &selection.catalog_id, catalog_type);
        let catalog_started = Instant::now();
        let mut seen: HashSet<String> = HashSet::new();
        let mut skip = 0usize;
        let mut page_number = 0u32;

        info!(
            "Processing catalog {}/{}: {} ({})",
            index + 1,
            total,
            selection.name,
            catalog_type
        );
        let catalog_limit = quota.limit().as_config();
        self.publish(|p| {
            p.catalog_index = index + 1;
            p.total_catalogs = total;
            p.current_catalog = Some(selection.name.clone());
            p.current_catalog_type = Some(catalog_type);
            p.catalog_prefetched = 0;
            p.catalog_limit = catalog_limit;
            p.page_number = 0;
        });

        let stop = loop {
            if let Some(reason) = self.checkpoint().await {
                break Some(reason);
            }
            if quota.is_reached() {
                debug!("Catalog limit reached for {}", selection.name);
                break None;
            }
            if self.tracker.catalog_exhausted(catalog_type) {
                debug!("Global limits exhausted during {}", selection.name);
                break None;
            }

            page_number += 1;
            self.publish(|p| {
                p.phase = ProgressPhase::FetchingPage;
                p.page_number = page_number;
                p.page_items_discovered = 0;
                p.page_items_processed = 0;
                p.current_item = None;
                p.current_item_type = None;
            });

            let page = match self
                .source
                .fetch_page(&selection.addon_url, &selection.catalog_id, catalog_type, skip)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Page {} of {} failed, abandoning catalog: {}",
                        page_number, selection.name, e
                    );
                    stats.error = Some(e.to_string());
                    self.statistics.errors += 1;
                    break None;
                }
            };
            self.statistics.total_pages_fetched += 1;

            if page.fetched == 0 {
                debug!("Catalog {} has no more items", selection.name);
                break None;
            }
            skip += page.fetched;
            let has_more = page.has_more;

            let had_items = !page.items.is_empty();
            let mut items: Vec<Item> = page
                .items
                .into_iter()
                .filter(|item| seen.insert(item.key()))
                .collect();
            if items.is_empty() && had_items {
                debug!("Catalog {} returned only known items, stopping", selection.name);
                break None;
            }

            if self.config.randomize_items {
                items.shuffle(&mut rand::thread_rng());
            }

            let discovered = items.len();
            self.publish(|p| {
                p.phase = ProgressPhase::ProcessingItems;
                p.page_items_discovered = discovered;
            });

            if let Some(reason) = self
                .process_items(selection, &items, &mut quota, &mut stats)
                .await?
            {
                break Some(reason);
            }

            if !has_more {
                break None;
            }
        };

        stats.finish(catalog_started.elapsed().as_secs_f64());
        info!(
            "Finished catalog {}: {} prefetched, {} cached, {} failed",
            selection.name, stats.success_count, stats.cached_count, stats.failed_count
        );
        self.catalogs.push(stats);

        Ok(stop)
    }

    async fn process_items(
        &mut self,
        selection: &CatalogSelection,
        items: &[Item],
        quota: &mut CatalogQuota,
        stats: &mut CatalogStats,
    ) -> Result<Option<StopReason>, PrefetchError> {
        for (position, item) in items.iter().enumerate() {
            if let Some(reason) = self.checkpoint().await {
                return Ok(Some(reason));
            }
            if quota.is_reached() || self.tracker.catalog_exhausted(selection.catalog_type) {
                break;
            }
            if !self.tracker.item_allowed(item.item_type) {
                debug!("Skipping {}: global {} limit reached", item.title, item.item_type);
                self.statistics.items_skipped_by_limit += 1;
                continue;
            }

            self.publish(|p| {
                p.current_item = Some(item.title.clone());
                p.current_item_type = Some(item.item_type);
            });

            let dispatched = match item.item_type {
                ItemType::Series => self.prefetch_series(&selection.addon_url, item, stats).await?,
                ItemType::Movie | ItemType::Episode => self.prefetch_single(item, stats).await?,
            };

            match dispatched.outcome {
                ItemOutcome::Prefetched => {
                    quota.record_success();
                    self.tracker.record_success(item.item_type);
                    stats.success_count += 1;
                    match item.item_type {
                        ItemType::Movie => self.statistics.movies_prefetched += 1,
                        ItemType::Series => self.statistics.series_prefetched += 1,
                        ItemType::Episode => self.statistics.episodes_prefetched += 1,
                    }
                    debug!("Prefetched {} ({})", item.title, item.item_type);
                }
                ItemOutcome::Cached => {
                    self.statistics.cached_count += 1;
                    stats.cached_count += 1;
                }
                ItemOutcome::Failed => {
                    self.statistics.failed_count += 1;
                    stats.failed_count += 1;
                }
            }

            let catalog_prefetched = quota.successes();
            self.publish(|p| {
                p.page_items_processed = position + 1;
                p.catalog_prefetched = catalog_prefetched;
            });

            if dispatched.stop.is_some() {
                return Ok(dispatched.stop);
            }

            if dispatched.performed_io {
                self.pause_between_requests().await;
            }
        }

        Ok(None)
    }

    async fn prefetch_single(
        &mut self,
        item: &Item,
        stats: &mut CatalogStats,
    ) -> Result<Dispatched, PrefetchError> {
        let prefetcher = ItemPrefetcher::new(self.source, self.config);
        let report = prefetcher
            .prefetch(item, &mut *self.storage, &mut self.warm_budget)
            .await?;
        self.absorb(&report, stats);
        Ok(Dispatched::done(report.outcome, report.performed_io()))
    }

    /// Prefetches a series through its episodes
    ///
    /// Freshness is tracked per episode only. The series counts as cached when
    /// most episodes are fresh, as a success when any pending episode was
    /// prefetched, and as a failure otherwise.
    async fn prefetch_series(
        &mut self,
        addon_url: &str,
        series: &Item,
        stats: &mut CatalogStats,
    ) -> Result<Dispatched, PrefetchError> {
        let prefetcher = ItemPrefetcher::new(self.source, self.config);
        let episodes = match self.source.fetch_series_episodes(addon_url, series).await {
            Ok(episodes) if !episodes.is_empty() => episodes,
            Ok(_) => {
                warn!("No episodes found for {}", series.title);
                return Ok(Dispatched::done(ItemOutcome::Failed, true));
            }
            Err(e) => {
                warn!("Failed to list episodes of {}: {}", series.title, e);
                return Ok(Dispatched::done(ItemOutcome::Failed, true));
            }
        };
        self.statistics.episodes_found += episodes.len() as u64;

        let mut pending = Vec::new();
        for episode in &episodes {
            if !prefetcher.is_fresh(&*self.storage, episode)? {
                pending.push(episode);
            }
        }

        let fresh = episodes.len() - pending.len();
        if fresh as f64 >= episodes.len() as f64 * SERIES_FRESH_RATIO {
            debug!(
                "{}: {}/{} episodes fresh, counting as cached",
                series.title,
                fresh,
                episodes.len()
            );
            return Ok(Dispatched::done(ItemOutcome::Cached, true));
        }

        let mut succeeded = 0u64;
        let mut stop = None;
        for (n, episode) in pending.iter().enumerate() {
            if n > 0 {
                if let Some(reason) = self.checkpoint().await {
                    stop = Some(reason);
                    break;
                }
            }
            // Paces the episode listing as well as every earlier episode
            self.pause_between_requests().await;

            self.publish(|p| {
                p.current_item = Some(episode.title.clone());
                p.current_item_type = Some(ItemType::Episode);
            });

            let report = prefetcher
                .prefetch(episode, &mut *self.storage, &mut self.warm_budget)
                .await?;
            self.absorb(&report, stats);
            if report.outcome == ItemOutcome::Prefetched {
                succeeded += 1;
                self.statistics.episodes_prefetched += 1;
            }
        }

        let outcome = if succeeded > 0 {
            debug!(
                "{}: {}/{} pending episodes prefetched",
                series.title,
                succeeded,
                pending.len()
            );
            ItemOutcome::Prefetched
        } else {
            ItemOutcome::Failed
        };

        Ok(Dispatched {
            outcome,
            performed_io: true,
            stop,
        })
    }

    /// Adds one prefetch report to the run and catalog counters
    fn absorb(&mut self, report: &PrefetchReport, stats: &mut CatalogStats) {
        let s = &mut self.statistics;
        s.stream_requests_sent += u64::from(report.stream_requests_sent);
        s.stream_requests_successful += u64::from(report.stream_requests_successful);
        s.cache_requests_sent += u64::from(report.warm.sent);
        s.cache_requests_successful += u64::from(report.warm.successful);
        stats.cache_requests_sent += u64::from(report.warm.sent);
        stats.cache_requests_successful += u64::from(report.warm.successful);
    }

    fn budget_exceeded(&self) -> bool {
        self.config
            .max_execution_time
            .map(|budget| self.started.elapsed() >= budget)
            .unwrap_or(false)
    }

    /// Evaluates control signals and the time budget
    ///
    /// Parks here while paused. Returns the reason to stop, if any.
    async fn checkpoint(&mut self) -> Option<StopReason> {
        match self.control.checkpoint() {
            Checkpoint::Continue => {}
            Checkpoint::Cancel => {
                info!("Cancellation requested, stopping");
                return Some(StopReason::CancelledByUser);
            }
            Checkpoint::Pause => {
                info!("Pause requested, waiting for resume");
                if self.control.park().await == Checkpoint::Cancel {
                    info!("Cancelled while paused");
                    return Some(StopReason::CancelledByUser);
                }
                info!("Resumed");
            }
        }

        if self.budget_exceeded() {
            info!("Execution time budget exhausted, stopping");
            return Some(StopReason::TimeLimit);
        }

        None
    }

    async fn pause_between_requests(&mut self) {
        let delay = self.config.delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Publishes a progress update along with the current counters
    fn publish(&self, update: impl FnOnce(&mut ProgressSnapshot)) {
        let elapsed = self.started.elapsed();
        let budget = self.config.max_execution_time;
        let s = &self.statistics;
        self.progress.send_modify(|p| {
            update(p);
            p.movies_prefetched = s.movies_prefetched;
            p.series_prefetched = s.series_prefetched;
            p.episodes_prefetched = s.episodes_prefetched;
            p.cached_count = s.cached_count;
            p.failed_count = s.failed_count;
            p.cache_requests_sent = s.cache_requests_sent;
            p.cache_requests_successful = s.cache_requests_successful;
            p.update_timing(elapsed, budget);
        });
    }
}

/// Finds the manifest entry for a selection, preferring one of the same type
fn find_descriptor<'d>(
    descriptors: &'d [CatalogDescriptor],
    selection: &CatalogSelection,
) -> Option<&'d CatalogDescriptor> {
    descriptors
        .iter()
        .find(|d| d.id == selection.catalog_id && d.catalog_type == Some(selection.catalog_type))
        .or_else(|| descriptors.iter().find(|d| d.id == selection.catalog_id))
}
