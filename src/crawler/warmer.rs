//! Stream cache warming
//!
//! Streams that match the cached-stream pattern are already materialized
//! upstream. When an item has few enough of those, the warmer probes some of
//! the uncached stream URLs so the upstream service starts caching them.
//! Requests are sequential, never retried, and capped per item and per run.

use crate::catalog::{CatalogSource, StreamInfo};
use crate::config::WarmingSettings;
use std::time::Duration;
use tracing::{debug, warn};

/// Run-wide warm request budget
#[derive(Debug, Clone, Copy)]
pub struct WarmBudget {
    remaining: u32,
}

impl WarmBudget {
    pub fn new(max_requests_global: u32) -> Self {
        Self {
            remaining: max_requests_global,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn spend(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// What happened when warming one item's streams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmOutcome {
    pub cached_streams: usize,
    pub uncached_streams: usize,
    /// Warming was skipped because enough streams were already cached
    pub skipped: bool,
    pub sent: u32,
    pub successful: u32,
}

/// Splits streams into the cached count and the probeable uncached URLs
pub fn classify_streams<'s>(
    streams: &'s [StreamInfo],
    settings: &WarmingSettings,
) -> (usize, Vec<&'s str>) {
    let mut cached = 0;
    let mut uncached = Vec::new();

    for stream in streams {
        let is_cached = settings
            .cached_pattern
            .as_ref()
            .map(|pattern| pattern.is_match(&stream.match_text()))
            .unwrap_or(false);

        if is_cached {
            cached += 1;
        } else if let Some(url) = stream.url.as_deref().filter(|u| !u.is_empty()) {
            uncached.push(url);
        }
    }

    (cached, uncached)
}

/// Issues warm-up requests for one item
pub struct StreamWarmer<'a> {
    source: &'a dyn CatalogSource,
    settings: &'a WarmingSettings,
    delay: Duration,
}

impl<'a> StreamWarmer<'a> {
    pub fn new(source: &'a dyn CatalogSource, settings: &'a WarmingSettings, delay: Duration) -> Self {
        Self {
            source,
            settings,
            delay,
        }
    }

    /// Warms the uncached streams of one item
    ///
    /// Stops when the per-item quota or the run budget is used up. Every probe
    /// counts as sent whether it succeeds or not; only 2xx counts as successful.
    pub async fn warm(&self, title: &str, streams: &[StreamInfo], budget: &mut WarmBudget) -> WarmOutcome {
        let (cached, uncached) = classify_streams(streams, self.settings);
        let mut outcome = WarmOutcome {
            cached_streams: cached,
            uncached_streams: uncached.len(),
            ..Default::default()
        };

        if cached as u64 > u64::from(self.settings.cached_streams_threshold) {
            debug!(
                "Skipping warm-up for {}: {} cached streams (threshold {})",
                title, cached, self.settings.cached_streams_threshold
            );
            outcome.skipped = true;
            return outcome;
        }

        for url in uncached {
            if outcome.sent >= self.settings.max_requests_per_item || budget.remaining() == 0 {
                break;
            }

            budget.spend();
            outcome.sent += 1;

            match self.source.probe_stream(url).await {
                Ok(status) if (200..300).contains(&status) => {
                    outcome.successful += 1;
                }
                Ok(status) => {
                    debug!("Warm-up request for {} returned {}", title, status);
                }
                Err(e) => {
                    warn!("Warm-up request for {} failed: {}", title, e);
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if outcome.sent > 0 {
            debug!(
                "Warmed {}: {}/{} requests succeeded",
                title, outcome.successful, outcome.sent
            );
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCatalogSource;
    use regex::Regex;

    fn settings(threshold: u32, per_item: u32) -> WarmingSettings {
        WarmingSettings {
            enabled: true,
            cached_pattern: Some(Regex::new("⚡").unwrap()),
            max_requests_per_item: per_item,
            max_requests_global: 100,
            cached_streams_threshold: threshold,
        }
    }

    fn stream(name: &str, url: &str) -> StreamInfo {
        StreamInfo {
            name: name.to_string(),
            description: String::new(),
            url: Some(url.to_string()),
        }
    }

    fn four_streams() -> Vec<StreamInfo> {
        vec![
            stream("⚡ Cached 4K", "https://cdn.example.com/0"),
            stream("Torrent 1080p", "https://cdn.example.com/1"),
            stream("Torrent 720p", "https://cdn.example.com/2"),
            stream("Torrent 480p", "https://cdn.example.com/3"),
        ]
    }

    #[test]
    fn test_classify_streams() {
        let mut streams = four_streams();
        streams.push(StreamInfo {
            name: "No url".to_string(),
            description: String::new(),
            url: None,
        });

        let (cached, uncached) = classify_streams(&streams, &settings(0, 1));
        assert_eq!(cached, 1);
        assert_eq!(
            uncached,
            vec![
                "https://cdn.example.com/1",
                "https://cdn.example.com/2",
                "https://cdn.example.com/3"
            ]
        );
    }

    #[test]
    fn test_classify_without_pattern() {
        let settings = WarmingSettings::default();
        let streams = four_streams();
        let (cached, uncached) = classify_streams(&streams, &settings);
        assert_eq!(cached, 0);
        assert_eq!(uncached.len(), 4);
    }

    #[tokio::test]
    async fn test_threshold_zero_skips_when_one_cached() {
        let source = MockCatalogSource::new();
        let settings = settings(0, 3);
        let warmer = StreamWarmer::new(&source, &settings, Duration::ZERO);
        let mut budget = WarmBudget::new(50);

        let outcome = warmer.warm("Movie", &four_streams(), &mut budget).await;

        assert!(outcome.skipped);
        assert_eq!(outcome.sent, 0);
        assert_eq!(budget.remaining(), 50);
        assert!(source.probed_urls().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_one_warms_uncached_up_to_quota() {
        let source = MockCatalogSource::new();
        let settings = settings(1, 2);
        let warmer = StreamWarmer::new(&source, &settings, Duration::ZERO);
        let mut budget = WarmBudget::new(50);

        let outcome = warmer.warm("Movie", &four_streams(), &mut budget).await;

        assert!(!outcome.skipped);
        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.successful, 2);
        assert_eq!(budget.remaining(), 48);
        assert_eq!(
            source.probed_urls(),
            vec!["https://cdn.example.com/1", "https://cdn.example.com/2"]
        );
    }

    #[tokio::test]
    async fn test_global_budget_caps_requests() {
        let source = MockCatalogSource::new();
        let settings = settings(1, 10);
        let warmer = StreamWarmer::new(&source, &settings, Duration::ZERO);
        let mut budget = WarmBudget::new(1);

        let outcome = warmer.warm("Movie", &four_streams(), &mut budget).await;

        assert_eq!(outcome.sent, 1);
        assert_eq!(budget.remaining(), 0);

        let again = warmer.warm("Other", &four_streams(), &mut budget).await;
        assert_eq!(again.sent, 0);
    }

    #[tokio::test]
    async fn test_failed_probes_count_as_sent() {
        let source = MockCatalogSource::new();
        source.set_probe_status("https://cdn.example.com/1", 503);
        source.fail_probe("https://cdn.example.com/2");
        let settings = settings(1, 3);
        let warmer = StreamWarmer::new(&source, &settings, Duration::ZERO);
        let mut budget = WarmBudget::new(50);

        let outcome = warmer.warm("Movie", &four_streams(), &mut budget).await;

        assert_eq!(outcome.sent, 3);
        assert_eq!(outcome.successful, 1);
    }
}
