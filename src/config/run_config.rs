//! Immutable per-run configuration snapshot
//!
//! A [`RunConfig`] is built once from a validated [`Config`] when a run is
//! requested and handed to the worker by value. The worker never looks at the
//! live configuration again.

use crate::catalog::{CatalogSelection, CatalogType};
use crate::config::duration::{parse_time_string, TimeSpan};
use crate::config::types::Config;
use crate::crawler::{Limit, RunLimits};
use crate::storage::CacheValidity;
use crate::ConfigError;
use regex::Regex;
use std::time::Duration;

/// Stream cache warming settings for one run
#[derive(Debug, Clone, Default)]
pub struct WarmingSettings {
    pub enabled: bool,
    /// Streams matching this are already cached upstream; None matches nothing
    pub cached_pattern: Option<Regex>,
    pub max_requests_per_item: u32,
    pub max_requests_global: u32,
    pub cached_streams_threshold: u32,
}

/// Everything a single run needs, fixed at request time
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Catalog selection snapshot, in configured order
    pub catalogs: Vec<CatalogSelection>,
    /// Stream addons queried for every item, in order
    pub stream_addons: Vec<String>,
    pub limits: RunLimits,
    pub delay: Duration,
    pub cache_validity: CacheValidity,
    /// None when the run has no execution budget
    pub max_execution_time: Option<Duration>,
    pub randomize_catalogs: bool,
    pub randomize_items: bool,
    pub warming: WarmingSettings,
    /// Hash of the configuration file this snapshot came from
    pub config_hash: Option<String>,
}

impl RunConfig {
    /// Creates a snapshot with default limits and no delay
    pub fn new(catalogs: Vec<CatalogSelection>, stream_addons: Vec<String>) -> Self {
        Self {
            catalogs,
            stream_addons,
            limits: RunLimits::default(),
            delay: Duration::ZERO,
            cache_validity: CacheValidity::Window(Duration::from_secs(604_800)),
            max_execution_time: None,
            randomize_catalogs: false,
            randomize_items: false,
            warming: WarmingSettings::default(),
            config_hash: None,
        }
    }

    /// Builds the snapshot from a validated configuration
    pub fn from_config(config: &Config, config_hash: Option<String>) -> Result<Self, ConfigError> {
        let prefetch = &config.prefetch;

        let catalogs = config
            .catalogs
            .iter()
            .map(|entry| {
                let catalog_type = CatalogType::from_config_str(&entry.catalog_type)
                    .ok_or_else(|| {
                        ConfigError::Validation(format!(
                            "catalog '{}' has unknown type '{}'",
                            entry.catalog_id, entry.catalog_type
                        ))
                    })?;
                Ok(CatalogSelection {
                    addon_url: entry.addon_url.trim_end_matches('/').to_string(),
                    catalog_id: entry.catalog_id.clone(),
                    catalog_type,
                    enabled: entry.enabled,
                    order: entry.order,
                    name: entry.name.clone().unwrap_or_else(|| entry.catalog_id.clone()),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let stream_addons = config
            .addons
            .iter()
            .filter(|a| a.kind.serves_streams())
            .map(|a| a.url.trim_end_matches('/').to_string())
            .collect();

        let limits = RunLimits {
            movies_global: Limit::from_config(prefetch.movies_global_limit),
            series_global: Limit::from_config(prefetch.series_global_limit),
            movies_per_catalog: Limit::from_config(prefetch.movies_per_catalog),
            series_per_catalog: Limit::from_config(prefetch.series_per_catalog),
            items_per_mixed_catalog: Limit::from_config(prefetch.items_per_mixed_catalog),
        };

        let delay = parse_time_string(&prefetch.delay)?
            .as_duration()
            .unwrap_or(Duration::ZERO);

        let cache_validity = match parse_time_string(&prefetch.cache_validity)? {
            TimeSpan::Unlimited => CacheValidity::Forever,
            TimeSpan::Finite(d) => CacheValidity::Window(d),
        };

        let max_execution_time = parse_time_string(&prefetch.max_execution_time)?.as_duration();

        let warming_config = &config.cache_warming;
        let warming = WarmingSettings {
            enabled: warming_config.enabled,
            cached_pattern: Some(Regex::new(&warming_config.cached_stream_regex)?),
            max_requests_per_item: warming_config.max_requests_per_item,
            max_requests_global: warming_config.max_requests_global,
            cached_streams_threshold: warming_config.cached_streams_threshold,
        };

        Ok(Self {
            catalogs,
            stream_addons,
            limits,
            delay,
            cache_validity,
            max_execution_time,
            randomize_catalogs: prefetch.randomize_catalogs,
            randomize_items: prefetch.randomize_items,
            warming,
            config_hash,
        })
    }

    /// Selections that will actually be crawled
    pub fn enabled_catalogs(&self) -> impl Iterator<Item = &CatalogSelection> {
        self.catalogs.iter().filter(|c| c.enabled)
    }
}
