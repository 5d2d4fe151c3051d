use crate::config::duration::{parse_time_string, TimeSpan};
use crate::config::types::{
    AddonEntry, CacheWarmingConfig, CatalogEntry, Config, HttpConfig, PrefetchConfig,
    ScheduleConfig, StorageConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_http_config(&config.http)?;
    validate_prefetch_config(&config.prefetch)?;
    validate_cache_warming_config(&config.cache_warming)?;
    validate_schedule_config(&config.schedule)?;
    validate_addons(&config.addons)?;
    validate_catalogs(&config.catalogs, &config.addons)?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if let TimeSpan::Finite(timeout) = parse_time_string(&config.request_timeout)? {
        if timeout.is_zero() {
            return Err(ConfigError::Validation(
                "request_timeout must be greater than zero (or -1 for none)".to_string(),
            ));
        }
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        let url = Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
        if !matches!(url.scheme(), "http" | "https" | "socks5") {
            return Err(ConfigError::Validation(format!(
                "proxy '{}' must use http, https or socks5",
                proxy
            )));
        }
    }

    Ok(())
}

/// Checks that a limit is either -1 or non-negative
fn validate_limit(name: &str, value: i64) -> Result<(), ConfigError> {
    if value < -1 {
        return Err(ConfigError::Validation(format!(
            "{} must be >= 0 or -1 for unlimited, got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_prefetch_config(config: &PrefetchConfig) -> Result<(), ConfigError> {
    validate_limit("movies_global_limit", config.movies_global_limit)?;
    validate_limit("series_global_limit", config.series_global_limit)?;
    validate_limit("movies_per_catalog", config.movies_per_catalog)?;
    validate_limit("series_per_catalog", config.series_per_catalog)?;
    validate_limit("items_per_mixed_catalog", config.items_per_mixed_catalog)?;

    if parse_time_string(&config.delay)? == TimeSpan::Unlimited {
        return Err(ConfigError::Validation(
            "delay cannot be unlimited".to_string(),
        ));
    }
    parse_time_string(&config.cache_validity)?;
    if matches!(parse_time_string(&config.max_execution_time)?, TimeSpan::Finite(d) if d.is_zero()) {
        return Err(ConfigError::Validation(
            "max_execution_time must be greater than zero (or -1 for none)".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache_warming_config(config: &CacheWarmingConfig) -> Result<(), ConfigError> {
    // Compiled even when disabled so a bad pattern is caught before it is switched on
    Regex::new(&config.cached_stream_regex)?;
    Ok(())
}

fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    for entry in &config.entries {
        crate::schedule::ScheduleEntry::parse(&entry.time, &entry.days)?;
    }

    if config.enabled && config.entries.is_empty() {
        return Err(ConfigError::InvalidSchedule(
            "schedule is enabled but has no entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_addon_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid addon URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "Addon URL '{}' must use http or https",
            raw
        )));
    }
    Ok(())
}

fn validate_addons(addons: &[AddonEntry]) -> Result<(), ConfigError> {
    for addon in addons {
        validate_addon_url(&addon.url)?;
    }

    if !addons.is_empty() && !addons.iter().any(|a| a.kind.serves_streams()) {
        return Err(ConfigError::Validation(
            "at least one addon must serve streams (kind = \"stream\" or \"both\")".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalogs(catalogs: &[CatalogEntry], addons: &[AddonEntry]) -> Result<(), ConfigError> {
    for catalog in catalogs {
        if catalog.catalog_id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "catalog for addon '{}' has an empty catalog_id",
                catalog.addon_url
            )));
        }

        if !matches!(catalog.catalog_type.as_str(), "movie" | "series" | "mixed") {
            return Err(ConfigError::Validation(format!(
                "catalog '{}' has type '{}', expected movie, series or mixed",
                catalog.catalog_id, catalog.catalog_type
            )));
        }

        let addon = addons
            .iter()
            .find(|a| a.url.trim_end_matches('/') == catalog.addon_url.trim_end_matches('/'));
        match addon {
            Some(addon) if addon.kind.serves_catalogs() => {}
            Some(_) => {
                return Err(ConfigError::Validation(format!(
                    "catalog '{}' references addon '{}' which is not a catalog addon",
                    catalog.catalog_id, catalog.addon_url
                )))
            }
            None => {
                return Err(ConfigError::Validation(format!(
                    "catalog '{}' references unknown addon '{}'",
                    catalog.catalog_id, catalog.addon_url
                )))
            }
        }
    }

    Ok(())
}
