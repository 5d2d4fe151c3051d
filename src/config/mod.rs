//! Configuration module for the prefetcher
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and turning a validated configuration into the immutable snapshot a run uses.
//!
//! # Example
//!
//! ```no_run
//! use streams_prefetcher::config::{load_config, RunConfig};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("prefetcher.toml")).unwrap();
//! let run = RunConfig::from_config(&config, None).unwrap();
//! println!("Catalogs selected: {}", run.enabled_catalogs().count());
//! ```

mod duration;
mod parser;
mod run_config;
mod types;
mod validation;

// Re-export types
pub use types::{
    AddonEntry, AddonKind, CacheWarmingConfig, CatalogEntry, Config, HttpConfig,
    PrefetchConfig, ScheduleConfig, ScheduleEntryConfig, StorageConfig,
};

pub use duration::{format_duration, parse_time_string, TimeSpan};
pub use run_config::{RunConfig, WarmingSettings};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_settings, LoadedSettings,
};
