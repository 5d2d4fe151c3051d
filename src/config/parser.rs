use crate::config::run_config::RunConfig;
use crate::config::types::Config;
use crate::config::validation::validate;
use crate::schedule::Schedule;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Everything a process needs from one configuration file
///
/// The run snapshot and the schedule are built from the same file read, so
/// the stored hash always matches the settings the runs actually use.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub config: Config,
    pub config_hash: String,
    pub run: RunConfig,
    pub schedule: Schedule,
}

/// Loads and parses a configuration file from the given path
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use streams_prefetcher::config::load_config;
///
/// let config = load_config(Path::new("prefetcher.toml")).unwrap();
/// println!("Catalogs: {}", config.catalogs.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Hex-encoded SHA-256 of the configuration file content
///
/// The hash is stored with every persisted run so runs can be matched to
/// the configuration that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Loads a configuration and returns both the config and the hash of the
/// exact bytes it was parsed from
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

/// Loads a configuration and builds the run snapshot and weekly schedule
///
/// A bad cached-stream pattern or schedule entry fails here rather than at
/// the first scheduled run.
pub fn load_settings(path: &Path) -> Result<LoadedSettings, ConfigError> {
    let (config, config_hash) = load_config_with_hash(path)?;
    let run = RunConfig::from_config(&config, Some(config_hash.clone()))?;
    let schedule = Schedule::from_config(&config.schedule)?;
    Ok(LoadedSettings {
        config,
        config_hash,
        run,
        schedule,
    })
}
