use crate::config::types::{Config, SeedEntry};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use lab_scout::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is recorded with every run so results can be traced back to the
/// configuration that produced them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Loads seed URLs from a text file
///
/// Each non-empty line holds `url|anchor text`; the anchor part is optional.
/// Lines with invalid or non-HTTP(S) URLs are skipped with a warning and
/// repeated URLs are kept only once.
pub fn load_seed_file(path: &Path) -> Result<Vec<SeedEntry>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_seed_lines(&content))
}

/// Parses `url|anchor` seed lines
pub fn parse_seed_lines(content: &str) -> Vec<SeedEntry> {
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (url, anchor) = match line.split_once('|') {
            Some((url, anchor)) => (url.trim(), anchor.trim()),
            None => (line, ""),
        };

        let valid = ::url::Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            tracing::warn!("Ignoring invalid seed line: {}", line);
            continue;
        }

        if seen.insert(url.to_string()) {
            seeds.push(SeedEntry {
                url: url.to_string(),
                anchor: anchor.to_string(),
            });
        }
    }

    seeds
}
