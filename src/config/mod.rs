//! Configuration module for Lab-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! as well as `url|anchor` seed files.
//!
//! # Example
//!
//! ```no_run
//! use lab_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, DomainsConfig, ExtractionConfig, ExtractionMode, ModelConfig,
    OutputConfig, ProviderEntry, RenderingConfig, SeedEntry, UserAgentConfig,
};

pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_seed_file, parse_config,
    parse_seed_lines,
};
