//! Configuration module for nvim-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; an empty file yields the defaults tuned for the public
//! GitHub API.
//!
//! # Example
//!
//! ```no_run
//! use nvim_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting at most {} repositories", config.crawl.max_repos);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, GitHubConfig, OutputConfig, RetryConfig, RetrySettings,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
