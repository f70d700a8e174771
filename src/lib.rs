//! nvim-harvest: a resumable GitHub Code Search harvester
//!
//! This crate discovers Neovim configuration files through the GitHub Code Search API,
//! working around the 1000-results-per-query ceiling by running an ordered catalog of
//! overlapping query strategies, deduplicating repositories across them, and persisting
//! enough state to resume after rate limiting or interruption.

pub mod config;
pub mod crawler;
pub mod github;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for nvim-harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("GitHub API error: {0}")]
    Api(#[from] ApiError),

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        source: ApiError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Malformed crawl state in {path}: {message}")]
    State { path: String, message: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors returned by a single GitHub API call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Rate limit hit, resets at {}", reset_display(.reset_at))]
    RateLimited {
        reset_at: Option<chrono::DateTime<chrono::Utc>>,
    },

    #[error("Search returned no results or rejected the query")]
    NoResults,

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// Returns true when the call may succeed if repeated after a backoff
    ///
    /// Rate limits, server errors, and transport failures are transient. Authentication
    /// failures, "no results" responses, missing resources, and undecodable payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Status { .. } => true,
            Self::Http { .. } => true,
            Self::Unauthorized { .. }
            | Self::NoResults
            | Self::NotFound { .. }
            | Self::Decode { .. } => false,
        }
    }

    /// Returns true for the distinguished rate-limit signal
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

fn reset_display(reset_at: &Option<chrono::DateTime<chrono::Utc>>) -> String {
    match reset_at {
        Some(at) => at.to_rfc3339(),
        None => "an unknown time".to_string(),
    }
}

/// Result type alias for nvim-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for a single API call
pub type ApiResult<T> = std::result::Result<T, ApiError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEvent, CrawlOutcome, Crawler};
pub use github::{Artifact, GitHubApi, GitHubClient, RepoId, RepoInfo};
pub use state::CrawlState;
pub use storage::DiskStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::RateLimited { reset_at: None }.is_retryable());
        assert!(ApiError::Status {
            status: 502,
            url: "https://api.github.com/search/code".to_string()
        }
        .is_retryable());
        assert!(!ApiError::NoResults.is_retryable());
        assert!(!ApiError::Unauthorized { status: 401 }.is_retryable());
        assert!(!ApiError::NotFound {
            url: "https://raw.githubusercontent.com/a/b/main/init.lua".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_rate_limit_display() {
        let err = ApiError::RateLimited { reset_at: None };
        assert_eq!(err.to_string(), "Rate limit hit, resets at an unknown time");
        assert!(err.is_rate_limit());
    }
}
