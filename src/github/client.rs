//! HTTP implementation of the GitHub API seam
//!
//! This module handles all requests the harvester makes, including:
//! - Building the HTTP client with authentication and API version headers
//! - Code search, repository metadata and raw content requests
//! - Classifying failed responses into rate limits, auth failures and transient errors

use crate::config::GitHubConfig;
use crate::github::api::GitHubApi;
use crate::github::types::{RepoId, RepoMetadata, SearchPage};
use crate::{ApiError, ApiResult, ConfigError, HarvestError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with the GitHub REST headers preconfigured
///
/// # Arguments
///
/// * `config` - Endpoint and user agent configuration
/// * `token` - Personal access token sent as a bearer token, if any
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - The token is not a valid header value or the client failed to build
pub fn build_http_client(config: &GitHubConfig, token: Option<&str>) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "X-GitHub-Api-Version",
        HeaderValue::from_static("2022-11-28"),
    );

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ConfigError::Validation("GitHub token contains invalid characters".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// GitHub REST client
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    raw_url: Url,
}

impl GitHubClient {
    /// Creates a client for the configured endpoints
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint and user agent configuration
    /// * `token` - Personal access token, if any
    pub fn new(config: &GitHubConfig, token: Option<&str>) -> Result<Self, HarvestError> {
        let api_url = parse_base_url(&config.api_url)?;
        let raw_url = parse_base_url(&config.raw_url)?;
        let client = build_http_client(config, token)?;

        Ok(Self {
            client,
            api_url,
            raw_url,
        })
    }

    fn api_endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        with_segments(&self.api_url, segments)
    }

    async fn get(&self, url: Url) -> ApiResult<Response> {
        let url_str = url.to_string();
        tracing::trace!("GET {}", url_str);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url_str,
                source,
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_failure(response).await)
        }
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn search_code(&self, query: &str, page: u32, per_page: u32) -> ApiResult<SearchPage> {
        let mut url = self.api_endpoint(["search", "code"]);
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        let url_str = url.to_string();
        let response = self.get(url).await?;
        response
            .json::<SearchPage>()
            .await
            .map_err(|e| ApiError::Decode {
                url: url_str,
                message: e.to_string(),
            })
    }

    async fn repo_metadata(&self, repo: &RepoId) -> ApiResult<RepoMetadata> {
        let url = self.api_endpoint(["repos", repo.owner.as_str(), repo.name.as_str()]);

        let url_str = url.to_string();
        let response = self.get(url).await?;
        response
            .json::<RepoMetadata>()
            .await
            .map_err(|e| ApiError::Decode {
                url: url_str,
                message: e.to_string(),
            })
    }

    async fn raw_content(&self, repo: &RepoId, branch: &str, path: &str) -> ApiResult<String> {
        let segments = [repo.owner.as_str(), repo.name.as_str()]
            .into_iter()
            .chain(branch.split('/'))
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let url = with_segments(&self.raw_url, segments);

        let url_str = url.to_string();
        let response = self.get(url).await?;
        response.text().await.map_err(|source| ApiError::Http {
            url: url_str,
            source,
        })
    }
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", value, e)))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' cannot be used as a base URL",
            value
        )));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to a base URL
fn with_segments<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    // Bases are checked by parse_base_url, so this only fails for cannot-be-a-base URLs
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Maps a non-success response onto the error taxonomy
///
/// | Condition | Error |
/// |-----------|-------|
/// | HTTP 429, or 403 with `X-RateLimit-Remaining: 0` or a "rate limit" body | `RateLimited` |
/// | HTTP 401, other 403 | `Unauthorized` |
/// | HTTP 404 | `NotFound` |
/// | HTTP 422 | `NoResults` |
/// | Anything else | `Status` |
async fn classify_failure(response: Response) -> ApiError {
    let status = response.status();
    let url = response.url().to_string();

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            let headers = response.headers();
            let remaining_exhausted = headers
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim() == "0")
                .unwrap_or(false);
            let reset_at = headers
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS
                || remaining_exhausted
                || body.to_lowercase().contains("rate limit")
            {
                ApiError::RateLimited { reset_at }
            } else {
                ApiError::Unauthorized {
                    status: status.as_u16(),
                }
            }
        }
        StatusCode::NOT_FOUND => ApiError::NotFound { url },
        StatusCode::UNPROCESSABLE_ENTITY => ApiError::NoResults,
        _ => ApiError::Status {
            status: status.as_u16(),
            url,
        },
    }
}
