//! The remote calls the crawl engine depends on
//!
//! Each method performs exactly one request. Rate governing and retries are applied by
//! the crawler around these calls, so alternative implementations (such as in-memory
//! fixtures) get identical scheduling behavior.

use crate::github::types::{RepoId, RepoMetadata, SearchPage};
use crate::ApiResult;
use async_trait::async_trait;

#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Runs one code search page
    ///
    /// Must return `ApiError::NoResults` for the "no or invalid results" condition so it
    /// stays distinguishable from transport failures.
    async fn search_code(&self, query: &str, page: u32, per_page: u32) -> ApiResult<SearchPage>;

    /// Fetches star count, default branch and last push time
    async fn repo_metadata(&self, repo: &RepoId) -> ApiResult<RepoMetadata>;

    /// Downloads one file from a branch
    async fn raw_content(&self, repo: &RepoId, branch: &str, path: &str) -> ApiResult<String>;
}
