//! Query scheduler
//!
//! This module walks the strategy catalog, including:
//! - Skipping strategies already recorded as completed, without a network call
//! - Issuing governed, retried search calls for the active page
//! - Classifying each search into a [`SearchOutcome`]
//! - Deciding when a strategy's page space is exhausted
//!
//! Per strategy the states are `PENDING -> PAGING(page) -> {EXHAUSTED | RATE_LIMITED}`.
//! The scheduler never marks a strategy complete unless it is certain no further
//! results exist for it.

use crate::config::{CrawlConfig, RetryConfig};
use crate::crawler::governor::RateGovernor;
use crate::crawler::queries::QueryCatalog;
use crate::crawler::retry::{RetryFailure, RetryPolicy};
use crate::github::{GitHubApi, SearchPage};
use crate::state::CrawlState;
use crate::ApiError;
use chrono::{DateTime, Utc};

/// Classified result of one search call
#[derive(Debug)]
pub enum SearchOutcome {
    /// The page carried at least one hit
    Matches(SearchPage),

    /// No results, an empty page, or a rejected query: the strategy is done
    Exhausted,

    /// Retries ran out on the rate-limit signal; the whole crawl must stop
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Retries ran out on some other transient failure
    TransientError { attempts: u32, source: ApiError },

    /// A failure that repeating cannot fix (e.g. bad credentials)
    FatalError(ApiError),
}

/// What follows a fully processed page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    /// More results remain on this page number
    NextPage(u32),

    /// The strategy's page space is covered
    Exhausted,
}

/// Drives page-by-page retrieval over an ordered strategy catalog
#[derive(Debug, Clone)]
pub struct QueryScheduler {
    catalog: QueryCatalog,
    page_size: u32,
    max_pages: u32,
    retry: RetryPolicy,
}

impl QueryScheduler {
    /// Creates a scheduler over `catalog`
    ///
    /// # Arguments
    ///
    /// * `catalog` - Ordered strategies to run
    /// * `crawl` - Supplies the page size and the per-query page ceiling
    /// * `retry` - Backoff policy for search calls
    pub fn new(catalog: QueryCatalog, crawl: &CrawlConfig, retry: RetryConfig) -> Self {
        Self {
            catalog,
            page_size: crawl.page_size,
            max_pages: crawl.max_pages,
            retry: RetryPolicy::new(retry),
        }
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    /// Returns the active strategy, skipping any already completed
    ///
    /// Skipped strategies advance `query_index` without touching the completed ledger.
    /// Returns `None` once the catalog is exhausted.
    pub fn next_strategy(&self, state: &mut CrawlState) -> Option<(usize, String)> {
        while let Some(query) = self.catalog.get(state.query_index) {
            if !state.is_completed(query) {
                return Some((state.query_index, query.to_string()));
            }
            tracing::debug!("Skipping completed strategy: {}", query);
            state.advance_query();
        }
        None
    }

    /// Searches one page of a strategy
    ///
    /// Every attempt passes through `governor`.
    pub async fn search(
        &self,
        api: &dyn GitHubApi,
        governor: &mut RateGovernor,
        query: &str,
        page: u32,
    ) -> SearchOutcome {
        let per_page = self.page_size;
        let result = self
            .retry
            .run("search", Some(governor), move || {
                api.search_code(query, page, per_page)
            })
            .await;

        match result {
            Ok(results) if results.items.is_empty() => SearchOutcome::Exhausted,
            Ok(results) => SearchOutcome::Matches(results),
            Err(RetryFailure::Rejected(ApiError::NoResults)) => SearchOutcome::Exhausted,
            Err(RetryFailure::Exhausted {
                last: ApiError::RateLimited { reset_at },
                ..
            }) => SearchOutcome::RateLimited { reset_at },
            Err(RetryFailure::Exhausted { attempts, last }) => SearchOutcome::TransientError {
                attempts,
                source: last,
            },
            Err(RetryFailure::Rejected(err)) => SearchOutcome::FatalError(err),
        }
    }

    /// Bookkeeping after every hit on the current page was handled
    ///
    /// The strategy is covered once `page * page_size >= total_count` or the page
    /// ceiling is reached; otherwise the state moves to the next page.
    pub fn finish_page(&self, state: &mut CrawlState, total_count: u64) -> PageStep {
        let page = state.page;
        let covered = u64::from(page) * u64::from(self.page_size);

        if covered >= total_count || page >= self.max_pages {
            PageStep::Exhausted
        } else {
            state.page = page + 1;
            PageStep::NextPage(state.page)
        }
    }

    /// Records the active strategy as exhausted and advances past it
    pub fn mark_exhausted(&self, state: &mut CrawlState, query: &str) {
        state.complete_query(query);
    }
}
