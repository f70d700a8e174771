//! Crawler coordinator - main crawl orchestration logic
//!
//! [`Crawler`] composes the scheduler, rate governor, retry policies and disk cache
//! index into a lazy stream of [`CrawlEvent`]s pulled with [`Crawler::next_event`].
//! The caller decides what to do with each artifact and when a checkpoint is persisted;
//! the crawler itself never writes to disk.
//!
//! Ledger mutations for a search hit are committed only after its network calls have
//! returned. Dropping an in-flight `next_event` future therefore leaves the state at the
//! last consistent point, and a resume redoes at most the current page.

use crate::config::Config;
use crate::crawler::governor::RateGovernor;
use crate::crawler::queries::QueryCatalog;
use crate::crawler::retry::{RetryFailure, RetryPolicy};
use crate::crawler::scheduler::{PageStep, QueryScheduler, SearchOutcome};
use crate::github::{Artifact, GitHubApi, RepoId, RepoInfo, RepoMetadata, SearchHit};
use crate::state::CrawlState;
use crate::storage::DiskStore;
use crate::{HarvestError, Result};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

/// Progress reported by the crawler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// A strategy became active (`page` is greater than 1 when resuming mid-strategy)
    StrategyStarted {
        index: usize,
        query: String,
        page: u32,
    },

    /// A freshly downloaded artifact; ownership moves to the caller
    Fetched {
        artifact: Artifact,
        total_fetched: u64,
    },

    /// A repository already present in the artifact store was counted
    Cached { repo: RepoId, total_fetched: u64 },

    /// Content retrieval failed for one repository; the crawl continues
    ItemFailed { repo: RepoId, reason: String },

    /// The state is at a safe resumption point and should be persisted now
    Checkpoint,

    /// A strategy has no further results
    StrategyExhausted { index: usize, query: String },

    /// The crawl stopped; no further events follow
    Finished(CrawlOutcome),
}

/// How a crawl run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every strategy in the catalog is exhausted
    Complete,

    /// Search retries ran out on the rate limit; resume later at the same strategy and page
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// The configured artifact cap was reached
    MaxReached,

    /// Stopped by an external signal (reported by the run driver, never by the crawler)
    Interrupted,
}

#[derive(Debug)]
enum Phase {
    /// The next step searches `state.page` of the active strategy
    Searching,

    /// Working through the hits of the current page
    Paging {
        index: usize,
        query: String,
        hits: VecDeque<SearchHit>,
        total_count: u64,
    },

    Done,
}

/// Resumable crawl over a strategy catalog
pub struct Crawler {
    api: Arc<dyn GitHubApi>,
    store: DiskStore,
    scheduler: QueryScheduler,
    governor: RateGovernor,
    api_retry: RetryPolicy,
    state: CrawlState,
    phase: Phase,
    outbox: VecDeque<CrawlEvent>,
    max_repos: u64,
    checkpoint_every: u64,
    default_branch: String,
    fresh_since_checkpoint: u64,
    active_strategy: Option<usize>,
}

impl Crawler {
    /// Creates a crawler that continues from `state`
    ///
    /// Repositories already present in the artifact store are added to the dedup ledger
    /// before anything else happens, so they are never fetched again.
    ///
    /// # Arguments
    ///
    /// * `api` - GitHub API implementation
    /// * `config` - Crawl configuration
    /// * `state` - Fresh or previously persisted crawl state
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to pull events
    /// * `Err(HarvestError)` - The artifact directory could not be scanned
    pub fn new(api: Arc<dyn GitHubApi>, config: &Config, mut state: CrawlState) -> Result<Self> {
        let store = DiskStore::new(&config.output.data_dir, &config.output.extension);

        let cached = store.cached_repos()?;
        let seeded = state.seed_seen(cached);
        if seeded > 0 {
            tracing::info!(
                "Seeded {} cached repositories from {}",
                seeded,
                store.dir().display()
            );
        }

        let catalog = QueryCatalog::from_config(config.crawl.queries.as_deref());
        let scheduler = QueryScheduler::new(catalog, &config.crawl, config.retry.search.clone());

        Ok(Self {
            api,
            store,
            scheduler,
            governor: RateGovernor::new(config.crawl.min_request_interval()),
            api_retry: RetryPolicy::new(config.retry.api.clone()),
            state,
            phase: Phase::Searching,
            outbox: VecDeque::new(),
            max_repos: config.crawl.max_repos,
            checkpoint_every: config.crawl.checkpoint_every.max(1),
            default_branch: config.crawl.default_branch.clone(),
            fresh_since_checkpoint: 0,
            active_strategy: None,
        })
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn into_state(self) -> CrawlState {
        self.state
    }

    pub fn store(&self) -> &DiskStore {
        &self.store
    }

    pub fn catalog(&self) -> &QueryCatalog {
        self.scheduler.catalog()
    }

    /// Advances the crawl until the next event is available
    ///
    /// # Returns
    ///
    /// * `Ok(Some(event))` - The next event; `Finished` is always the last one
    /// * `Ok(None)` - The crawl has finished
    /// * `Err(HarvestError)` - A fatal failure; the crawl is over and the state is left
    ///   at its last consistent point so the caller can still persist it
    pub async fn next_event(&mut self) -> Result<Option<CrawlEvent>> {
        loop {
            if let Some(event) = self.outbox.pop_front() {
                return Ok(Some(event));
            }

            let step = match self.phase {
                Phase::Done => return Ok(None),
                Phase::Searching => self.search_page().await,
                Phase::Paging { .. } => self.process_hit().await,
            };

            if let Err(err) = step {
                self.phase = Phase::Done;
                self.outbox.clear();
                return Err(err);
            }
        }
    }

    /// Searches the active page, or finishes when nothing is left to search
    async fn search_page(&mut self) -> Result<()> {
        if self.state.total_fetched >= self.max_repos {
            self.finish(CrawlOutcome::MaxReached);
            return Ok(());
        }

        let Some((index, query)) = self.scheduler.next_strategy(&mut self.state) else {
            tracing::info!("All {} strategies completed", self.catalog().len());
            self.finish(CrawlOutcome::Complete);
            return Ok(());
        };

        let page = self.state.page;
        if self.active_strategy != Some(index) {
            self.active_strategy = Some(index);
            self.outbox.push_back(CrawlEvent::StrategyStarted {
                index,
                query: query.clone(),
                page,
            });
        }

        let api: &dyn GitHubApi = self.api.as_ref();
        let outcome = self
            .scheduler
            .search(api, &mut self.governor, &query, page)
            .await;

        match outcome {
            SearchOutcome::Matches(results) => {
                tracing::debug!(
                    "{} page {}: {} hits of {} total",
                    query,
                    page,
                    results.items.len(),
                    results.total_count
                );
                self.phase = Phase::Paging {
                    index,
                    query,
                    hits: results.items.into(),
                    total_count: results.total_count,
                };
            }
            SearchOutcome::Exhausted => self.exhaust_strategy(index, query),
            SearchOutcome::RateLimited { reset_at } => {
                tracing::warn!("Rate limited on '{}' page {}; stopping", query, page);
                self.finish(CrawlOutcome::RateLimited { reset_at });
            }
            SearchOutcome::TransientError { attempts, source } => {
                return Err(HarvestError::RetriesExhausted {
                    operation: format!("search '{}' page {}", query, page),
                    attempts,
                    source,
                });
            }
            SearchOutcome::FatalError(err) => return Err(err.into()),
        }

        Ok(())
    }

    /// Handles the next hit of the current page, or closes the page when none are left
    ///
    /// The hit is only popped once its outcome is committed to the state.
    async fn process_hit(&mut self) -> Result<()> {
        let next = match &self.phase {
            Phase::Paging { hits, .. } => hits.front().cloned(),
            _ => return Ok(()),
        };

        let Some(hit) = next else {
            self.finish_page();
            return Ok(());
        };

        if self.state.total_fetched >= self.max_repos {
            self.finish(CrawlOutcome::MaxReached);
            return Ok(());
        }

        let Some(repo) = hit.repo_id() else {
            tracing::warn!(
                "Ignoring hit with malformed repository name '{}'",
                hit.repository.full_name
            );
            self.pop_hit();
            return Ok(());
        };

        if self.state.has_seen(&repo) {
            tracing::trace!("Already seen {}", repo);
            self.pop_hit();
            return Ok(());
        }

        if self.store.contains(&repo) {
            self.state.seen_repos.insert(repo.clone());
            self.state.total_fetched += 1;
            self.pop_hit();
            self.outbox.push_back(CrawlEvent::Cached {
                repo,
                total_fetched: self.state.total_fetched,
            });
            return Ok(());
        }

        let info = self.resolve_repo(&repo, &hit).await;
        match self.fetch_content(&info, &hit.path).await {
            Ok(content) => {
                self.state.seen_repos.insert(repo);
                self.state.total_fetched += 1;
                self.pop_hit();
                self.outbox.push_back(CrawlEvent::Fetched {
                    artifact: Artifact {
                        repo: info,
                        path: hit.path,
                        content,
                    },
                    total_fetched: self.state.total_fetched,
                });

                self.fresh_since_checkpoint += 1;
                if self.fresh_since_checkpoint >= self.checkpoint_every {
                    self.checkpoint();
                }
            }
            Err(failure) => {
                tracing::warn!("Failed to fetch {} from {}: {}", hit.path, repo, failure);
                self.state.seen_repos.insert(repo.clone());
                self.state.failed_repos.insert(repo.clone());
                self.pop_hit();
                self.outbox.push_back(CrawlEvent::ItemFailed {
                    repo,
                    reason: failure.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Looks up repository metadata, falling back to defaults on any failure
    async fn resolve_repo(&mut self, repo: &RepoId, hit: &SearchHit) -> RepoInfo {
        let api: &dyn GitHubApi = self.api.as_ref();
        let metadata = match self
            .api_retry
            .run("repo metadata", Some(&mut self.governor), move || {
                api.repo_metadata(repo)
            })
            .await
        {
            Ok(metadata) => metadata,
            Err(failure) => {
                tracing::debug!("Metadata for {} unavailable, using defaults: {}", repo, failure);
                RepoMetadata::default()
            }
        };

        RepoInfo {
            id: repo.clone(),
            url: hit
                .repository
                .html_url
                .clone()
                .unwrap_or_else(|| repo.html_url()),
            stars: metadata.stars.unwrap_or(0),
            default_branch: metadata
                .default_branch
                .filter(|branch| !branch.is_empty())
                .unwrap_or_else(|| self.default_branch.clone()),
            pushed_at: metadata.pushed_at,
        }
    }

    /// Downloads the artifact content
    ///
    /// Raw content is served by a separate host, so it bypasses the rate governor.
    async fn fetch_content(
        &self,
        info: &RepoInfo,
        path: &str,
    ) -> std::result::Result<String, RetryFailure> {
        let api: &dyn GitHubApi = self.api.as_ref();
        let (repo, branch) = (&info.id, info.default_branch.as_str());
        self.api_retry
            .run("raw content", None, move || api.raw_content(repo, branch, path))
            .await
    }

    fn pop_hit(&mut self) {
        if let Phase::Paging { hits, .. } = &mut self.phase {
            hits.pop_front();
        }
    }

    /// Page-end bookkeeping: move to the next page or exhaust the strategy
    fn finish_page(&mut self) {
        let Phase::Paging {
            index,
            query,
            total_count,
            ..
        } = std::mem::replace(&mut self.phase, Phase::Searching)
        else {
            return;
        };

        match self.scheduler.finish_page(&mut self.state, total_count) {
            PageStep::NextPage(page) => {
                tracing::debug!("{}: moving to page {}", query, page);
                self.checkpoint();
            }
            PageStep::Exhausted => self.exhaust_strategy(index, query),
        }
    }

    fn exhaust_strategy(&mut self, index: usize, query: String) {
        tracing::info!("Strategy exhausted: {}", query);
        self.scheduler.mark_exhausted(&mut self.state, &query);
        self.active_strategy = None;
        self.phase = Phase::Searching;
        self.outbox
            .push_back(CrawlEvent::StrategyExhausted { index, query });
        self.checkpoint();
    }

    fn checkpoint(&mut self) {
        self.fresh_since_checkpoint = 0;
        self.outbox.push_back(CrawlEvent::Checkpoint);
    }

    fn finish(&mut self, outcome: CrawlOutcome) {
        self.phase = Phase::Done;
        self.checkpoint();
        self.outbox.push_back(CrawlEvent::Finished(outcome));
    }
}
