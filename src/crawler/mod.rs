//! Crawler module for the code search harvest
//!
//! This module contains the core crawl engine, including:
//! - The query strategy catalog and the page-walking scheduler
//! - Request governing and retry with exponential backoff
//! - The pull-based [`Crawler`] event stream
//! - A run driver that persists artifacts and checkpoints and handles Ctrl-C

mod coordinator;
mod governor;
mod queries;
mod retry;
mod scheduler;

pub use coordinator::{CrawlEvent, CrawlOutcome, Crawler};
pub use governor::RateGovernor;
pub use queries::QueryCatalog;
pub use retry::{RetryFailure, RetryPolicy};
pub use scheduler::{PageStep, QueryScheduler, SearchOutcome};

use crate::config::Config;
use crate::github::GitHubClient;
use crate::state::CrawlState;
use crate::Result;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Totals for one run of the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: CrawlOutcome,
    /// Artifacts downloaded and saved during this run
    pub fetched: u64,
    /// Repositories counted from the artifact store during this run
    pub cached: u64,
    /// Repositories whose content could not be retrieved during this run
    pub failed: u64,
    /// Running total carried by the crawl state
    pub total_fetched: u64,
}

#[derive(Debug, Default)]
struct Tally {
    fetched: u64,
    cached: u64,
    failed: u64,
}

impl Tally {
    fn finish(self, outcome: CrawlOutcome, state: &CrawlState) -> RunSummary {
        RunSummary {
            outcome,
            fetched: self.fetched,
            cached: self.cached,
            failed: self.failed,
            total_fetched: state.total_fetched,
        }
    }
}

/// Runs a complete crawl operation against the GitHub API
///
/// The crawl stops on Ctrl-C after persisting the state.
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `token` - GitHub token used for every API request
/// * `state` - State to continue from
///
/// # Returns
///
/// * `Ok(RunSummary)` - The crawl stopped cleanly (including rate limiting and Ctrl-C)
/// * `Err(HarvestError)` - The crawl failed; the state was saved first where possible
pub async fn run_crawl(config: &Config, token: Option<&str>, state: CrawlState) -> Result<RunSummary> {
    let client = GitHubClient::new(&config.github, token)?;
    let mut crawler = Crawler::new(Arc::new(client), config, state)?;
    drive(&mut crawler, &config.output.state_file, shutdown_signal()).await
}

/// Pulls events from `crawler` until it finishes or `shutdown` resolves
///
/// Fresh artifacts are written to the crawler's artifact store and the state is saved
/// to `state_file` at every checkpoint, on shutdown, and before a fatal error is returned.
pub async fn drive<S>(crawler: &mut Crawler, state_file: &Path, shutdown: S) -> Result<RunSummary>
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut tally = Tally::default();
    let strategies = crawler.catalog().len();

    loop {
        let next = tokio::select! {
            _ = &mut shutdown => None,
            event = crawler.next_event() => Some(event),
        };

        let Some(next) = next else {
            tracing::info!("Interrupted, saving crawl state to {}", state_file.display());
            crawler.state().save(state_file)?;
            return Ok(tally.finish(CrawlOutcome::Interrupted, crawler.state()));
        };

        let event = match next {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(tally.finish(CrawlOutcome::Complete, crawler.state())),
            Err(err) => {
                if let Err(save_err) = crawler.state().save(state_file) {
                    tracing::error!("Failed to save crawl state: {}", save_err);
                }
                return Err(err);
            }
        };

        match event {
            CrawlEvent::StrategyStarted { index, query, page } => {
                tracing::info!("[{}/{}] {} (page {})", index + 1, strategies, query, page);
            }
            CrawlEvent::Fetched {
                artifact,
                total_fetched,
            } => {
                // The last checkpoint predates this artifact, so the state is not saved here
                let path = crawler.store().save(&artifact)?;
                tally.fetched += 1;
                tracing::info!(
                    "[{}] {} ({} stars)",
                    total_fetched,
                    artifact.repo.id,
                    artifact.repo.stars
                );
                tracing::debug!("Saved {}", path.display());
            }
            CrawlEvent::Cached {
                repo,
                total_fetched,
            } => {
                tally.cached += 1;
                tracing::debug!("[{}] {} (cached)", total_fetched, repo);
            }
            CrawlEvent::ItemFailed { repo, reason } => {
                tally.failed += 1;
                tracing::warn!("Skipping {}: {}", repo, reason);
            }
            CrawlEvent::Checkpoint => {
                crawler.state().save(state_file)?;
                tracing::trace!("Checkpoint saved");
            }
            CrawlEvent::StrategyExhausted { index, query } => {
                tracing::debug!("[{}/{}] exhausted: {}", index + 1, strategies, query);
            }
            CrawlEvent::Finished(outcome) => {
                return Ok(tally.finish(outcome, crawler.state()));
            }
        }
    }
}

/// Resolves on Ctrl-C
///
/// If the signal handler cannot be installed the crawl simply runs without one.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
