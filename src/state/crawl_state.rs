use crate::github::RepoId;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Durable record of crawl progress
///
/// This is the only persisted entity of the crawl engine. It is mutated exclusively by
/// the crawler while a run is active and serialized at every checkpoint so an interrupted
/// or rate-limited run can resume at the exact strategy and page where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlState {
    /// Pointer into the query catalog
    pub query_index: usize,

    /// Current page within the active strategy (1-based)
    pub page: u32,

    /// Artifacts counted so far, fresh or served from the disk cache
    pub total_fetched: u64,

    /// Every repository observed as a search hit during this state's lifetime
    pub seen_repos: BTreeSet<RepoId>,

    /// Repositories whose content could not be retrieved
    pub failed_repos: BTreeSet<RepoId>,

    /// Strategies confirmed to have no further results, in completion order
    pub completed_queries: Vec<String>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            query_index: 0,
            page: 1,
            total_fetched: 0,
            seen_repos: BTreeSet::new(),
            failed_repos: BTreeSet::new(),
            completed_queries: Vec::new(),
        }
    }
}

impl CrawlState {
    /// Creates an empty state for a fresh crawl
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a state file, or returns a fresh state when the file does not exist
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON state file
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlState)` - The persisted state, or an empty one
    /// * `Err(HarvestError::State)` - The file exists but is not a valid state
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|message| HarvestError::State {
            path: path.display().to_string(),
            message,
        })
    }

    /// Writes the state as pretty-printed JSON
    ///
    /// The file is written to a sibling temp file first and renamed into place, so a
    /// crash mid-write never leaves a truncated state behind.
    pub fn save(&self, path: &Path) -> Result<(), HarvestError> {
        let json = self.to_json().map_err(|message| HarvestError::State {
            path: path.display().to_string(),
            message,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        let state: Self = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if state.page < 1 {
            return Err("page must be >= 1".to_string());
        }
        Ok(state)
    }

    /// Restarts the catalog while keeping every ledger of seen and failed repositories
    pub fn reset_queries(&mut self) {
        self.query_index = 0;
        self.page = 1;
        self.completed_queries.clear();
    }

    /// Marks the active strategy as exhausted and moves to the next one
    ///
    /// A strategy already present in the ledger is not appended again.
    pub fn complete_query(&mut self, query: &str) {
        if !self.is_completed(query) {
            self.completed_queries.push(query.to_string());
        }
        self.advance_query();
    }

    /// Moves to the next strategy without recording a completion
    pub fn advance_query(&mut self) {
        self.query_index += 1;
        self.page = 1;
    }

    pub fn is_completed(&self, query: &str) -> bool {
        self.completed_queries.iter().any(|q| q == query)
    }

    pub fn has_seen(&self, repo: &RepoId) -> bool {
        self.seen_repos.contains(repo)
    }

    /// Adds repositories already present in the artifact store to the dedup ledger
    ///
    /// Returns how many were not already known.
    pub fn seed_seen(&mut self, repos: impl IntoIterator<Item = RepoId>) -> usize {
        let before = self.seen_repos.len();
        self.seen_repos.extend(repos);
        self.seen_repos.len() - before
    }
}
