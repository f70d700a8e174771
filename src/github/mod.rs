//! GitHub API access
//!
//! This module contains the types exchanged with GitHub and the `GitHubApi` trait the
//! crawl engine is written against, plus its reqwest-backed implementation.

mod api;
mod client;
mod types;

pub use api::GitHubApi;
pub use client::{build_http_client, GitHubClient};
pub use types::{Artifact, HitRepository, RepoId, RepoInfo, RepoMetadata, SearchHit, SearchPage};
