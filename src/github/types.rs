use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository identifier (`owner/name`)
///
/// Serialized as the `owner/name` string so the crawl state ledgers stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses a `owner/name` full name
    ///
    /// Returns `None` unless there is exactly one slash and both halves are usable as a
    /// single path component (non-empty, not `.` or `..`, no backslash). Both halves end
    /// up in artifact file names.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        if !is_path_segment(owner) || !is_path_segment(name) {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Canonical web URL of the repository
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

fn is_path_segment(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl TryFrom<String> for RepoId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid repository identifier '{}'", value))
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.full_name()
    }
}

/// Descriptive repository metadata attached to every artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub id: RepoId,
    pub url: String,
    pub stars: u64,
    pub default_branch: String,
    /// ISO 8601 timestamp of the last push
    pub pushed_at: Option<String>,
}

/// One discovered configuration file
///
/// Produced once per unique repository; the crawler keeps no reference after yielding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub repo: RepoInfo,
    pub path: String,
    pub content: String,
}

/// One page of code search results
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<SearchHit>,
}

/// A single code search match
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub repository: HitRepository,
}

/// Repository summary embedded in a code search match
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HitRepository {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl SearchHit {
    pub fn new(full_name: &str, path: &str) -> Self {
        Self {
            path: path.to_string(),
            repository: HitRepository {
                full_name: full_name.to_string(),
                html_url: None,
            },
        }
    }

    pub fn repo_id(&self) -> Option<RepoId> {
        RepoId::parse(&self.repository.full_name)
    }
}

/// Repository metadata as returned by `GET /repos/{owner}/{name}`
///
/// Every field is optional; callers substitute defaults for whatever is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepoMetadata {
    #[serde(default, rename = "stargazers_count")]
    pub stars: Option<u64>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<String>,
}
