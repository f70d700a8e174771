//! One-file-per-repository artifact store
//!
//! Artifacts are written as `<owner>__<name>.<ext>` with a companion
//! `<owner>__<name>.<ext>.meta` holding `key=value` lines for the url, star count,
//! file path and last push time. GitHub owners cannot contain underscores, so the
//! first `__` in a filename always separates owner from name.

use crate::github::{Artifact, RepoId, RepoInfo};
use crate::storage::{StorageError, StorageResult};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const SEPARATOR: &str = "__";
const META_SUFFIX: &str = ".meta";

/// Directory-backed artifact store
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
    extension: String,
}

impl DiskStore {
    /// Creates a store rooted at `dir`
    ///
    /// The directory is created lazily on the first write.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory holding the artifacts
    /// * `extension` - Artifact file extension without the dot (e.g. `lua`)
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable filename for a repository's artifact
    pub fn file_name(&self, repo: &RepoId) -> String {
        format!("{}{}{}.{}", repo.owner, SEPARATOR, repo.name, self.extension)
    }

    pub fn artifact_path(&self, repo: &RepoId) -> PathBuf {
        self.dir.join(self.file_name(repo))
    }

    fn meta_path(&self, repo: &RepoId) -> PathBuf {
        self.dir
            .join(format!("{}{}", self.file_name(repo), META_SUFFIX))
    }

    /// Whether an artifact for this repository is already on disk
    pub fn contains(&self, repo: &RepoId) -> bool {
        self.artifact_path(repo).is_file()
    }

    /// Decodes a filename back into a repository identifier
    ///
    /// Returns `None` for metadata files, other extensions, and names without the
    /// owner/name separator.
    pub fn parse_file_name(&self, file_name: &str) -> Option<RepoId> {
        if file_name.ends_with(META_SUFFIX) {
            return None;
        }
        let stem = file_name.strip_suffix(&format!(".{}", self.extension))?;
        let (owner, name) = stem.split_once(SEPARATOR)?;
        RepoId::parse(&format!("{}/{}", owner, name))
    }

    /// Scans the directory for repositories that already have an artifact
    ///
    /// A missing directory is an empty cache, not an error.
    pub fn cached_repos(&self) -> StorageResult<BTreeSet<RepoId>> {
        let mut cached = BTreeSet::new();
        if !self.dir.exists() {
            return Ok(cached);
        }

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(repo) = entry.file_name().to_str().and_then(|n| self.parse_file_name(n)) {
                cached.insert(repo);
            }
        }

        Ok(cached)
    }

    /// Writes an artifact and its metadata record
    ///
    /// # Returns
    ///
    /// The path of the written artifact file
    pub fn save(&self, artifact: &Artifact) -> StorageResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let repo = &artifact.repo;
        let path = self.artifact_path(&repo.id);
        std::fs::write(&path, &artifact.content)?;

        let mut meta = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(meta, "url={}", repo.url);
        let _ = writeln!(meta, "stars={}", repo.stars);
        let _ = writeln!(meta, "path={}", artifact.path);
        let _ = writeln!(meta, "pushed_at={}", repo.pushed_at.as_deref().unwrap_or(""));
        std::fs::write(self.meta_path(&repo.id), meta)?;

        Ok(path)
    }

    /// Reads one artifact back from disk
    pub fn load(&self, repo: &RepoId) -> StorageResult<Artifact> {
        let content = std::fs::read_to_string(self.artifact_path(repo))?;

        let meta_path = self.meta_path(repo);
        let meta = if meta_path.exists() {
            parse_meta(&std::fs::read_to_string(&meta_path)?, &meta_path)?
        } else {
            Metadata::default()
        };

        Ok(Artifact {
            repo: RepoInfo {
                id: repo.clone(),
                url: meta.url,
                stars: meta.stars,
                default_branch: String::new(),
                pushed_at: meta.pushed_at,
            },
            path: meta.path.unwrap_or_else(|| "init.lua".to_string()),
            content,
        })
    }

    /// Reads every artifact in the store, ordered by repository
    pub fn load_all(&self) -> StorageResult<Vec<Artifact>> {
        self.cached_repos()?
            .iter()
            .map(|repo| self.load(repo))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Metadata {
    url: String,
    stars: u64,
    path: Option<String>,
    pushed_at: Option<String>,
}

fn parse_meta(content: &str, path: &Path) -> StorageResult<Metadata> {
    let mut meta = Metadata::default();

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "url" => meta.url = value.to_string(),
            "stars" => {
                meta.stars = value.trim().parse().map_err(|_| StorageError::Metadata {
                    path: path.display().to_string(),
                    message: format!("invalid star count '{}'", value),
                })?
            }
            "path" => meta.path = Some(value.to_string()),
            "pushed_at" if !value.is_empty() => meta.pushed_at = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(meta)
}
