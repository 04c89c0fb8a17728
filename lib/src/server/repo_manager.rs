//! `RepoManager` (C10): server-side repository directory lifecycle.
//!
//! Rooted at one server-configured directory; every operation is
//! name-sanitized so a client can never escape `root` via `..` or an
//! absolute path slipped into a repository name.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::commit::CommitGraph;
use crate::config::RepoConfig;
use crate::index::Index;
use crate::object_store::ObjectStore;
use crate::repo::Repository;

#[derive(Debug, thiserror::Error)]
pub enum RepoManagerError {
    #[error("invalid repository name '{0}'")]
    InvalidName(String),
    #[error("repository '{0}' already exists")]
    AlreadyExists(String),
    #[error("repository '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type RepoManagerResult<T> = Result<T, RepoManagerError>;

#[derive(Debug, Clone)]
pub struct RepoManager {
    root: PathBuf,
}

impl RepoManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects empty names, names containing `..`, and names carrying a
    /// path separator — the only sanitization a content-addressed,
    /// flat-per-repository layout needs to fail closed against traversal.
    fn sanitize(name: &str) -> RepoManagerResult<()> {
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(RepoManagerError::InvalidName(name.to_owned()));
        }
        Ok(())
    }

    pub fn path(&self, name: &str) -> RepoManagerResult<PathBuf> {
        Self::sanitize(name)?;
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        match self.path(name) {
            Ok(path) => path.join(Repository::minigit_dir_name()).is_dir(),
            Err(_) => false,
        }
    }

    /// Every child directory of `root` carrying a `.minigit` subdirectory.
    pub fn list(&self) -> io::Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.path().join(Repository::minigit_dir_name()).is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Creates the on-disk skeleton of §6.4 directly (hidden dir, objects
    /// subdir, empty `HEAD`, empty index, default config) rather than
    /// going through `Repository::init`, since the manager creates
    /// repositories it does not immediately `chdir` into.
    pub fn create(&self, name: &str) -> RepoManagerResult<()> {
        let path = self.path(name)?;
        if self.exists(name) {
            return Err(RepoManagerError::AlreadyExists(name.to_owned()));
        }
        let minigit_dir = path.join(Repository::minigit_dir_name());
        fs::create_dir_all(&minigit_dir)?;
        ObjectStore::init(minigit_dir.join("objects"))?;
        fs::write(minigit_dir.join("HEAD"), "")?;
        Index::new().save(&minigit_dir.join("index"))?;
        RepoConfig::default_for_init().save(&minigit_dir.join("config"))?;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> RepoManagerResult<()> {
        let path = self.path(name)?;
        if !self.exists(name) {
            return Err(RepoManagerError::NotFound(name.to_owned()));
        }
        fs::remove_dir_all(path)?;
        Ok(())
    }

    /// Opens the commit graph of an existing repository, for the push/pull/
    /// log/clone handlers.
    pub fn graph_for(&self, name: &str) -> RepoManagerResult<CommitGraph> {
        let path = self.path(name)?;
        if !self.exists(name) {
            return Err(RepoManagerError::NotFound(name.to_owned()));
        }
        let minigit_dir = path.join(Repository::minigit_dir_name());
        let store = ObjectStore::new(minigit_dir.join("objects"));
        Ok(CommitGraph::new(store, minigit_dir.join("HEAD")))
    }

    /// Last-modified time (seconds since the epoch) and commit count,
    /// supplementing `LIST_REPOS_RESPONSE` per §6.2's `RepoListing` fields.
    pub fn stats_for(&self, name: &str) -> RepoManagerResult<(u64, u32)> {
        let path = self.path(name)?;
        let metadata = fs::metadata(path.join(Repository::minigit_dir_name()).join("HEAD"))?;
        let last_modified = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let graph = self.graph_for(name)?;
        let head = graph.head().map_err(|err| RepoManagerError::Io(io::Error::other(err)))?;
        let mut commit_count = 0u32;
        for commit in graph.walk(head, None) {
            commit.map_err(|err| RepoManagerError::Io(io::Error::other(err)))?;
            commit_count += 1;
        }
        Ok((last_modified, commit_count))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn create_then_list_then_exists() {
        let dir = TempDir::new().unwrap();
        let manager = RepoManager::new(dir.path());
        manager.create("demo").unwrap();
        assert!(manager.exists("demo"));
        assert_eq!(manager.list().unwrap(), vec!["demo".to_owned()]);
    }

    #[test]
    fn create_rejects_duplicate() {
        let dir = TempDir::new().unwrap();
        let manager = RepoManager::new(dir.path());
        manager.create("demo").unwrap();
        assert_matches::assert_matches!(manager.create("demo"), Err(RepoManagerError::AlreadyExists(_)));
    }

    #[test]
    fn rejects_traversal_names() {
        let dir = TempDir::new().unwrap();
        let manager = RepoManager::new(dir.path());
        assert_matches::assert_matches!(manager.create(".."), Err(RepoManagerError::InvalidName(_)));
        assert_matches::assert_matches!(manager.create("a/../b"), Err(RepoManagerError::InvalidName(_)));
        assert_matches::assert_matches!(manager.create(""), Err(RepoManagerError::InvalidName(_)));
    }

    #[test]
    fn remove_then_not_exists() {
        let dir = TempDir::new().unwrap();
        let manager = RepoManager::new(dir.path());
        manager.create("demo").unwrap();
        manager.remove("demo").unwrap();
        assert!(!manager.exists("demo"));
    }

    #[test]
    fn remove_missing_fails() {
        let dir = TempDir::new().unwrap();
        let manager = RepoManager::new(dir.path());
        assert_matches::assert_matches!(manager.remove("nope"), Err(RepoManagerError::NotFound(_)));
    }
}
