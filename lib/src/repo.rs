//! `Repository` (C6): ties `HEAD`, the index, the object store, and the
//! commit graph together, and implements the local commands
//! (`init`/`add`/`commit`/`status`/`checkout`/`reset`/`log`/`diff`) as
//! small state transitions over C2–C5. The CLI layer is a thin caller of
//! these methods: one method call per command, printed through `Ui`.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::clock::wall_clock_now;
use crate::commit::Commit;
use crate::commit::CommitGraph;
use crate::commit::CommitGraphError;
use crate::config::RepoConfig;
use crate::hash::ObjectId;
use crate::index::Index;
use crate::index::IndexError;
use crate::object_store::ObjectStore;
use crate::object_store::ObjectStoreError;
use crate::status::FileStatus;
use crate::status::StatusCode;
use crate::status::WorkdirAnalyzer;
use crate::tree::Tree;
use crate::tree::TreeDiff;
use crate::tree::diff_trees;
use crate::tree::tree_from_index;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("'{0}' is already a minigit repository")]
    AlreadyInitialized(PathBuf),
    #[error("'{0}' is not a minigit repository (no .minigit directory)")]
    NotARepository(PathBuf),
    #[error("nothing to commit: the index is empty")]
    EmptyIndex,
    #[error("unknown commit id '{0}'")]
    UnknownCommit(ObjectId),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    CommitGraph(#[from] CommitGraphError),
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Soft,
    Mixed,
    Hard,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddReport {
    pub staged: Vec<String>,
    pub removed: Vec<String>,
}

impl AddReport {
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.removed.is_empty()
    }
}

pub struct Repository {
    root: PathBuf,
    minigit_dir: PathBuf,
    store: ObjectStore,
    graph: CommitGraph,
    index: Index,
}

impl Repository {
    pub fn minigit_dir_name() -> &'static str {
        ".minigit"
    }

    /// Creates a brand-new repository at `root`. Fails if `root` already
    /// contains the hidden metadata directory.
    pub fn init(root: &Path) -> RepoResult<Self> {
        let minigit_dir = root.join(Self::minigit_dir_name());
        if minigit_dir.exists() {
            return Err(RepoError::AlreadyInitialized(root.to_path_buf()));
        }
        fs::create_dir_all(&minigit_dir)?;
        let store = ObjectStore::init(minigit_dir.join("objects"))?;
        fs::write(minigit_dir.join("HEAD"), "")?;
        let index = Index::new();
        index.save(&minigit_dir.join("index"))?;
        RepoConfig::default_for_init().save(&minigit_dir.join("config"))?;
        let graph = CommitGraph::new(store.clone(), minigit_dir.join("HEAD"));
        tracing::info!(root = %root.display(), "initialized repository");
        Ok(Self {
            root: root.to_path_buf(),
            minigit_dir,
            store,
            graph,
            index,
        })
    }

    /// Opens an existing repository at `root`.
    pub fn open(root: &Path) -> RepoResult<Self> {
        let minigit_dir = root.join(Self::minigit_dir_name());
        if !minigit_dir.is_dir() {
            return Err(RepoError::NotARepository(root.to_path_buf()));
        }
        let store = ObjectStore::new(minigit_dir.join("objects"));
        let graph = CommitGraph::new(store.clone(), minigit_dir.join("HEAD"));
        let index = Index::load(&minigit_dir.join("index"))?;
        Ok(Self {
            root: root.to_path_buf(),
            minigit_dir,
            store,
            graph,
            index,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn config_path(&self) -> PathBuf {
        self.minigit_dir.join("config")
    }

    pub fn load_config(&self) -> io::Result<RepoConfig> {
        RepoConfig::load(&self.config_path())
    }

    pub fn save_config(&self, config: &RepoConfig) -> io::Result<()> {
        config.save(&self.config_path())
    }

    fn save_index(&self) -> RepoResult<()> {
        self.index
            .save(&self.minigit_dir.join("index"))
            .map_err(Into::into)
    }

    pub fn head(&self) -> RepoResult<ObjectId> {
        Ok(self.graph.head()?)
    }

    /// The tree of the commit at `HEAD`, or an empty tree before the first
    /// commit.
    pub fn head_tree(&self) -> RepoResult<Tree> {
        let head = self.graph.head()?;
        if head.is_empty() {
            return Ok(Tree::new());
        }
        Ok(self.graph.load_commit(&head)?.tree)
    }

    pub fn status(&self) -> RepoResult<Vec<FileStatus>> {
        let head_tree = self.head_tree()?;
        Ok(WorkdirAnalyzer::analyze(&head_tree, &self.index, &self.root)?)
    }

    /// Stages every `M`, `??`, `D`, or `R` status entry whose path falls
    /// under one of `paths` (repository-root-relative, forward-slash
    /// paths). Other status kinds (`MD`, `AD`, `A`, `AM`, `MM`) already
    /// reflect prior staging and are left alone, matching spec.md's
    /// `add` contract.
    pub fn add(&mut self, paths: &[String]) -> RepoResult<AddReport> {
        let head_tree = self.head_tree()?;
        let statuses = WorkdirAnalyzer::analyze(&head_tree, &self.index, &self.root)?;

        let mut report = AddReport::default();
        for requested in paths {
            let requested = normalize_arg(requested);
            for status in &statuses {
                if !matches!(
                    status.status,
                    StatusCode::Modified
                        | StatusCode::Untracked
                        | StatusCode::Deleted
                        | StatusCode::Renamed
                ) {
                    continue;
                }
                if !is_under(&status.path, &requested) {
                    continue;
                }
                match status.status {
                    StatusCode::Modified | StatusCode::Untracked => {
                        self.index
                            .stage_path(&self.root, &self.root.join(&status.path), &self.store)?;
                        report.staged.push(status.path.clone());
                    }
                    StatusCode::Deleted => {
                        self.index.remove(&status.path);
                        report.removed.push(status.path.clone());
                    }
                    StatusCode::Renamed => {
                        if let Some(old) = &status.old_path {
                            self.index.remove(old);
                        }
                        self.index
                            .stage_path(&self.root, &self.root.join(&status.path), &self.store)?;
                        report.staged.push(status.path.clone());
                    }
                    _ => unreachable!("filtered above"),
                }
            }
        }
        self.save_index()?;
        Ok(report)
    }

    /// Commits the current index. The index is intentionally left intact
    /// afterward (it already equals the new commit's tree) rather than
    /// cleared — the binding resolution of the two contradictory source
    /// behaviors spec.md §9 calls out.
    pub fn commit(&mut self, message: String) -> RepoResult<Commit> {
        if self.index.is_empty() {
            return Err(RepoError::EmptyIndex);
        }
        let parent = self.graph.head()?;
        let tree = tree_from_index(&self.index);
        let commit = self
            .graph
            .store_commit(parent, message, wall_clock_now(), tree)?;
        tracing::info!(id = %commit.id, "committed");
        Ok(commit)
    }

    /// Writes every `HEAD`-tree entry into the working tree, creating
    /// parent directories and overwriting existing files. There is no
    /// branch argument: this always checks out `HEAD`.
    pub fn checkout(&self) -> RepoResult<()> {
        let tree = self.head_tree()?;
        self.write_tree_to_workdir(&tree)
    }

    fn write_tree_to_workdir(&self, tree: &Tree) -> RepoResult<()> {
        for (path, id) in tree {
            let bytes = self.store.get(id)?;
            let dest = self.root.join(path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(dest, bytes)?;
        }
        Ok(())
    }

    /// Resolves `target` (defaulting to `HEAD`), always overwrites `HEAD`
    /// with it, and for `--mixed`/`--hard` replaces the index with the
    /// target's tree. `--hard` additionally deletes tracked files absent
    /// from the target tree and copies every target entry into the
    /// working tree. "Tracked" is the union of the pre-reset index and
    /// pre-reset `HEAD` tree paths.
    pub fn reset(&mut self, mode: ResetMode, target: Option<ObjectId>) -> RepoResult<()> {
        let pre_reset_tracked: HashSet<String> = self
            .index
            .paths()
            .map(str::to_owned)
            .chain(self.head_tree()?.into_keys())
            .collect();

        let target_id = match target {
            Some(id) => id,
            None => self.graph.head()?,
        };
        let target_tree = if target_id.is_empty() {
            Tree::new()
        } else {
            self.graph.load_commit(&target_id)?.tree
        };

        self.graph.set_head(&target_id)?;

        if matches!(mode, ResetMode::Mixed | ResetMode::Hard) {
            self.index = Index::new();
            for (path, id) in &target_tree {
                self.index.insert(path.clone(), id.clone());
            }
            self.save_index()?;
        }

        if mode == ResetMode::Hard {
            for path in &pre_reset_tracked {
                if !target_tree.contains_key(path) {
                    let _ = fs::remove_file(self.root.join(path));
                }
            }
            self.write_tree_to_workdir(&target_tree)?;
        }
        Ok(())
    }

    /// Walks commits from `HEAD`, newest first, limited to `max` entries.
    pub fn log(&self, max: Option<usize>) -> RepoResult<Vec<Commit>> {
        let head = self.graph.head()?;
        let mut commits = Vec::new();
        for commit in self.graph.walk(head, None) {
            commits.push(commit?);
            if max.is_some_and(|max| commits.len() >= max) {
                break;
            }
        }
        Ok(commits)
    }

    /// Paths added/modified/deleted by `commit` relative to its parent,
    /// used by `log`'s multi-line entry format.
    pub fn commit_diff(&self, commit: &Commit) -> RepoResult<TreeDiff> {
        let parent_tree = if commit.parent.is_empty() {
            Tree::new()
        } else {
            self.graph.load_commit(&commit.parent)?.tree
        };
        Ok(diff_trees(&parent_tree, &commit.tree))
    }

    /// `--cached`: the diff between `HEAD` and the index. Otherwise the
    /// same working-tree status table `status` reports.
    pub fn diff(&self, cached: bool) -> RepoResult<Vec<FileStatus>> {
        if !cached {
            return self.status();
        }
        let head_tree = self.head_tree()?;
        let index_tree = tree_from_index(&self.index);
        let diff = diff_trees(&head_tree, &index_tree);
        let mut statuses = Vec::new();
        statuses.extend(diff.added.into_iter().map(|path| FileStatus {
            status: StatusCode::Added,
            path,
            old_path: None,
        }));
        statuses.extend(diff.modified.into_iter().map(|path| FileStatus {
            status: StatusCode::Modified,
            path,
            old_path: None,
        }));
        statuses.extend(diff.removed.into_iter().map(|path| FileStatus {
            status: StatusCode::Deleted,
            path,
            old_path: None,
        }));
        Ok(statuses)
    }
}

fn normalize_arg(path: &str) -> String {
    let trimmed = path.trim_start_matches("./");
    if trimmed.is_empty() { ".".to_owned() } else { trimmed.replace('\\', "/") }
}

fn is_under(path: &str, requested: &str) -> bool {
    requested == "." || path == requested || path.starts_with(&format!("{requested}/"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn init_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn init_rejects_existing_repository() {
        let (dir, _repo) = init_repo();
        assert_matches::assert_matches!(
            Repository::init(dir.path()),
            Err(RepoError::AlreadyInitialized(_))
        );
    }

    #[test]
    fn open_rejects_non_repository() {
        let dir = TempDir::new().unwrap();
        assert_matches::assert_matches!(Repository::open(dir.path()), Err(RepoError::NotARepository(_)));
    }

    #[test]
    fn s1_init_add_commit_log() {
        let (dir, mut repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();

        let report = repo.add(&["a.txt".to_owned()]).unwrap();
        assert_eq!(report.staged, vec!["a.txt".to_owned()]);

        let commit = repo.commit("m1".to_owned()).unwrap();
        assert!(!commit.id.is_empty());
        assert_eq!(repo.head().unwrap(), commit.id);

        let log = repo.log(Some(1)).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "m1");

        assert!(repo.status().unwrap().is_empty());
    }

    #[test]
    fn commit_with_empty_index_fails() {
        let (_dir, mut repo) = init_repo();
        assert_matches::assert_matches!(repo.commit("nothing".to_owned()), Err(RepoError::EmptyIndex));
    }

    #[test]
    fn index_survives_commit() {
        let (dir, mut repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
        repo.add(&["a.txt".to_owned()]).unwrap();
        repo.commit("m1".to_owned()).unwrap();
        assert_eq!(repo.index().len(), 1);
    }

    #[test]
    fn reset_hard_restores_working_tree_to_target() {
        let (dir, mut repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"v1\n").unwrap();
        repo.add(&["a.txt".to_owned()]).unwrap();
        let c1 = repo.commit("v1".to_owned()).unwrap();

        fs::write(dir.path().join("a.txt"), b"v2\n").unwrap();
        repo.add(&["a.txt".to_owned()]).unwrap();
        repo.commit("v2".to_owned()).unwrap();

        repo.reset(ResetMode::Hard, Some(c1.id.clone())).unwrap();
        assert_eq!(repo.head().unwrap(), c1.id);
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"v1\n");
        assert!(repo.status().unwrap().is_empty());
    }

    #[test]
    fn reset_hard_removes_files_absent_from_target() {
        let (dir, mut repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"v1\n").unwrap();
        repo.add(&["a.txt".to_owned()]).unwrap();
        let c1 = repo.commit("v1".to_owned()).unwrap();

        fs::write(dir.path().join("b.txt"), b"v2\n").unwrap();
        repo.add(&["b.txt".to_owned()]).unwrap();
        repo.commit("v2".to_owned()).unwrap();

        repo.reset(ResetMode::Hard, Some(c1.id)).unwrap();
        assert!(!dir.path().join("b.txt").exists());
    }

    #[test]
    fn add_of_deleted_path_removes_from_index() {
        let (dir, mut repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"v1\n").unwrap();
        repo.add(&["a.txt".to_owned()]).unwrap();
        repo.commit("v1".to_owned()).unwrap();

        fs::remove_file(dir.path().join("a.txt")).unwrap();
        let report = repo.add(&["a.txt".to_owned()]).unwrap();
        assert_eq!(report.removed, vec!["a.txt".to_owned()]);
        assert!(repo.index().get("a.txt").is_none());
    }

    #[test]
    fn diff_cached_reports_staged_but_uncommitted_changes() {
        let (dir, mut repo) = init_repo();
        fs::write(dir.path().join("a.txt"), b"v1\n").unwrap();
        repo.add(&["a.txt".to_owned()]).unwrap();

        let diff = repo.diff(true).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].status, StatusCode::Added);
    }
}
