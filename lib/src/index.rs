//! The staging index (C3): an ordered mapping from working-tree path to
//! blob id, representing the tree that the *next* commit will record.

use std::fs;
use std::io;
use std::path::Path;

use ignore::WalkBuilder;
use indexmap::IndexMap;

use crate::hash::ObjectId;
use crate::hash::hash_file;
use crate::object_store::ObjectStore;
use crate::object_store::ObjectStoreError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("object store error while staging: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    #[error("malformed index line: {0:?}")]
    Malformed(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Order-preserving path → blob-id map. `IndexMap` (rather than a sorted
/// map) is used deliberately: repeated serialization of the same logical
/// content must be stable, but the index otherwise has no ordering
/// requirement of its own — insertion order is simply whatever order paths
/// were staged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: IndexMap<String, ObjectId>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the `path TAB id` lines persisted at `<repo>/.minigit/index`.
    /// A missing file is treated as an empty index (the state right after
    /// `init`).
    pub fn load(path: &Path) -> IndexResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(err.into()),
        };
        let mut entries = IndexMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let (path, id) = line
                .split_once('\t')
                .ok_or_else(|| IndexError::Malformed(line.to_owned()))?;
            entries.insert(path.to_owned(), ObjectId::from_hex(id));
        }
        Ok(Self { entries })
    }

    /// Overwrites the on-disk index with the current in-memory contents.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let mut text = String::new();
        for (path, id) in &self.entries {
            text.push_str(path);
            text.push('\t');
            text.push_str(id.as_str());
            text.push('\n');
        }
        fs::write(path, text)?;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, id: ObjectId) {
        self.entries.insert(path.into(), id);
    }

    pub fn remove(&mut self, path: &str) -> Option<ObjectId> {
        self.entries.shift_remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.entries.iter().map(|(p, id)| (p.as_str(), id))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Recursively enumerates files under `path` (honoring `.minigitignore`
    /// via the same walker `status`/`diff` use), hashes and stores each as a
    /// blob, and records it in the index. Returns the repository-relative
    /// paths that were staged.
    pub fn stage_path(
        &mut self,
        repo_root: &Path,
        path: &Path,
        store: &ObjectStore,
    ) -> IndexResult<Vec<String>> {
        let mut staged = Vec::new();
        let walker = WalkBuilder::new(path)
            .add_custom_ignore_filename(".minigitignore")
            .build();
        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let abs = entry.path();
            let rel = abs
                .strip_prefix(repo_root)
                .unwrap_or(abs)
                .to_string_lossy()
                .replace('\\', "/");
            let id = hash_file(abs)?;
            let bytes = fs::read(abs)?;
            store.put_with_id(&id, &bytes)?;
            self.insert(rel.clone(), id);
            staged.push(rel);
        }
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("index");

        let mut index = Index::new();
        index.insert("a.txt", ObjectId::from_hex("a".repeat(40)));
        index.insert("dir/b.txt", ObjectId::from_hex("b".repeat(40)));
        index.save(&index_path).unwrap();

        let loaded = Index::load(&index_path).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = Index::load(&dir.path().join("no-such-index")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn stage_path_hashes_and_records_files() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::init(dir.path().join(".minigit/objects")).unwrap();
        fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();

        let mut index = Index::new();
        let staged = index
            .stage_path(dir.path(), &dir.path().join("a.txt"), &store)
            .unwrap();

        assert_eq!(staged, vec!["a.txt".to_owned()]);
        let id = index.get("a.txt").unwrap();
        assert!(store.has(id));
        assert_eq!(store.get(id).unwrap(), b"hello\n");
    }

    #[test]
    fn remove_drops_entry_preserving_remaining_order() {
        let mut index = Index::new();
        index.insert("a.txt", ObjectId::from_hex("a".repeat(40)));
        index.insert("b.txt", ObjectId::from_hex("b".repeat(40)));
        index.remove("a.txt");
        assert_eq!(index.paths().collect::<Vec<_>>(), vec!["b.txt"]);
    }
}
