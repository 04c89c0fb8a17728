//! Commit records and the commit graph (C4).
//!
//! A commit is serialized with a deterministic, explicit length-prefixed
//! canonical encoding rather than the source's hand-rolled JSON-like format
//! with ad-hoc escaping: fields are `u32`-length-prefixed in a fixed order,
//! so two commits with identical content always produce identical bytes and
//! therefore the same id.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::byte_cursor::ByteReader;
use crate::byte_cursor::ByteWriter;
use crate::hash::ObjectId;
use crate::hash::hash_bytes;
use crate::object_store::ObjectStore;
use crate::object_store::ObjectStoreError;
use crate::tree::Tree;

#[derive(Debug, thiserror::Error)]
pub enum CommitGraphError {
    #[error("commit graph I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    #[error("malformed commit object {0}: {1}")]
    Malformed(ObjectId, String),
}

pub type CommitGraphResult<T> = Result<T, CommitGraphError>;

/// A stored snapshot: its parent (empty for the initial commit, since
/// history here is strictly linear — no merges), a message, an ISO-8601
/// local timestamp, and the tree it recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: ObjectId,
    pub parent: ObjectId,
    pub message: String,
    pub timestamp: String,
    pub tree: Tree,
}

impl Commit {
    /// Canonical bytes hashed to produce the commit id: parent, message,
    /// timestamp, then the tree's `(path, id)` pairs in `BTreeMap` (sorted)
    /// order, each length-prefixed.
    fn canonical_bytes(parent: &ObjectId, message: &str, timestamp: &str, tree: &Tree) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_str(parent.as_str());
        w.write_str(message);
        w.write_str(timestamp);
        w.write_u32(tree.len() as u32);
        for (path, id) in tree {
            w.write_str(path);
            w.write_str(id.as_str());
        }
        w.into_bytes()
    }

    fn parse(id: ObjectId, bytes: &[u8]) -> CommitGraphResult<Self> {
        let map_err = |err: io::Error| CommitGraphError::Malformed(id.clone(), err.to_string());
        let mut r = ByteReader::new(bytes);
        let parent = ObjectId::from_hex(r.read_string().map_err(map_err)?);
        let message = r.read_string().map_err(map_err)?;
        let timestamp = r.read_string().map_err(map_err)?;
        let entry_count = r.read_u32().map_err(map_err)? as usize;
        let mut tree = Tree::new();
        for _ in 0..entry_count {
            let path = r.read_string().map_err(map_err)?;
            let entry_id = ObjectId::from_hex(r.read_string().map_err(map_err)?);
            tree.insert(path, entry_id);
        }
        Ok(Self {
            id,
            parent,
            message,
            timestamp,
            tree,
        })
    }

    /// Serialized bytes as stored in the object store, and as hashed to
    /// produce `self.id`.
    pub fn encode(&self) -> Vec<u8> {
        Self::canonical_bytes(&self.parent, &self.message, &self.timestamp, &self.tree)
    }
}

/// Owns the object store and the `HEAD` file, and ties commit storage,
/// lookup, and ancestry traversal together.
#[derive(Debug, Clone)]
pub struct CommitGraph {
    store: ObjectStore,
    head_path: PathBuf,
}

impl CommitGraph {
    pub fn new(store: ObjectStore, head_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            head_path: head_path.into(),
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Current `HEAD`, or the empty id if the repository has no commits
    /// yet.
    pub fn head(&self) -> CommitGraphResult<ObjectId> {
        match fs::read_to_string(&self.head_path) {
            Ok(text) => Ok(ObjectId::from_hex(text.trim().to_owned())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ObjectId::empty()),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically overwrites `HEAD` with `id`.
    fn write_head(&self, id: &ObjectId) -> io::Result<()> {
        let dir = self
            .head_path
            .parent()
            .expect("HEAD path must have a parent directory");
        let mut tmp = NamedTempFile::new_in(dir)?;
        io::Write::write_all(&mut tmp, id.as_str().as_bytes())?;
        tmp.as_file().sync_data()?;
        tmp.persist(&self.head_path)
            .map_err(|err| err.error)?;
        Ok(())
    }

    /// Rewrites `HEAD` to `id` without creating a commit, used by `reset`.
    pub fn set_head(&self, id: &ObjectId) -> CommitGraphResult<()> {
        self.write_head(id)?;
        Ok(())
    }

    /// Canonicalizes the given fields, computes the commit id, writes one
    /// object (idempotent), and atomically advances `HEAD` to it.
    pub fn store_commit(
        &self,
        parent: ObjectId,
        message: String,
        timestamp: String,
        tree: Tree,
    ) -> CommitGraphResult<Commit> {
        let bytes = Commit::canonical_bytes(&parent, &message, &timestamp, &tree);
        let id = hash_bytes(&bytes);
        self.store.put_with_id(&id, &bytes)?;
        self.write_head(&id)?;
        Ok(Commit {
            id,
            parent,
            message,
            timestamp,
            tree,
        })
    }

    /// Retrieves and parses the commit stored under `id`.
    pub fn load_commit(&self, id: &ObjectId) -> CommitGraphResult<Commit> {
        let bytes = self.store.get(id)?;
        Commit::parse(id.clone(), &bytes)
    }

    /// Lazily walks `from, parent(from), …` until an empty parent or
    /// `stop_at` is reached. Cycles are forbidden by invariant but are
    /// guarded against anyway via a visited set, so a corrupt graph can
    /// never spin the walk forever.
    pub fn walk<'a>(
        &'a self,
        from: ObjectId,
        stop_at: Option<&'a ObjectId>,
    ) -> impl Iterator<Item = CommitGraphResult<Commit>> + 'a {
        CommitWalk {
            graph: self,
            next: Some(from),
            stop_at,
            visited: HashSet::new(),
        }
    }
}

struct CommitWalk<'a> {
    graph: &'a CommitGraph,
    next: Option<ObjectId>,
    stop_at: Option<&'a ObjectId>,
    visited: HashSet<ObjectId>,
}

impl Iterator for CommitWalk<'_> {
    type Item = CommitGraphResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if current.is_empty() {
            return None;
        }
        if let Some(stop) = self.stop_at
            && current == *stop
        {
            return None;
        }
        if !self.visited.insert(current.clone()) {
            return None;
        }
        match self.graph.load_commit(&current) {
            Ok(commit) => {
                self.next = Some(commit.parent.clone());
                Some(Ok(commit))
            }
            Err(err) => {
                self.next = None;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn graph() -> (TempDir, CommitGraph) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::init(dir.path().join("objects")).unwrap();
        let graph = CommitGraph::new(store, dir.path().join("HEAD"));
        (dir, graph)
    }

    #[test]
    fn head_is_empty_before_any_commit() {
        let (_dir, graph) = graph();
        assert!(graph.head().unwrap().is_empty());
    }

    #[test]
    fn store_commit_advances_head_and_round_trips() {
        let (_dir, graph) = graph();
        let mut tree = Tree::new();
        tree.insert("a.txt".into(), hash_bytes(b"hello\n"));

        let commit = graph
            .store_commit(ObjectId::empty(), "m1".into(), "2026-07-26T00:00:00".into(), tree.clone())
            .unwrap();

        assert_eq!(graph.head().unwrap(), commit.id);
        let loaded = graph.load_commit(&commit.id).unwrap();
        assert_eq!(loaded, commit);
        assert_eq!(loaded.tree, tree);
    }

    #[test]
    fn same_fields_produce_same_id() {
        let (_dir, graph) = graph();
        let tree = Tree::new();
        let c1 = graph
            .store_commit(ObjectId::empty(), "m".into(), "t".into(), tree.clone())
            .unwrap();
        let c2 = Commit::canonical_bytes(&ObjectId::empty(), "m", "t", &tree);
        assert_eq!(c1.id, hash_bytes(&c2));
    }

    #[test]
    fn walk_follows_parent_chain_and_stops_at_empty() {
        let (_dir, graph) = graph();
        let c1 = graph
            .store_commit(ObjectId::empty(), "m1".into(), "t1".into(), Tree::new())
            .unwrap();
        let c2 = graph
            .store_commit(c1.id.clone(), "m2".into(), "t2".into(), Tree::new())
            .unwrap();

        let messages: Vec<String> = graph
            .walk(c2.id.clone(), None)
            .map(|c| c.unwrap().message)
            .collect();
        assert_eq!(messages, vec!["m2", "m1"]);
    }

    #[test]
    fn walk_stops_at_requested_id() {
        let (_dir, graph) = graph();
        let c1 = graph
            .store_commit(ObjectId::empty(), "m1".into(), "t1".into(), Tree::new())
            .unwrap();
        let c2 = graph
            .store_commit(c1.id.clone(), "m2".into(), "t2".into(), Tree::new())
            .unwrap();
        let c3 = graph
            .store_commit(c2.id.clone(), "m3".into(), "t3".into(), Tree::new())
            .unwrap();

        let messages: Vec<String> = graph
            .walk(c3.id.clone(), Some(&c1.id))
            .map(|c| c.unwrap().message)
            .collect();
        assert_eq!(messages, vec!["m3", "m2"]);
    }
}
