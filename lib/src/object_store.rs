//! Content-addressed object store (C2).
//!
//! A flat directory keyed by [`ObjectId`]. Writes go through a
//! temp-file-then-atomic-rename sequence so a reader never observes a
//! partially written object, and because the id is a hash of the content, a
//! write racing another write of the same bytes is a harmless no-op.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::hash::ObjectId;
use crate::hash::hash_bytes;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),
    #[error("object store I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Flat-directory content-addressed byte store rooted at `objects/`.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Opens (without creating) the store rooted at `objects_dir`.
    pub fn new(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: objects_dir.into(),
        }
    }

    /// Creates the `objects/` directory if it does not already exist.
    pub fn init(objects_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let root = objects_dir.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, id: &ObjectId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Computes the id of `bytes`, writes it under that id if absent, and
    /// returns the id. At-most-once write for any id: a second `put` of the
    /// same content observes the file already present and skips the write.
    pub fn put(&self, bytes: &[u8]) -> ObjectStoreResult<ObjectId> {
        let id = hash_bytes(bytes);
        self.put_with_id(&id, bytes)?;
        Ok(id)
    }

    /// Writes `bytes` under the caller-supplied `id` (used when receiving
    /// objects over the wire, where the sender already computed the id).
    pub fn put_with_id(&self, id: &ObjectId, bytes: &[u8]) -> ObjectStoreResult<()> {
        let dest = self.path_for(id);
        if dest.exists() {
            return Ok(());
        }
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        io::Write::write_all(&mut tmp, bytes)?;
        tmp.as_file().sync_data()?;
        persist_noclobber(tmp, &dest)?;
        Ok(())
    }

    pub fn get(&self, id: &ObjectId) -> ObjectStoreResult<Vec<u8>> {
        fs::read(self.path_for(id)).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ObjectStoreError::NotFound(id.clone()),
            _ => ObjectStoreError::Io(err),
        })
    }

    pub fn has(&self, id: &ObjectId) -> bool {
        self.path_for(id).exists()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Renames `tmp` into place at `dest`, tolerating a concurrent writer that
/// got there first with identical content (same id implies same bytes).
#[cfg(unix)]
fn persist_noclobber(tmp: NamedTempFile, dest: &Path) -> io::Result<()> {
    match tmp.persist(dest) {
        Ok(_) => Ok(()),
        Err(err) if dest.exists() => {
            drop(err);
            Ok(())
        }
        Err(err) => Err(err.error),
    }
}

#[cfg(windows)]
fn persist_noclobber(tmp: NamedTempFile, dest: &Path) -> io::Result<()> {
    match tmp.persist_noclobber(dest) {
        Ok(_) => Ok(()),
        Err(err) if dest.exists() => {
            drop(err);
            Ok(())
        }
        Err(err) => Err(err.error),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, ObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::init(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (_dir, store) = store();
        let id = store.put(b"hello\n").unwrap();
        assert!(store.has(&id));
        assert_eq!(store.get(&id).unwrap(), b"hello\n");
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, store) = store();
        let id1 = store.put(b"same bytes").unwrap();
        let id2 = store.put(b"same bytes").unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, store) = store();
        let id = hash_bytes(b"never written");
        assert!(!store.has(&id));
        assert_matches::assert_matches!(store.get(&id), Err(ObjectStoreError::NotFound(_)));
    }

    #[test]
    fn put_with_id_used_for_received_objects() {
        let (_dir, store) = store();
        let id = hash_bytes(b"from the wire");
        store.put_with_id(&id, b"from the wire").unwrap();
        assert_eq!(store.get(&id).unwrap(), b"from the wire");
    }
}
