//! The tree embedded in a commit (C4): a mapping from repository-relative
//! path to blob id. A `BTreeMap` is used rather than the index's
//! `IndexMap` — entry order has no semantic meaning here, but the
//! serialization that feeds the commit hash must be deterministic
//! regardless of the order paths were staged in, and a sorted map gets that
//! for free.

use std::collections::BTreeMap;

use crate::hash::ObjectId;
use crate::index::Index;

pub type Tree = BTreeMap<String, ObjectId>;

/// Snapshots the index into the tree that a commit built from it would
/// record.
pub fn tree_from_index(index: &Index) -> Tree {
    index
        .iter()
        .map(|(path, id)| (path.to_owned(), id.clone()))
        .collect()
}

/// Paths changed between `from` and `to`, partitioned the way `log`'s
/// per-commit entries and the rename-aware status table report them:
/// added (present in `to`, absent from `from`), modified (present in both
/// with a different id), and removed (present in `from`, absent from `to`).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

pub fn diff_trees(from: &Tree, to: &Tree) -> TreeDiff {
    let mut diff = TreeDiff::default();
    for (path, to_id) in to {
        match from.get(path) {
            None => diff.added.push(path.clone()),
            Some(from_id) if from_id != to_id => diff.modified.push(path.clone()),
            Some(_) => {}
        }
    }
    for path in from.keys() {
        if !to.contains_key(path) {
            diff.removed.push(path.clone());
        }
    }
    diff.added.sort();
    diff.modified.sort();
    diff.removed.sort();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_from_index_preserves_entries_sorted() {
        let mut index = Index::new();
        index.insert("z.txt", ObjectId::from_hex("1".repeat(40)));
        index.insert("a.txt", ObjectId::from_hex("2".repeat(40)));
        let tree = tree_from_index(&index);
        assert_eq!(
            tree.keys().collect::<Vec<_>>(),
            vec!["a.txt", "z.txt"]
        );
    }

    #[test]
    fn diff_trees_reports_added_modified_removed() {
        let id1 = ObjectId::from_hex("1".repeat(40));
        let id2 = ObjectId::from_hex("2".repeat(40));

        let mut from = Tree::new();
        from.insert("same.txt".into(), id1.clone());
        from.insert("changed.txt".into(), id1.clone());
        from.insert("gone.txt".into(), id1.clone());

        let mut to = Tree::new();
        to.insert("same.txt".into(), id1.clone());
        to.insert("changed.txt".into(), id2.clone());
        to.insert("new.txt".into(), id2);

        let diff = diff_trees(&from, &to);
        assert_eq!(diff.added, vec!["new.txt"]);
        assert_eq!(diff.modified, vec!["changed.txt"]);
        assert_eq!(diff.removed, vec!["gone.txt"]);
    }
}
