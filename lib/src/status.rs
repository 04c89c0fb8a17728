//! Working-directory status inference and rename detection (C5).

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use ignore::WalkBuilder;

use crate::hash::ObjectId;
use crate::hash::hash_file;
use crate::index::Index;
use crate::tree::Tree;

/// One of the eight status codes from the `(HEAD, Index, Worktree)`
/// presence/equality table, plus `R` for a detected rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// `??` — present only in the working tree.
    Untracked,
    /// `D` — deleted: present in HEAD (and unchanged in the index if
    /// staged), absent from the working tree.
    Deleted,
    /// `MD` — staged with different content than HEAD, then deleted from
    /// the working tree.
    ModifiedDeleted,
    /// `AD` — staged as new, then deleted before commit.
    AddedDeleted,
    /// `A` — newly staged, working tree matches the staged content.
    Added,
    /// `AM` — newly staged, then modified again in the working tree.
    AddedModified,
    /// `M` — modified relative to HEAD.
    Modified,
    /// `MM` — staged modification, then modified again in the working
    /// tree.
    ModifiedModified,
    /// `R` — a deleted path and an untracked path with identical content,
    /// collapsed into a single rename entry.
    Renamed,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Untracked => "??",
            Self::Deleted => "D",
            Self::ModifiedDeleted => "MD",
            Self::AddedDeleted => "AD",
            Self::Added => "A",
            Self::AddedModified => "AM",
            Self::Modified => "M",
            Self::ModifiedModified => "MM",
            Self::Renamed => "R",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub status: StatusCode,
    pub path: String,
    pub old_path: Option<String>,
}

/// Computes `FileStatus` records for `(head_tree, index, workdir_root)`,
/// then collapses exact-content delete/untracked pairs into renames.
pub struct WorkdirAnalyzer;

impl WorkdirAnalyzer {
    pub fn analyze(
        head_tree: &Tree,
        index: &Index,
        workdir_root: &Path,
    ) -> io::Result<Vec<FileStatus>> {
        let working = collect_working_tree(workdir_root)?;

        let mut paths = BTreeSet::new();
        paths.extend(head_tree.keys().cloned());
        paths.extend(index.paths().map(str::to_owned));
        paths.extend(working.keys().cloned());

        let mut statuses = Vec::new();
        for path in paths {
            let h = head_tree.get(&path);
            let i = index.get(&path);
            let w = working.get(&path);
            let code = classify(h, i, w);
            if let Some(status) = code {
                statuses.push(FileStatus {
                    status,
                    path,
                    old_path: None,
                });
            }
        }

        collapse_renames(&mut statuses, head_tree, &working);
        Ok(statuses)
    }
}

fn classify(h: Option<&ObjectId>, i: Option<&ObjectId>, w: Option<&ObjectId>) -> Option<StatusCode> {
    match (h, i, w) {
        (None, None, Some(_)) => Some(StatusCode::Untracked),
        (Some(_), None, None) => Some(StatusCode::Deleted),
        (Some(h), Some(i), None) => {
            if h == i {
                Some(StatusCode::Deleted)
            } else {
                Some(StatusCode::ModifiedDeleted)
            }
        }
        (None, Some(_), None) => Some(StatusCode::AddedDeleted),
        (None, Some(i), Some(w)) => {
            if i == w {
                Some(StatusCode::Added)
            } else {
                Some(StatusCode::AddedModified)
            }
        }
        (Some(h), None, Some(w)) => {
            if h == w {
                None
            } else {
                Some(StatusCode::Modified)
            }
        }
        (Some(h), Some(i), Some(w)) => {
            if h == i && i == w {
                None
            } else if h != i && i == w {
                Some(StatusCode::Modified)
            } else if h == i && i != w {
                Some(StatusCode::Modified)
            } else {
                Some(StatusCode::ModifiedModified)
            }
        }
        (None, None, None) => None,
    }
}

/// Scans `(D, ??)` pairs; when a deleted path's HEAD id matches an
/// untracked path's working-tree id, collapses both into one `R` entry
/// with `old_path` set to the deleted path. Only exact-content renames are
/// detected — this is a byte-for-byte match, not a similarity heuristic.
fn collapse_renames(
    statuses: &mut Vec<FileStatus>,
    head_tree: &Tree,
    working: &BTreeMap<String, ObjectId>,
) {
    let deleted_indices: Vec<usize> = statuses
        .iter()
        .enumerate()
        .filter(|(_, s)| s.status == StatusCode::Deleted)
        .map(|(idx, _)| idx)
        .collect();
    let mut untracked_indices: Vec<usize> = statuses
        .iter()
        .enumerate()
        .filter(|(_, s)| s.status == StatusCode::Untracked)
        .map(|(idx, _)| idx)
        .collect();

    let mut pairs = Vec::new();
    for deleted_idx in deleted_indices {
        let deleted_id = match head_tree.get(&statuses[deleted_idx].path) {
            Some(id) => id,
            None => continue,
        };
        if let Some(pos) = untracked_indices.iter().position(|&untracked_idx| {
            working
                .get(&statuses[untracked_idx].path)
                .is_some_and(|id| id == deleted_id)
        }) {
            let untracked_idx = untracked_indices.remove(pos);
            pairs.push((deleted_idx, untracked_idx));
        }
    }

    for (deleted_idx, untracked_idx) in pairs {
        let old_path = statuses[deleted_idx].path.clone();
        statuses[untracked_idx].status = StatusCode::Renamed;
        statuses[untracked_idx].old_path = Some(old_path);
    }
    // Discard the original `D` entries that were folded into a rename.
    let renamed_old_paths: BTreeSet<String> = statuses
        .iter()
        .filter(|s| s.status == StatusCode::Renamed)
        .filter_map(|s| s.old_path.clone())
        .collect();
    statuses.retain(|s| !(s.status == StatusCode::Deleted && renamed_old_paths.contains(&s.path)));
}

/// Enumerates working-tree files under `root`, honoring `.minigitignore`
/// and always skipping the repository's own `.minigit/` metadata
/// directory, hashing each file to produce `W`.
fn collect_working_tree(root: &Path) -> io::Result<BTreeMap<String, ObjectId>> {
    let mut working = BTreeMap::new();
    let walker = WalkBuilder::new(root)
        .add_custom_ignore_filename(".minigitignore")
        .filter_entry(|entry| entry.file_name() != ".minigit")
        .build();
    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let abs = entry.path();
        let rel = abs
            .strip_prefix(root)
            .unwrap_or(abs)
            .to_string_lossy()
            .replace('\\', "/");
        working.insert(rel, hash_file(abs)?);
    }
    Ok(working)
}

/// Reads a tracked working-tree file's bytes, used by `checkout`/`reset
/// --hard` callers that need raw content rather than just its status.
pub fn read_working_file(root: &Path, rel_path: &str) -> io::Result<Vec<u8>> {
    fs::read(root.join(rel_path))
}
