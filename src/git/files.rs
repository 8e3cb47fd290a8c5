//! Per-commit file change lookup using git2.

use git2::{Commit as GitCommit, Diff, DiffOptions, Patch, Repository};
use serde::{Deserialize, Serialize};

/// One file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    /// Lines added, or `None` when the file is binary.
    pub added: Option<u32>,
    /// Lines removed, or `None` when the file is binary.
    pub removed: Option<u32>,
}

/// Diff a commit against its first parent (or the empty tree for root
/// commits) and collect the changed paths with line counts.
///
/// Any failure to load a tree, blob, or patch is returned to the caller,
/// which decides whether the commit is still usable.
pub fn lookup_file_changes(
    repo: &Repository,
    commit: &GitCommit<'_>,
) -> Result<Vec<FileChange>, git2::Error> {
    let new_tree = commit.tree()?;
    let old_tree = match commit.parent_count() {
        0 => None,
        _ => Some(commit.parent(0)?.tree()?),
    };

    let mut opts = DiffOptions::new();
    opts.ignore_submodules(true);
    let diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut opts))?;

    collect_changes(&diff)
}

fn collect_changes(diff: &Diff<'_>) -> Result<Vec<FileChange>, git2::Error> {
    let mut changes = Vec::with_capacity(diff.deltas().len());

    for (idx, delta) in diff.deltas().enumerate() {
        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        if path.is_empty() {
            continue;
        }

        // Binary files yield no patch, or a patch flagged binary.
        let (added, removed) = match Patch::from_diff(diff, idx)? {
            Some(patch) if !patch.delta().flags().is_binary() => {
                let (_context, additions, deletions) = patch.line_stats()?;
                (Some(additions as u32), Some(deletions as u32))
            }
            _ => (None, None),
        };

        changes.push(FileChange {
            path,
            added,
            removed,
        });
    }

    Ok(changes)
}
