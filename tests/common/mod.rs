//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use git2::{Oid, Repository, Signature, Time};

/// A fixed reference instant so window arithmetic is reproducible.
pub fn reference_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// `days` before [`reference_now`].
pub fn days_ago(days: i64) -> DateTime<Utc> {
    reference_now() - Duration::days(days)
}

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit `files` (path, contents) as the default author at `when`.
    pub fn commit_at(&self, message: &str, files: &[(&str, &str)], when: DateTime<Utc>) -> Oid {
        self.commit_as("Test User", "test@example.com", message, files, when)
    }

    /// Commit `files` as a specific author at `when`.
    pub fn commit_as(
        &self,
        name: &str,
        email: &str,
        message: &str,
        files: &[(&str, &str)],
        when: DateTime<Utc>,
    ) -> Oid {
        let entries: Vec<(&str, &[u8])> = files.iter().map(|(p, c)| (*p, c.as_bytes())).collect();
        self.commit_bytes(name, email, message, &entries, when)
    }

    /// Commit raw file contents, for binary files.
    pub fn commit_bytes(
        &self,
        name: &str,
        email: &str,
        message: &str,
        files: &[(&str, &[u8])],
        when: DateTime<Utc>,
    ) -> Oid {
        let sig = Signature::new(name, email, &Time::new(when.timestamp(), 0))
            .expect("Failed to create signature");

        let mut index = self.repo.index().expect("Failed to get index");
        for (path, content) in files {
            let full = self.dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("Failed to create directories");
            }
            std::fs::write(&full, content).expect("Failed to write test file");
            index.add_path(Path::new(path)).expect("Failed to add file");
        }
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Create a branch pointing to the given OID.
    pub fn branch(&self, name: &str, oid: Oid) {
        let commit = self.repo.find_commit(oid).expect("Failed to find commit");
        self.repo.branch(name, &commit, false).expect("Failed to create branch");
    }

    /// Record a merge of `other` into HEAD without changing the tree.
    pub fn merge_at(&self, other: Oid, message: &str, when: DateTime<Utc>) -> Oid {
        let sig = Signature::new("Test User", "test@example.com", &Time::new(when.timestamp(), 0))
            .expect("Failed to create signature");
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .expect("Failed to read HEAD");
        let other = self.repo.find_commit(other).expect("Failed to find commit");
        let tree = head.tree().expect("Failed to read tree");

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head, &other])
            .expect("Failed to create merge commit")
    }

    /// Delete the loose object file backing `commit`'s root tree.
    pub fn corrupt_tree_of(&self, commit: Oid) {
        let tree_id = self
            .repo
            .find_commit(commit)
            .and_then(|c| c.tree())
            .map(|t| t.id())
            .expect("Failed to find tree");
        self.remove_object(tree_id);
    }

    /// Delete the loose object file of `commit` itself.
    pub fn corrupt_commit(&self, commit: Oid) {
        self.remove_object(commit);
    }

    fn remove_object(&self, oid: Oid) {
        let hex = oid.to_string();
        let object = self
            .repo
            .path()
            .join("objects")
            .join(&hex[..2])
            .join(&hex[2..]);
        std::fs::remove_file(&object).expect("Failed to remove loose object");
    }
}
