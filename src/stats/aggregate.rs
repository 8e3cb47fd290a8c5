//! ChangeSet → Statistics aggregation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::git::{ChangeSet, TimeWindow};

use super::category::{Category, parse_prefix};
use super::delta::{Comparison, Headline};

/// Bucket name for files without an extension.
pub const NO_EXTENSION: &str = "(none)";
/// Bucket name for files at the repository root.
pub const ROOT_DIRECTORY: &str = "(root)";

/// Commit counts per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub feature: usize,
    pub fix: usize,
    pub docs: usize,
    pub refactor: usize,
    pub test: usize,
    pub chore: usize,
    pub other: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Feature => self.feature,
            Category::Fix => self.fix,
            Category::Docs => self.docs,
            Category::Refactor => self.refactor,
            Category::Test => self.test,
            Category::Chore => self.chore,
            Category::Other => self.other,
        }
    }

    fn increment(&mut self, category: Category) {
        let slot = match category {
            Category::Feature => &mut self.feature,
            Category::Fix => &mut self.fix,
            Category::Docs => &mut self.docs,
            Category::Refactor => &mut self.refactor,
            Category::Test => &mut self.test,
            Category::Chore => &mut self.chore,
            Category::Other => &mut self.other,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Non-zero categories in report order.
    pub fn non_zero(&self) -> Vec<(Category, usize)> {
        Category::ALL
            .iter()
            .map(|c| (*c, self.get(*c)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}

/// Change activity grouped under one extension or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaCount {
    pub name: String,
    /// Number of (commit, file) changes in this area.
    pub changes: usize,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// Change activity of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileActivity {
    pub path: String,
    pub commits: usize,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// Read-only aggregate over a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub period: Option<TimeWindow>,
    pub commit_count: usize,
    /// Distinct paths touched.
    pub file_count: usize,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub author_count: usize,
    pub active_days: usize,
    pub first_commit: Option<DateTime<Utc>>,
    pub last_commit: Option<DateTime<Utc>>,
    pub breaking_changes: usize,
    /// Commits whose file list could not be read.
    pub incomplete_commits: usize,
    pub categories: CategoryCounts,
    pub extensions: Vec<AreaCount>,
    pub directories: Vec<AreaCount>,
    pub files: Vec<FileActivity>,
    pub comparison: Option<Comparison>,
}

impl Statistics {
    pub fn headline(&self) -> Headline {
        Headline {
            commits: self.commit_count as u64,
            files: self.file_count as u64,
            lines_added: self.lines_added,
            lines_removed: self.lines_removed,
        }
    }

    /// Attach deltas against a prior period's statistics.
    pub fn compared_to(mut self, prior: &Statistics) -> Self {
        self.comparison = Some(Comparison::between(&prior.headline(), &self.headline()));
        self
    }

    /// The directory with the most changes, if any.
    pub fn most_active_area(&self) -> Option<&AreaCount> {
        self.directories.first()
    }
}

#[derive(Default)]
struct Tally {
    changes: usize,
    added: u64,
    removed: u64,
}

impl Tally {
    fn add(&mut self, added: u64, removed: u64) {
        self.changes += 1;
        self.added += added;
        self.removed += removed;
    }
}

/// Compute statistics for a change set.
///
/// The result depends only on the input: every grouping is sorted by
/// change count (descending) and then by name.
pub fn aggregate(changeset: &ChangeSet) -> Statistics {
    let mut categories = CategoryCounts::default();
    let mut breaking_changes = 0;
    let mut incomplete_commits = 0;
    let mut lines_added = 0u64;
    let mut lines_removed = 0u64;
    let mut authors: BTreeSet<String> = BTreeSet::new();
    let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut extensions: BTreeMap<String, Tally> = BTreeMap::new();
    let mut directories: BTreeMap<String, Tally> = BTreeMap::new();
    let mut files: BTreeMap<String, Tally> = BTreeMap::new();

    for commit in &changeset.commits {
        match parse_prefix(&commit.message) {
            Some(prefix) => {
                categories.increment(prefix.category);
                if prefix.breaking {
                    breaking_changes += 1;
                }
            }
            None => categories.increment(Category::Other),
        }

        if !commit.files_complete {
            incomplete_commits += 1;
        }

        authors.insert(commit.author.email.to_lowercase());
        days.insert(commit.timestamp.date_naive());

        for file in &commit.files {
            let added = u64::from(file.added.unwrap_or(0));
            let removed = u64::from(file.removed.unwrap_or(0));
            lines_added += added;
            lines_removed += removed;

            extensions
                .entry(extension_of(&file.path))
                .or_default()
                .add(added, removed);
            directories
                .entry(top_level_dir(&file.path))
                .or_default()
                .add(added, removed);
            files.entry(file.path.clone()).or_default().add(added, removed);
        }
    }

    Statistics {
        period: changeset.window,
        commit_count: changeset.commits.len(),
        file_count: files.len(),
        lines_added,
        lines_removed,
        author_count: authors.len(),
        active_days: days.len(),
        first_commit: changeset.commits.iter().map(|c| c.timestamp).min(),
        last_commit: changeset.commits.iter().map(|c| c.timestamp).max(),
        breaking_changes,
        incomplete_commits,
        categories,
        extensions: ranked_areas(extensions),
        directories: ranked_areas(directories),
        files: ranked_files(files),
        comparison: None,
    }
}

/// Aggregate the current period and attach deltas against the prior one.
pub fn aggregate_with_prior(current: &ChangeSet, prior: &ChangeSet) -> Statistics {
    aggregate(current).compared_to(&aggregate(prior))
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| NO_EXTENSION.to_string())
}

fn top_level_dir(path: &str) -> String {
    match path.split_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => ROOT_DIRECTORY.to_string(),
    }
}

fn ranked_areas(map: BTreeMap<String, Tally>) -> Vec<AreaCount> {
    let mut areas: Vec<AreaCount> = map
        .into_iter()
        .map(|(name, t)| AreaCount {
            name,
            changes: t.changes,
            lines_added: t.added,
            lines_removed: t.removed,
        })
        .collect();
    // BTreeMap iteration already orders names; the stable sort keeps that as the tiebreak.
    areas.sort_by(|a, b| b.changes.cmp(&a.changes));
    areas
}

fn ranked_files(map: BTreeMap<String, Tally>) -> Vec<FileActivity> {
    let mut files: Vec<FileActivity> = map
        .into_iter()
        .map(|(path, t)| FileActivity {
            path,
            commits: t.changes,
            lines_added: t.added,
            lines_removed: t.removed,
        })
        .collect();
    files.sort_by(|a, b| {
        b.commits
            .cmp(&a.commits)
            .then_with(|| (b.lines_added + b.lines_removed).cmp(&(a.lines_added + a.lines_removed)))
    });
    files
}
