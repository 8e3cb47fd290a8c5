//! Commit extraction for a reporting window.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Duration, TimeZone, Utc};
use git2::{ErrorCode, Repository, Sort};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GitError;

use super::files::{FileChange, lookup_file_changes};
use super::window::TimeWindow;

/// Commit author identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// Case-insensitive substring match against name or email.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle) || self.email.to_lowercase().contains(&needle)
    }
}

/// A commit as extracted from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub author: Author,
    pub message: String,
    pub files: Vec<FileChange>,
    /// False when the file lookup failed and `files` is empty as a result.
    pub files_complete: bool,
    pub parent_count: usize,
}

impl Commit {
    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(7)]
    }
}

/// A soft failure recorded during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub commit: String,
    pub message: String,
}

/// The commits matching one history query, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub window: Option<TimeWindow>,
    pub commits: Vec<Commit>,
    pub warnings: Vec<ExtractionWarning>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// How far past the window start the walk continues before stopping.
pub const CLOCK_SKEW_ALLOWANCE_SECS: i64 = 24 * 60 * 60;

/// Parameters for one history extraction.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub window: TimeWindow,
    pub author: Option<String>,
    pub include_merges: bool,
    /// Abort the walk once this instant has passed.
    pub deadline: Option<Instant>,
}

impl HistoryQuery {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            author: None,
            include_merges: false,
            deadline: None,
        }
    }
}

/// Open the repository containing `path`.
pub fn open_repository(path: &Path) -> Result<Repository, GitError> {
    Repository::discover(path).map_err(|source| GitError::RepositoryNotFound {
        path: path.to_path_buf(),
        source,
    })
}

/// Fetch the commits reachable from HEAD that satisfy `query`.
///
/// A repository without commits yields an empty [`ChangeSet`]. A commit whose
/// file list cannot be read is kept with no files and a recorded warning.
pub fn fetch_history(repo: &Repository, query: &HistoryQuery) -> Result<ChangeSet, GitError> {
    let mut changeset = ChangeSet {
        window: Some(query.window),
        ..Default::default()
    };

    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            debug!("Repository has no commits yet");
            return Ok(changeset);
        }
        Err(e) => return Err(GitError::RevwalkError(e)),
    };
    let head_oid = head.peel_to_commit().map_err(GitError::ParseCommit)?.id();

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk
        .set_sorting(Sort::TIME)
        .map_err(GitError::RevwalkError)?;
    revwalk.push(head_oid).map_err(GitError::RevwalkError)?;

    // Time order is only approximate when clocks disagree, so keep walking a
    // little past the start of the window.
    let walk_floor = query
        .window
        .since
        .checked_sub_signed(Duration::seconds(CLOCK_SKEW_ALLOWANCE_SECS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    for oid_result in revwalk {
        if let Some(deadline) = query.deadline
            && Instant::now() >= deadline
        {
            return Err(GitError::DeadlineExceeded);
        }

        let oid = oid_result.map_err(GitError::RevwalkError)?;
        let commit = repo.find_commit(oid).map_err(GitError::ParseCommit)?;

        let hash = oid.to_string();
        let seconds = commit.time().seconds();
        let timestamp = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| GitError::InvalidTimestamp {
                hash: hash.clone(),
                seconds,
            })?;

        if timestamp < walk_floor {
            debug!("Reached {} before the window; stopping walk", hash);
            break;
        }

        if !query.window.contains(&timestamp) {
            continue;
        }

        if !query.include_merges && commit.parent_count() > 1 {
            continue;
        }

        let signature = commit.author();
        let author = Author {
            name: signature.name().unwrap_or("").to_string(),
            email: signature.email().unwrap_or("").to_string(),
        };

        if let Some(filter) = query.author.as_deref()
            && !author.matches(filter)
        {
            continue;
        }

        let (files, files_complete) = match lookup_file_changes(repo, &commit) {
            Ok(files) => (files, true),
            Err(e) => {
                warn!("Could not read changed files for commit {}: {}", hash, e);
                changeset.warnings.push(ExtractionWarning {
                    commit: hash.clone(),
                    message: e.message().to_string(),
                });
                (Vec::new(), false)
            }
        };

        changeset.commits.push(Commit {
            hash,
            timestamp,
            author,
            message: commit.message().unwrap_or("").to_string(),
            files,
            files_complete,
            parent_count: commit.parent_count(),
        });
    }

    // Clock skew between parents and children can break revwalk time order.
    changeset
        .commits
        .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    debug!(
        "Extracted {} commits ({} warnings)",
        changeset.commits.len(),
        changeset.warnings.len()
    );

    Ok(changeset)
}
