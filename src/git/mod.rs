//! Git history extraction using git2-rs.

pub mod commits;
pub mod files;
pub mod window;

pub use commits::{
    Author, ChangeSet, Commit, ExtractionWarning, HistoryQuery, fetch_history, open_repository,
};
pub use files::{FileChange, lookup_file_changes};
pub use window::{Bound, TimeWindow, parse_time_bound, resolve_window};
