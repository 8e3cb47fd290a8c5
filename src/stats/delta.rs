//! Period-over-period comparison.

use serde::{Deserialize, Serialize};

/// Change of one metric against the prior period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delta {
    /// Percentage change, rounded to one decimal place.
    Change { percent: f64 },
    /// The prior period had nothing to compare against.
    NewActivity,
}

impl Delta {
    /// Compute the change from `prior` to `current`.
    pub fn between(prior: u64, current: u64) -> Self {
        match (prior, current) {
            (0, 0) => Delta::Change { percent: 0.0 },
            (0, _) => Delta::NewActivity,
            (p, c) => {
                let raw = (c as f64 - p as f64) / p as f64 * 100.0;
                let percent = (raw * 10.0).round() / 10.0;
                // Small decreases round to -0.0.
                Delta::Change {
                    percent: if percent == 0.0 { 0.0 } else { percent },
                }
            }
        }
    }

    /// Short label such as `+25.0%`, `-3.5%`, or `new activity`.
    pub fn label(&self) -> String {
        match self {
            Delta::Change { percent } if *percent > 0.0 => format!("+{:.1}%", percent),
            Delta::Change { percent } => format!("{:.1}%", percent),
            Delta::NewActivity => "new activity".to_string(),
        }
    }
}

/// Deltas of the headline metrics against the preceding window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub prior_commit_count: usize,
    pub commits: Delta,
    pub files: Delta,
    pub lines_added: Delta,
    pub lines_removed: Delta,
}

impl Comparison {
    /// Compare headline numbers. A prior period without commits reports
    /// [`Delta::NewActivity`] for every metric.
    pub fn between(prior: &Headline, current: &Headline) -> Self {
        if prior.commits == 0 {
            return Self {
                prior_commit_count: 0,
                commits: Delta::NewActivity,
                files: Delta::NewActivity,
                lines_added: Delta::NewActivity,
                lines_removed: Delta::NewActivity,
            };
        }

        Self {
            prior_commit_count: prior.commits as usize,
            commits: Delta::between(prior.commits, current.commits),
            files: Delta::between(prior.files, current.files),
            lines_added: Delta::between(prior.lines_added, current.lines_added),
            lines_removed: Delta::between(prior.lines_removed, current.lines_removed),
        }
    }
}

/// The metrics a [`Comparison`] is computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Headline {
    pub commits: u64,
    pub files: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
}
