//! The serializable report document shared by every output format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::git::TimeWindow;
use crate::length::Length;
use crate::llm::Narrative;
use crate::llm::sections::SUMMARY;
use crate::stats::{AreaCount, CategoryCounts, Comparison, FileActivity, Statistics};

/// Directories listed under "most active areas".
pub const TOP_AREAS: usize = 5;

/// Headline numbers, present at every length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub period: Option<TimeWindow>,
    pub commits: usize,
    pub files: usize,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub authors: usize,
    pub active_days: usize,
    pub breaking_changes: usize,
    pub incomplete_commits: usize,
}

/// Narrative content, or the placeholder that replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeBlock {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    /// The summary section, or the placeholder text.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<BTreeMap<String, String>>,
}

/// Report content after length-based truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub length: Length,
    pub summary: Summary,
    pub narrative: NarrativeBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<CategoryCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_areas: Option<Vec<AreaCount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<AreaCount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directories: Option<Vec<AreaCount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileActivity>>,
}

/// Text shown when no provider produced a narrative.
pub fn placeholder(reason: &str) -> String {
    format!(
        "AI narrative unavailable ({}). The statistics in this report are complete.",
        reason
    )
}

impl ReportDocument {
    pub fn build(statistics: &Statistics, narrative: &Narrative, length: Length) -> Self {
        let short = length.includes(Length::Short);
        let detailed = length.includes(Length::Detailed);

        Self {
            length,
            summary: Summary {
                period: statistics.period,
                commits: statistics.commit_count,
                files: statistics.file_count,
                lines_added: statistics.lines_added,
                lines_removed: statistics.lines_removed,
                authors: statistics.author_count,
                active_days: statistics.active_days,
                breaking_changes: statistics.breaking_changes,
                incomplete_commits: statistics.incomplete_commits,
            },
            narrative: narrative_block(narrative, length),
            categories: short.then_some(statistics.categories),
            comparison: if short {
                statistics.comparison.clone()
            } else {
                None
            },
            top_areas: short.then(|| {
                statistics
                    .directories
                    .iter()
                    .take(TOP_AREAS)
                    .cloned()
                    .collect()
            }),
            extensions: detailed.then(|| statistics.extensions.clone()),
            directories: detailed.then(|| statistics.directories.clone()),
            files: detailed.then(|| statistics.files.clone()),
        }
    }

    /// A narrative section, if this document carries it.
    pub fn section(&self, name: &str) -> Option<&str> {
        self.narrative
            .sections
            .as_ref()
            .and_then(|sections| sections.get(name))
            .map(String::as_str)
    }

    /// Dotted children of a narrative section, e.g. `categories.feature`.
    pub fn section_children(&self, name: &str) -> Vec<(&str, &str)> {
        let prefix = format!("{}.", name);
        self.narrative
            .sections
            .iter()
            .flatten()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|child| (child, value.as_str()))
            })
            .collect()
    }

    /// Title line including the reporting period.
    pub fn title(&self) -> String {
        match &self.summary.period {
            Some(window) => format!(
                "Accomplishments {} to {}",
                window.since.format("%Y-%m-%d"),
                window.until.format("%Y-%m-%d")
            ),
            None => "Accomplishments".to_string(),
        }
    }
}

fn narrative_block(narrative: &Narrative, length: Length) -> NarrativeBlock {
    match narrative {
        Narrative::Available { sections, .. } => {
            let text = sections
                .get(SUMMARY)
                .map(str::to_string)
                .unwrap_or_else(|| placeholder("summary missing"));

            // Light reports carry the summary only.
            let kept = if length.includes(Length::Short) {
                let allowed = crate::llm::required_sections(length);
                let map: BTreeMap<String, String> = sections
                    .sections
                    .iter()
                    .filter(|(key, _)| key.as_str() != SUMMARY)
                    .filter(|(key, _)| {
                        length == Length::Detailed
                            || allowed
                                .iter()
                                .any(|name| key.split('.').next() == Some(*name))
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(map)
            } else {
                None
            };

            NarrativeBlock {
                available: true,
                attribution: narrative.attribution(),
                text,
                sections: kept,
            }
        }
        Narrative::Unavailable { reason } => NarrativeBlock {
            available: false,
            attribution: None,
            text: placeholder(reason),
            sections: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::ChangeSet;
    use crate::llm::NarrativeSections;
    use crate::stats::aggregate;

    fn available(pairs: &[(&str, &str)]) -> Narrative {
        Narrative::Available {
            provider: "Anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            sections: NarrativeSections {
                sections: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    #[test]
    fn test_light_document_has_only_summary_parts() {
        let stats = aggregate(&ChangeSet::default());
        let doc = ReportDocument::build(&stats, &available(&[("summary", "Quiet week.")]), Length::Light);
        assert_eq!(doc.narrative.text, "Quiet week.");
        assert!(doc.narrative.sections.is_none());
        assert!(doc.categories.is_none());
        assert!(doc.top_areas.is_none());
        assert!(doc.files.is_none());
    }

    #[test]
    fn test_short_keeps_highlights_but_not_risks() {
        let stats = aggregate(&ChangeSet::default());
        let narrative = available(&[
            ("summary", "s"),
            ("highlights", "- one"),
            ("risks", "None noted."),
        ]);
        let doc = ReportDocument::build(&stats, &narrative, Length::Short);
        assert_eq!(doc.section("highlights"), Some("- one"));
        assert_eq!(doc.section("risks"), None);
        assert!(doc.categories.is_some());
        assert!(doc.extensions.is_none());
    }

    #[test]
    fn test_detailed_keeps_everything() {
        let stats = aggregate(&ChangeSet::default());
        let narrative = available(&[
            ("summary", "s"),
            ("categories.feature", "Login"),
            ("risks", "None noted."),
        ]);
        let doc = ReportDocument::build(&stats, &narrative, Length::Detailed);
        assert_eq!(doc.section_children("categories"), vec![("feature", "Login")]);
        assert_eq!(doc.section("risks"), Some("None noted."));
        assert!(doc.files.is_some());
    }

    #[test]
    fn test_unavailable_narrative_uses_placeholder() {
        let stats = aggregate(&ChangeSet::default());
        let narrative = Narrative::Unavailable {
            reason: "no AI providers configured".to_string(),
        };
        let doc = ReportDocument::build(&stats, &narrative, Length::Short);
        assert!(!doc.narrative.available);
        assert!(doc.narrative.text.contains("no AI providers configured"));
        assert!(doc.narrative.text.contains("statistics in this report are complete"));
    }
}
