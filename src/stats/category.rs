//! Conventional commit parsing and category inference.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Report category of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Feature,
    Fix,
    Docs,
    Refactor,
    Test,
    Chore,
    Other,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 7] = [
        Category::Feature,
        Category::Fix,
        Category::Docs,
        Category::Refactor,
        Category::Test,
        Category::Chore,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Fix => "fix",
            Self::Docs => "docs",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Chore => "chore",
            Self::Other => "other",
        }
    }

    /// Heading used in human-readable reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Feature => "Features",
            Self::Fix => "Fixes",
            Self::Docs => "Documentation",
            Self::Refactor => "Refactoring",
            Self::Test => "Tests",
            Self::Chore => "Maintenance",
            Self::Other => "Other",
        }
    }

    /// Map a conventional commit type word to a category.
    fn from_type(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "feat" | "feature" => Some(Self::Feature),
            "fix" | "bugfix" | "hotfix" => Some(Self::Fix),
            "docs" | "doc" => Some(Self::Docs),
            "refactor" | "perf" | "style" => Some(Self::Refactor),
            "test" | "tests" => Some(Self::Test),
            "chore" | "build" | "ci" | "release" | "deps" => Some(Self::Chore),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parsed `type(scope)!:` prefix of a commit subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalPrefix {
    pub category: Category,
    pub scope: Option<String>,
    pub breaking: bool,
}

fn prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // type(scope)!: description, type!: description, type(scope): description, type: description
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+)(?:\(([^()\s][^()]*)\))?(!)?:\s+\S")
            .unwrap_or_else(|e| panic!("conventional prefix regex is invalid: {e}"))
    })
}

/// Parse the conventional prefix of a commit message.
///
/// Returns `None` for messages that do not cleanly match the grammar or
/// whose type word is unknown. Those commits are categorized as
/// [`Category::Other`] rather than guessed at.
pub fn parse_prefix(message: &str) -> Option<ConventionalPrefix> {
    let first_line = message.lines().next().unwrap_or("").trim();
    let caps = prefix_regex().captures(first_line)?;

    let category = Category::from_type(caps.get(1)?.as_str())?;
    let scope = caps.get(2).map(|m| m.as_str().trim().to_string());
    let breaking = caps.get(3).is_some()
        || message.contains("BREAKING CHANGE:")
        || message.contains("BREAKING-CHANGE:");

    Some(ConventionalPrefix {
        category,
        scope,
        breaking,
    })
}

/// Infer the category of a commit message.
pub fn categorize(message: &str) -> Category {
    parse_prefix(message)
        .map(|prefix| prefix.category)
        .unwrap_or(Category::Other)
}
