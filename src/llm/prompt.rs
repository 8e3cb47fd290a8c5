//! Prompt construction shared by every provider.

use std::fmt::Write as _;

use crate::git::ChangeSet;
use crate::length::Length;
use crate::stats::{Category, Statistics, categorize};

use super::provider::{GenerationParams, Prompt};
use super::sections::{CATEGORIES, HIGHLIGHTS, RISKS, SUMMARY, required_sections};

const SYSTEM_PROMPT: &str = "You write factual accomplishment reports from git history. \
Use only the facts provided. Never invent numbers, names, or features. \
Respond with a single JSON object and nothing else.";

/// Per-length sizing of the prompt and the expected answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromptBudget {
    pub max_commits: usize,
    pub body_lines: usize,
    pub top_areas: usize,
    pub target_words: u32,
    pub params: GenerationParams,
}

pub fn budget(length: Length) -> PromptBudget {
    match length {
        Length::Light => PromptBudget {
            max_commits: 30,
            body_lines: 0,
            top_areas: 3,
            target_words: 60,
            params: GenerationParams {
                max_tokens: 400,
                temperature: 0.3,
            },
        },
        Length::Short => PromptBudget {
            max_commits: 100,
            body_lines: 0,
            top_areas: 5,
            target_words: 250,
            params: GenerationParams {
                max_tokens: 1000,
                temperature: 0.3,
            },
        },
        Length::Detailed => PromptBudget {
            max_commits: 300,
            body_lines: 3,
            top_areas: 10,
            target_words: 700,
            params: GenerationParams {
                max_tokens: 2500,
                temperature: 0.4,
            },
        },
    }
}

/// Sanitize commit text before it is embedded in a prompt.
///
/// Code fences and markdown headings are neutralized so commit text cannot
/// masquerade as prompt structure, and long bodies are cut to 50 lines.
pub fn sanitize_for_prompt(text: &str) -> String {
    const MAX_LINES: usize = 50;

    let sanitized = text.replace("```", "'''").replace("##", "//");
    let line_count = sanitized.lines().count();
    if line_count <= MAX_LINES {
        return sanitized;
    }

    let mut kept: Vec<&str> = sanitized.lines().take(MAX_LINES).collect();
    let note = format!("[{} more lines]", line_count - MAX_LINES);
    kept.push(&note);
    kept.join("\n")
}

fn section_instruction(name: &str) -> &'static str {
    match name {
        SUMMARY => "a plain-prose overview of what was accomplished",
        HIGHLIGHTS => "an array of the most notable accomplishments, one short sentence each",
        CATEGORIES => {
            "an object keyed by category (feature, fix, docs, refactor, test, chore, other) \
             with one or two sentences for each category that has commits"
        }
        RISKS => "follow-ups, risks, or unfinished work; \"None noted.\" if nothing stands out",
        _ => "",
    }
}

/// Build the synthesis prompt for a set of statistics and commits.
pub fn build_prompt(
    statistics: &Statistics,
    changeset: &ChangeSet,
    length: Length,
) -> Result<Prompt, std::fmt::Error> {
    let budget = budget(length);
    let user = write_prompt(statistics, changeset, length, budget)?;

    Ok(Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        params: budget.params,
    })
}

fn write_prompt(
    statistics: &Statistics,
    changeset: &ChangeSet,
    length: Length,
    budget: PromptBudget,
) -> Result<String, std::fmt::Error> {
    let mut user = String::new();
    write_facts(&mut user, statistics, budget)?;
    write_commits(&mut user, changeset, budget)?;
    write_instructions(&mut user, length, budget)?;
    Ok(user)
}

fn write_facts(out: &mut String, stats: &Statistics, budget: PromptBudget) -> std::fmt::Result {
    writeln!(out, "## Period")?;
    match &stats.period {
        Some(window) => writeln!(
            out,
            "{} to {}",
            window.since.format("%Y-%m-%d %H:%M UTC"),
            window.until.format("%Y-%m-%d %H:%M UTC")
        )?,
        None => writeln!(out, "Unspecified")?,
    }

    writeln!(out, "\n## Numbers")?;
    writeln!(out, "- Commits: {}", stats.commit_count)?;
    writeln!(out, "- Files changed: {}", stats.file_count)?;
    writeln!(out, "- Lines: +{} / -{}", stats.lines_added, stats.lines_removed)?;
    writeln!(out, "- Authors: {}", stats.author_count)?;
    writeln!(out, "- Active days: {}", stats.active_days)?;
    if stats.breaking_changes > 0 {
        writeln!(out, "- Breaking changes: {}", stats.breaking_changes)?;
    }
    for (category, count) in stats.categories.non_zero() {
        writeln!(out, "- {}: {}", category.label(), count)?;
    }
    if let Some(comparison) = &stats.comparison {
        writeln!(
            out,
            "- Versus the previous period: commits {}, lines added {}",
            comparison.commits.label(),
            comparison.lines_added.label()
        )?;
    }

    if !stats.directories.is_empty() {
        writeln!(out, "\n## Most active areas")?;
        for area in stats.directories.iter().take(budget.top_areas) {
            writeln!(
                out,
                "- {} ({} changes, +{} / -{})",
                area.name, area.changes, area.lines_added, area.lines_removed
            )?;
        }
    }
    Ok(())
}

fn write_commits(out: &mut String, changeset: &ChangeSet, budget: PromptBudget) -> std::fmt::Result {
    writeln!(out, "\n## Commits (newest first)")?;
    if changeset.is_empty() {
        writeln!(out, "No commits in this period.")?;
        return Ok(());
    }

    for commit in changeset.commits.iter().take(budget.max_commits) {
        let category: Category = categorize(&commit.message);
        writeln!(
            out,
            "- {} [{}] {} ({} files)",
            commit.timestamp.format("%Y-%m-%d"),
            category,
            sanitize_for_prompt(commit.subject()),
            commit.files.len()
        )?;

        if budget.body_lines > 0 {
            let body = sanitize_for_prompt(&commit.message);
            for line in body
                .lines()
                .skip(1)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .take(budget.body_lines)
            {
                writeln!(out, "    {}", line)?;
            }
        }
    }

    let omitted = changeset.len().saturating_sub(budget.max_commits);
    if omitted > 0 {
        writeln!(out, "({} more commits not shown)", omitted)?;
    }
    Ok(())
}

fn write_instructions(out: &mut String, length: Length, budget: PromptBudget) -> std::fmt::Result {
    writeln!(out, "\n## Instructions")?;
    writeln!(
        out,
        "Write a {} report of roughly {} words in total.",
        length, budget.target_words
    )?;
    writeln!(out, "Return a JSON object with exactly these keys:")?;
    for name in required_sections(length) {
        writeln!(out, "- \"{}\": {}", name, section_instruction(name))?;
    }
    writeln!(out, "Do not restate the numbers as a table; they are shown separately.")?;
    Ok(())
}
