//! Markdown rendering.

use std::fmt::Write as _;

use crate::error::RenderError;
use crate::llm::sections::{CATEGORIES, HIGHLIGHTS, RISKS};
use crate::stats::{AreaCount, Category};

use super::document::ReportDocument;

pub fn render(doc: &ReportDocument) -> Result<String, RenderError> {
    write_document(doc).map_err(RenderError::Markup)
}

fn write_document(doc: &ReportDocument) -> Result<String, std::fmt::Error> {
    let mut out = String::new();

    writeln!(out, "# {}", doc.title())?;
    writeln!(out)?;

    writeln!(out, "## Summary")?;
    writeln!(out)?;
    if doc.narrative.available {
        writeln!(out, "{}", doc.narrative.text)?;
    } else {
        writeln!(out, "> {}", doc.narrative.text)?;
    }
    writeln!(out)?;

    let s = &doc.summary;
    writeln!(out, "## At a glance")?;
    writeln!(out)?;
    writeln!(out, "- **Commits:** {}", s.commits)?;
    writeln!(out, "- **Files changed:** {}", s.files)?;
    writeln!(out, "- **Lines:** +{} / -{}", s.lines_added, s.lines_removed)?;
    writeln!(out, "- **Authors:** {}", s.authors)?;
    writeln!(out, "- **Active days:** {}", s.active_days)?;
    if s.breaking_changes > 0 {
        writeln!(out, "- **Breaking changes:** {}", s.breaking_changes)?;
    }
    if s.incomplete_commits > 0 {
        writeln!(
            out,
            "- **Commits with unreadable file lists:** {}",
            s.incomplete_commits
        )?;
    }
    writeln!(out)?;

    if let Some(highlights) = doc.section(HIGHLIGHTS) {
        writeln!(out, "## Highlights")?;
        writeln!(out)?;
        writeln!(out, "{}", highlights)?;
        writeln!(out)?;
    }

    if let Some(categories) = &doc.categories {
        let notes = doc.section_children(CATEGORIES);
        writeln!(out, "## By category")?;
        writeln!(out)?;
        writeln!(out, "| Category | Commits |")?;
        writeln!(out, "|----------|---------|")?;
        for (category, count) in categories.non_zero() {
            writeln!(out, "| {} | {} |", category.label(), count)?;
        }
        writeln!(out)?;
        for category in Category::ALL {
            if let Some((_, note)) = notes.iter().find(|(key, _)| *key == category.as_str()) {
                writeln!(out, "**{}:** {}", category.label(), note)?;
                writeln!(out)?;
            }
        }
    }

    if let Some(comparison) = &doc.comparison {
        writeln!(out, "## Compared with the previous period")?;
        writeln!(out)?;
        writeln!(
            out,
            "- Commits: {} (previously {})",
            comparison.commits.label(),
            comparison.prior_commit_count
        )?;
        writeln!(out, "- Files changed: {}", comparison.files.label())?;
        writeln!(out, "- Lines added: {}", comparison.lines_added.label())?;
        writeln!(out, "- Lines removed: {}", comparison.lines_removed.label())?;
        writeln!(out)?;
    }

    if let Some(areas) = doc.top_areas.as_deref().filter(|a| !a.is_empty()) {
        writeln!(out, "## Most active areas")?;
        writeln!(out)?;
        for area in areas {
            writeln!(
                out,
                "- `{}`: {} changes (+{} / -{})",
                area.name, area.changes, area.lines_added, area.lines_removed
            )?;
        }
        writeln!(out)?;
    }

    if let Some(extensions) = doc.extensions.as_deref().filter(|a| !a.is_empty()) {
        write_area_table(&mut out, "By file type", "Extension", extensions)?;
    }
    if let Some(directories) = doc.directories.as_deref().filter(|a| !a.is_empty()) {
        write_area_table(&mut out, "By directory", "Directory", directories)?;
    }

    if let Some(files) = doc.files.as_deref().filter(|f| !f.is_empty()) {
        writeln!(out, "## Files")?;
        writeln!(out)?;
        writeln!(out, "| File | Commits | Added | Removed |")?;
        writeln!(out, "|------|---------|-------|---------|")?;
        for file in files {
            writeln!(
                out,
                "| `{}` | {} | {} | {} |",
                file.path, file.commits, file.lines_added, file.lines_removed
            )?;
        }
        writeln!(out)?;
    }

    if let Some(risks) = doc.section(RISKS) {
        writeln!(out, "## Risks and follow-ups")?;
        writeln!(out)?;
        writeln!(out, "{}", risks)?;
        writeln!(out)?;
    }

    if let Some(attribution) = &doc.narrative.attribution {
        writeln!(out, "---")?;
        writeln!(out, "_Narrative written by {}._", attribution)?;
    }

    Ok(out)
}

fn write_area_table(
    out: &mut String,
    heading: &str,
    column: &str,
    areas: &[AreaCount],
) -> std::fmt::Result {
    writeln!(out, "## {}", heading)?;
    writeln!(out)?;
    writeln!(out, "| {} | Changes | Added | Removed |", column)?;
    writeln!(out, "|---|---------|-------|---------|")?;
    for area in areas {
        writeln!(
            out,
            "| `{}` | {} | {} | {} |",
            area.name, area.changes, area.lines_added, area.lines_removed
        )?;
    }
    writeln!(out)
}
