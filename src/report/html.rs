//! Styled HTML rendering.

use std::fmt::Write as _;

use crate::error::RenderError;
use crate::llm::sections::{CATEGORIES, HIGHLIGHTS, RISKS};
use crate::stats::{AreaCount, Category};

use super::document::ReportDocument;

const STYLE: &str = "body{font-family:-apple-system,Helvetica,Arial,sans-serif;max-width:46rem;\
margin:2rem auto;padding:0 1rem;color:#1f2328;line-height:1.5}\
h1{font-size:1.6rem;border-bottom:1px solid #d0d7de;padding-bottom:.3rem}\
h2{font-size:1.2rem;margin-top:1.6rem}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #d0d7de;padding:.3rem .6rem;text-align:left}\
th{background:#f6f8fa}\
.placeholder{background:#fff8c5;border-left:4px solid #d4a72c;padding:.6rem}\
.stats{display:grid;grid-template-columns:repeat(auto-fill,minmax(9rem,1fr));gap:.5rem;\
list-style:none;padding:0}\
.stats li{background:#f6f8fa;border-radius:6px;padding:.5rem}\
footer{margin-top:2rem;color:#656d76;font-size:.85rem}";

/// Escape text for inclusion in HTML content or attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn render(doc: &ReportDocument) -> Result<String, RenderError> {
    write_document(doc).map_err(RenderError::Markup)
}

fn write_document(doc: &ReportDocument) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let title = escape(&doc.title());

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>{}</title>", title)?;
    writeln!(out, "<style>{}</style>", STYLE)?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;
    writeln!(out, "<h1>{}</h1>", title)?;

    writeln!(out, "<h2>Summary</h2>")?;
    if doc.narrative.available {
        write_text(&mut out, &doc.narrative.text)?;
    } else {
        writeln!(
            out,
            "<p class=\"placeholder\">{}</p>",
            escape(&doc.narrative.text)
        )?;
    }

    let s = &doc.summary;
    writeln!(out, "<h2>At a glance</h2>")?;
    writeln!(out, "<ul class=\"stats\">")?;
    writeln!(out, "<li><strong>{}</strong> commits</li>", s.commits)?;
    writeln!(out, "<li><strong>{}</strong> files changed</li>", s.files)?;
    writeln!(
        out,
        "<li><strong>+{} / -{}</strong> lines</li>",
        s.lines_added, s.lines_removed
    )?;
    writeln!(out, "<li><strong>{}</strong> authors</li>", s.authors)?;
    writeln!(out, "<li><strong>{}</strong> active days</li>", s.active_days)?;
    if s.breaking_changes > 0 {
        writeln!(
            out,
            "<li><strong>{}</strong> breaking changes</li>",
            s.breaking_changes
        )?;
    }
    writeln!(out, "</ul>")?;

    if let Some(highlights) = doc.section(HIGHLIGHTS) {
        writeln!(out, "<h2>Highlights</h2>")?;
        write_text(&mut out, highlights)?;
    }

    if let Some(categories) = &doc.categories {
        let notes = doc.section_children(CATEGORIES);
        writeln!(out, "<h2>By category</h2>")?;
        writeln!(out, "<table>")?;
        writeln!(out, "<tr><th>Category</th><th>Commits</th><th>Notes</th></tr>")?;
        for (category, count) in categories.non_zero() {
            let note = notes
                .iter()
                .find(|(key, _)| *key == category.as_str())
                .map(|(_, note)| escape(note))
                .unwrap_or_default();
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                category.label(),
                count,
                note
            )?;
        }
        writeln!(out, "</table>")?;
        for category in Category::ALL {
            if categories.get(category) == 0
                && let Some((_, note)) = notes.iter().find(|(key, _)| *key == category.as_str())
            {
                writeln!(
                    out,
                    "<p><strong>{}:</strong> {}</p>",
                    category.label(),
                    escape(note)
                )?;
            }
        }
    }

    if let Some(comparison) = &doc.comparison {
        writeln!(out, "<h2>Compared with the previous period</h2>")?;
        writeln!(out, "<ul>")?;
        writeln!(
            out,
            "<li>Commits: {} (previously {})</li>",
            escape(&comparison.commits.label()),
            comparison.prior_commit_count
        )?;
        writeln!(out, "<li>Files changed: {}</li>", escape(&comparison.files.label()))?;
        writeln!(
            out,
            "<li>Lines added: {}</li>",
            escape(&comparison.lines_added.label())
        )?;
        writeln!(
            out,
            "<li>Lines removed: {}</li>",
            escape(&comparison.lines_removed.label())
        )?;
        writeln!(out, "</ul>")?;
    }

    if let Some(areas) = doc.top_areas.as_deref().filter(|a| !a.is_empty()) {
        writeln!(out, "<h2>Most active areas</h2>")?;
        writeln!(out, "<ul>")?;
        for area in areas {
            writeln!(
                out,
                "<li><code>{}</code>: {} changes (+{} / -{})</li>",
                escape(&area.name),
                area.changes,
                area.lines_added,
                area.lines_removed
            )?;
        }
        writeln!(out, "</ul>")?;
    }

    if let Some(extensions) = doc.extensions.as_deref().filter(|a| !a.is_empty()) {
        write_area_table(&mut out, "By file type", "Extension", extensions)?;
    }
    if let Some(directories) = doc.directories.as_deref().filter(|a| !a.is_empty()) {
        write_area_table(&mut out, "By directory", "Directory", directories)?;
    }

    if let Some(files) = doc.files.as_deref().filter(|f| !f.is_empty()) {
        writeln!(out, "<h2>Files</h2>")?;
        writeln!(out, "<table>")?;
        writeln!(
            out,
            "<tr><th>File</th><th>Commits</th><th>Added</th><th>Removed</th></tr>"
        )?;
        for file in files {
            writeln!(
                out,
                "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&file.path),
                file.commits,
                file.lines_added,
                file.lines_removed
            )?;
        }
        writeln!(out, "</table>")?;
    }

    if let Some(risks) = doc.section(RISKS) {
        writeln!(out, "<h2>Risks and follow-ups</h2>")?;
        write_text(&mut out, risks)?;
    }

    if let Some(attribution) = &doc.narrative.attribution {
        writeln!(
            out,
            "<footer>Narrative written by {}.</footer>",
            escape(attribution)
        )?;
    }

    writeln!(out, "</body>")?;
    writeln!(out, "</html>")?;
    Ok(out)
}

/// Narrative text: `- ` lines become a list, everything else paragraphs.
fn write_text(out: &mut String, text: &str) -> std::fmt::Result {
    let mut in_list = false;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(item) = line.strip_prefix("- ") {
            if !in_list {
                writeln!(out, "<ul>")?;
                in_list = true;
            }
            writeln!(out, "<li>{}</li>", escape(item))?;
        } else {
            if in_list {
                writeln!(out, "</ul>")?;
                in_list = false;
            }
            writeln!(out, "<p>{}</p>", escape(line))?;
        }
    }
    if in_list {
        writeln!(out, "</ul>")?;
    }
    Ok(())
}

fn write_area_table(
    out: &mut String,
    heading: &str,
    column: &str,
    areas: &[AreaCount],
) -> std::fmt::Result {
    writeln!(out, "<h2>{}</h2>", heading)?;
    writeln!(out, "<table>")?;
    writeln!(
        out,
        "<tr><th>{}</th><th>Changes</th><th>Added</th><th>Removed</th></tr>",
        column
    )?;
    for area in areas {
        writeln!(
            out,
            "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&area.name),
            area.changes,
            area.lines_added,
            area.lines_removed
        )?;
    }
    writeln!(out, "</table>")
}
