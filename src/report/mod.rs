//! Report rendering in Markdown, JSON, HTML, and PDF.

pub mod document;
pub mod html;
pub mod markdown;
pub mod pdf;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::length::Length;
use crate::llm::Narrative;
use crate::stats::Statistics;

pub use document::{NarrativeBlock, ReportDocument, Summary, placeholder};

/// Output format of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Markdown,
    Json,
    Html,
    Pdf,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Markdown => "markdown",
            Format::Json => "json",
            Format::Html => "html",
            Format::Pdf => "pdf",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Format::Markdown),
            "json" => Ok(Format::Json),
            "html" | "htm" => Ok(Format::Html),
            "pdf" => Ok(Format::Pdf),
            _ => Err(format!(
                "Unknown format: {} (expected markdown, json, html, or pdf)",
                s
            )),
        }
    }
}

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Text(String),
    Binary(Vec<u8>),
}

impl Artifact {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Artifact::Text(text) => text.as_bytes(),
            Artifact::Binary(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Render statistics and narrative into `format` at `length`.
pub fn render(
    statistics: &Statistics,
    narrative: &Narrative,
    format: Format,
    length: Length,
) -> Result<Artifact, RenderError> {
    let doc = ReportDocument::build(statistics, narrative, length);

    match format {
        Format::Markdown => markdown::render(&doc).map(Artifact::Text),
        Format::Json => serde_json::to_string_pretty(&doc)
            .map(Artifact::Text)
            .map_err(RenderError::Serialize),
        Format::Html => html::render(&doc).map(Artifact::Text),
        Format::Pdf => {
            let markup = html::render(&doc)?;
            pdf::convert(&markup, &doc.title()).map(Artifact::Binary)
        }
    }
}
