//! Narrative sections returned by a provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::length::Length;

use super::json::extract_object;

pub const SUMMARY: &str = "summary";
pub const HIGHLIGHTS: &str = "highlights";
pub const CATEGORIES: &str = "categories";
pub const RISKS: &str = "risks";

/// Sections a response must contain for each length.
pub fn required_sections(length: Length) -> &'static [&'static str] {
    match length {
        Length::Light => &[SUMMARY],
        Length::Short => &[SUMMARY, HIGHLIGHTS],
        Length::Detailed => &[SUMMARY, HIGHLIGHTS, CATEGORIES, RISKS],
    }
}

/// Named narrative text keyed by section. Nested objects are flattened to
/// dotted keys such as `categories.feature`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSections {
    pub sections: BTreeMap<String, String>,
}

impl NarrativeSections {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    /// Whether `name` is present directly or as the parent of dotted keys.
    pub fn has(&self, name: &str) -> bool {
        if self.get(name).is_some() {
            return true;
        }
        let prefix = format!("{}.", name);
        self.sections.keys().any(|key| key.starts_with(&prefix))
    }

    /// Children of a flattened object section, in key order.
    pub fn children(&self, name: &str) -> Vec<(&str, &str)> {
        let prefix = format!("{}.", name);
        self.sections
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|child| (child, value.as_str()))
            })
            .collect()
    }
}

/// The narrative half of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Narrative {
    Available {
        provider: String,
        model: String,
        #[serde(flatten)]
        sections: NarrativeSections,
    },
    Unavailable { reason: String },
}

impl Narrative {
    pub fn section(&self, name: &str) -> Option<&str> {
        match self {
            Narrative::Available { sections, .. } => sections.get(name),
            Narrative::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Narrative::Available { .. })
    }

    /// Provider attribution, e.g. `Anthropic (claude-sonnet-4-5)`.
    pub fn attribution(&self) -> Option<String> {
        match self {
            Narrative::Available {
                provider, model, ..
            } => Some(format!("{} ({})", provider, model)),
            Narrative::Unavailable { .. } => None,
        }
    }
}

/// Parse a completion into sections, failing when required ones are absent.
///
/// A failed parse is an [`ProviderError::InvalidResponse`], which the retry
/// layer treats as transient.
pub fn parse_sections(raw: &str, length: Length) -> Result<NarrativeSections, ProviderError> {
    let object = extract_object(raw)
        .ok_or_else(|| ProviderError::InvalidResponse("no JSON object in completion".to_string()))?;

    let mut sections = BTreeMap::new();
    flatten_object("", &object, &mut sections);
    let parsed = NarrativeSections { sections };

    let missing: Vec<&str> = required_sections(length)
        .iter()
        .copied()
        .filter(|name| !parsed.has(name))
        .collect();
    if !missing.is_empty() {
        return Err(ProviderError::InvalidResponse(format!(
            "missing sections: {}",
            missing.join(", ")
        )));
    }

    Ok(parsed)
}

fn flatten_object(prefix: &str, object: &Map<String, Value>, out: &mut BTreeMap<String, String>) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key.trim().to_lowercase()
        } else {
            format!("{}.{}", prefix, key.trim().to_lowercase())
        };

        match value {
            Value::Object(child) => flatten_object(&name, child, out),
            other => {
                if let Some(text) = render_value(other)
                    && !text.trim().is_empty()
                {
                    out.insert(name, text);
                }
            }
        }
    }
}

/// Text form of a leaf value. Arrays become `- item` lines.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .filter_map(render_value)
                .filter(|item| !item.is_empty())
                .map(|item| format!("- {}", item))
                .collect();
            Some(lines.join("\n"))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}
