//! Locating the JSON object inside a model completion.
//!
//! Models wrap JSON in markdown fences or surround it with chatter. The
//! extractor tries fenced blocks first, then the first `{` from which a
//! complete object can be read, ignoring whatever follows it.

use serde_json::{Deserializer, Map, Value};

/// Extract the first JSON object from a completion.
pub fn extract_object(response: &str) -> Option<Map<String, Value>> {
    let trimmed = response.trim();

    for block in fenced_blocks(trimmed) {
        if let Some(object) = first_object(block) {
            return Some(object);
        }
    }

    first_object(trimmed)
}

/// Contents of every ```` ``` ```` fenced block, with any language tag removed.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(body[..close].trim());
        rest = &body[close + 3..];
    }

    blocks
}

/// Read an object starting at each `{` in turn until one parses.
fn first_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_raw_object() {
        let object = extract_object(r#"{"summary": "Shipped"}"#).unwrap();
        assert_eq!(object["summary"], "Shipped");
    }

    #[test]
    fn test_extract_from_json_fence() {
        let response = "Here you go:\n```json\n{\"summary\": \"ok\"}\n```\nThanks";
        let object = extract_object(response).unwrap();
        assert_eq!(object["summary"], "ok");
    }

    #[test]
    fn test_extract_from_bare_fence() {
        let response = "```\n{\"highlights\": [\"a\", \"b\"]}\n```";
        let object = extract_object(response).unwrap();
        assert_eq!(object["highlights"][1], "b");
    }

    #[test]
    fn test_extract_with_surrounding_text_and_trailing_braces() {
        let response = r#"Result: {"summary": "uses { and } in text", "n": {"x": 1}} and then } more"#;
        let object = extract_object(response).unwrap();
        assert_eq!(object["summary"], "uses { and } in text");
        assert_eq!(object["n"]["x"], 1);
    }

    #[test]
    fn test_skips_invalid_leading_brace() {
        let response = r#"{not json} but {"summary": "real"}"#;
        let object = extract_object(response).unwrap();
        assert_eq!(object["summary"], "real");
    }

    #[test]
    fn test_fence_without_object_falls_back_to_body() {
        let response = "```text\nnothing here\n```\n{\"summary\": \"after\"}";
        let object = extract_object(response).unwrap();
        assert_eq!(object["summary"], "after");
    }

    #[test]
    fn test_no_object_present() {
        assert!(extract_object("Just prose, no JSON").is_none());
        assert!(extract_object("[1, 2, 3]").is_none());
        assert!(extract_object("}}").is_none());
        assert!(extract_object("```json\n```").is_none());
    }
}
