//! Atlassian Document Format helpers.

use serde_json::{Value, json};

/// Flatten ADF (or a plain string) into text.
///
/// Objects recurse into `content` or yield `text`; arrays join their `text`
/// and `paragraph` children with spaces.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(inner) = map.get("content") {
                extract_text(inner)
            } else if let Some(Value::String(text)) = map.get("text") {
                text.clone()
            } else {
                String::new()
            }
        }
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                    Some("text") => Some(map.get("text").and_then(Value::as_str).unwrap_or_default().to_string()),
                    Some("paragraph") => Some(map.get("content").map(extract_text).unwrap_or_default()),
                    _ => None,
                },
                Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Wrap plain text in a single-paragraph ADF document.
pub fn paragraph_doc(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [
            {
                "type": "paragraph",
                "content": [{ "type": "text", "text": text }]
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_from_doc() {
        let doc = json!({
            "type": "doc",
            "version": 1,
            "content": [
                { "type": "paragraph", "content": [{ "type": "text", "text": "Ship" }, { "type": "text", "text": "beta" }] },
                { "type": "paragraph", "content": [{ "type": "text", "text": "by Friday." }] },
                { "type": "rule" }
            ]
        });

        assert_eq!(extract_text(&doc), "Ship beta by Friday.");
    }

    #[test]
    fn test_extract_text_plain_and_empty() {
        assert_eq!(extract_text(&json!("plain description")), "plain description");
        assert_eq!(extract_text(&Value::Null), "");
        assert_eq!(extract_text(&json!({ "text": "leaf" })), "leaf");
    }

    #[test]
    fn test_paragraph_doc_flattens_back() {
        assert_eq!(extract_text(&paragraph_doc("hello")), "hello");
    }
}
