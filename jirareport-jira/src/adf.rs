//! Plain-text flattening of Atlassian Document Format (ADF) rich-text fields.

use jirareport_domain::NOT_AVAILABLE;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
enum AdfError {
    #[error("expected a node object, found {0}")]
    NotANode(&'static str),
    #[error("`text` must be a string, found {0}")]
    TextNotString(&'static str),
    #[error("`content` must be an array, found {0}")]
    ContentNotArray(&'static str),
}

/// Flattens a description field into one line of display text.
///
/// Every `text` leaf below the root's `content` is collected depth-first in
/// document order and the fragments are joined with single spaces. Absent or empty input yields
/// `N/A`; a malformed tree yields a `[Parse error: ...]` marker instead of
/// an error so one bad description never costs the rest of the batch.
pub fn extract_description(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return NOT_AVAILABLE.to_string();
    };

    if is_blank(value) {
        return NOT_AVAILABLE.to_string();
    }

    // API v2 serves descriptions as plain wiki text.
    if let Some(text) = value.as_str() {
        return or_not_available(text.trim());
    }

    match collect_text(value) {
        Ok(parts) => or_not_available(parts.join(" ").trim()),
        Err(error) => format!("[Parse error: {error}]"),
    }
}

fn collect_text(root: &Value) -> Result<Vec<&str>, AdfError> {
    let mut parts = Vec::new();
    let mut stack = Vec::new();
    // The document node itself never carries display text.
    push_children(as_node(root)?, &mut stack)?;

    while let Some(node) = stack.pop() {
        let object = as_node(node)?;

        if let Some(text) = object.get("text") {
            let text = text
                .as_str()
                .ok_or_else(|| AdfError::TextNotString(kind_of(text)))?;
            parts.push(text);
        }

        push_children(object, &mut stack)?;
    }

    Ok(parts)
}

fn as_node(value: &Value) -> Result<&Map<String, Value>, AdfError> {
    value
        .as_object()
        .ok_or_else(|| AdfError::NotANode(kind_of(value)))
}

fn push_children<'a>(
    node: &'a Map<String, Value>,
    stack: &mut Vec<&'a Value>,
) -> Result<(), AdfError> {
    if let Some(content) = node.get("content") {
        let children = content
            .as_array()
            .ok_or_else(|| AdfError::ContentNotArray(kind_of(content)))?;
        // Reversed so the first child is popped first.
        stack.extend(children.iter().rev());
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn or_not_available(text: &str) -> String {
    if text.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        text.to_string()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::extract_description;

    fn extract(value: Value) -> String {
        extract_description(Some(&value))
    }

    #[test]
    fn absent_and_empty_inputs_are_not_available() {
        assert_eq!(extract_description(None), "N/A");
        assert_eq!(extract(Value::Null), "N/A");
        assert_eq!(extract(json!({})), "N/A");
        assert_eq!(extract(json!("")), "N/A");
        assert_eq!(extract(json!([])), "N/A");
    }

    #[test]
    fn tree_without_text_leaves_is_not_available() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": []},
                {"type": "rule"},
                {"type": "bulletList", "content": [{"type": "listItem", "content": []}]}
            ]
        });
        assert_eq!(extract(doc), "N/A");
    }

    #[test]
    fn joins_leaves_from_mixed_depths_in_document_order() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Cannot"}]},
                {
                    "type": "bulletList",
                    "content": [{
                        "type": "listItem",
                        "content": [{
                            "type": "paragraph",
                            "content": [
                                {"type": "text", "text": "login"},
                                {"type": "text", "text": "after"}
                            ]
                        }]
                    }]
                },
                {"type": "paragraph", "content": [{"type": "text", "text": "reset "}]}
            ]
        });
        assert_eq!(extract(doc), "Cannot login after reset");
    }

    #[test]
    fn node_with_text_and_children_emits_text_first() {
        let doc = json!({
            "content": [{"text": "parent", "content": [{"text": "child"}]}, {"text": "sibling"}]
        });
        assert_eq!(extract(doc), "parent child sibling");
    }

    #[test]
    fn root_level_text_is_ignored() {
        assert_eq!(extract(json!({"type": "text", "text": "orphan"})), "N/A");

        let doc = json!({"text": "title", "content": [{"type": "text", "text": "body"}]});
        assert_eq!(extract(doc), "body");
    }

    #[test]
    fn plain_string_descriptions_pass_through_trimmed() {
        assert_eq!(extract(json!("  wiki *markup*  ")), "wiki *markup*");
        assert_eq!(extract(json!("   ")), "N/A");
    }

    #[test]
    fn whitespace_only_leaves_are_not_available() {
        let doc = json!({"content": [{"text": " "}, {"text": "  "}]});
        assert_eq!(extract(doc), "N/A");
    }

    #[test]
    fn malformed_content_becomes_parse_error_marker() {
        let doc = json!({"type": "doc", "content": {"text": "not a list"}});
        assert_eq!(
            extract(doc),
            "[Parse error: `content` must be an array, found object]"
        );
    }

    #[test]
    fn non_string_text_becomes_parse_error_marker() {
        let doc = json!({"content": [{"type": "text", "text": 42}]});
        assert_eq!(
            extract(doc),
            "[Parse error: `text` must be a string, found number]"
        );
    }

    #[test]
    fn non_object_node_becomes_parse_error_marker() {
        let doc = json!({"content": ["loose string"]});
        assert_eq!(
            extract(doc),
            "[Parse error: expected a node object, found string]"
        );
    }

    #[test]
    fn nested_documents_reach_the_deepest_leaf() {
        // Close to the deepest nesting a decoded issue can carry under serde_json's
        // default recursion limit.
        let mut doc = json!({"type": "text", "text": "bottom"});
        for _ in 0..60 {
            doc = json!({"type": "paragraph", "content": [doc]});
        }
        assert_eq!(extract(doc), "bottom");
    }
}
