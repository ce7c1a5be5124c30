//! Tags and their bindings to node properties

use serde::{Deserialize, Serialize};

/// A tag row. Tags are scoped by group and language (`None` = invariant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i32,
    pub text: String,
    pub group: String,
    pub language_id: Option<i32>,
}

/// Tag to assign, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSpec {
    pub text: String,
    pub group: String,
    pub language_id: Option<i32>,
}

impl TagSpec {
    pub fn new(text: &str, group: &str, language_id: Option<i32>) -> Self {
        Self {
            text: text.to_string(),
            group: group.to_string(),
            language_id,
        }
    }
}

/// Split a tag-editor value into distinct, trimmed tag texts.
pub fn parse_tag_value(value: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if !part.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(part)) {
            tags.push(part.to_string());
        }
    }
    tags
}
