//! Languages known to the store

use serde::{Deserialize, Serialize};

/// A language row: iso code ↔ numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: i32,
    pub iso_code: String,
    pub culture_name: String,
    pub is_default: bool,
    pub is_mandatory: bool,
    pub fallback_language_id: Option<i32>,
}

impl Language {
    pub fn new(iso_code: &str, culture_name: &str) -> Self {
        Self {
            id: 0,
            iso_code: iso_code.to_string(),
            culture_name: culture_name.to_string(),
            is_default: false,
            is_mandatory: false,
            fallback_language_id: None,
        }
    }
}
