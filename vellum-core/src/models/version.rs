//! Version rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `content_version` row joined with its `document_version` extension
/// (documents only; `published` is false for media and members).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentVersion {
    pub id: i32,
    pub node_id: i32,
    pub version_date: DateTime<Utc>,
    pub user_id: Option<i32>,
    pub current: bool,
    pub text: Option<String>,
    pub prevent_cleanup: bool,
    pub published: bool,
    pub template_id: Option<i32>,
}
