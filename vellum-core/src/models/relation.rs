//! Relations between nodes and the types that classify them

use crate::models::object_type::ObjectType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alias of the automatic relation type for picked documents.
pub const RELATED_DOCUMENT_ALIAS: &str = "relatedDocument";
/// Alias of the automatic relation type for picked media.
pub const RELATED_MEDIA_ALIAS: &str = "relatedMedia";
/// Alias of the automatic relation type for picked members.
pub const RELATED_MEMBER_ALIAS: &str = "relatedMember";

/// Relation types owned by the engine and rebuilt on every save.
pub const AUTOMATIC_RELATION_TYPES: [&str; 3] =
    [RELATED_DOCUMENT_ALIAS, RELATED_MEDIA_ALIAS, RELATED_MEMBER_ALIAS];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationType {
    pub id: i32,
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    pub is_bidirectional: bool,
    pub parent_object_type: Option<ObjectType>,
    pub child_object_type: Option<ObjectType>,
    pub is_dependency: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: i32,
    pub parent_id: i32,
    pub child_id: i32,
    pub relation_type_id: i32,
    pub create_date: DateTime<Utc>,
    pub comment: Option<String>,
}
