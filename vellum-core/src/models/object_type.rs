//! Object-type tags stored on every node row

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the tree root shared by documents and media.
pub const ROOT_ID: i32 = -1;
/// Id of the document recycle bin.
pub const DOCUMENT_RECYCLE_BIN_ID: i32 = -20;
/// Id of the media recycle bin.
pub const MEDIA_RECYCLE_BIN_ID: i32 = -21;

/// System node ids which never appear as path segments of real content.
pub const SYSTEM_ROOT_IDS: [i32; 3] = [ROOT_ID, DOCUMENT_RECYCLE_BIN_ID, MEDIA_RECYCLE_BIN_ID];

/// Kind of entity a node row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    SystemRoot,
    DocumentRecycleBin,
    MediaRecycleBin,
    Document,
    Media,
    Member,
    DocumentType,
    MediaType,
    MemberType,
}

impl ObjectType {
    pub const ALL: [ObjectType; 9] = [
        ObjectType::SystemRoot,
        ObjectType::DocumentRecycleBin,
        ObjectType::MediaRecycleBin,
        ObjectType::Document,
        ObjectType::Media,
        ObjectType::Member,
        ObjectType::DocumentType,
        ObjectType::MediaType,
        ObjectType::MemberType,
    ];

    /// Tag persisted in `node.node_object_type`.
    pub fn tag(self) -> &'static str {
        match self {
            ObjectType::SystemRoot => "ea7d8624-4cfe-4578-a871-24aa946bf34d",
            ObjectType::DocumentRecycleBin => "01bb7ff2-24dc-4c0c-95a2-c24ef72bbac8",
            ObjectType::MediaRecycleBin => "cf3d8e34-1c1c-41e9-ae56-878b57b32113",
            ObjectType::Document => "c66ba18e-eaf3-4cff-8a22-41b16d66a972",
            ObjectType::Media => "b796f64c-1f99-4ffb-b886-4bf4bc011a9c",
            ObjectType::Member => "39eb0f98-b348-42a1-8662-e7eb18487560",
            ObjectType::DocumentType => "a2cb7800-f571-4787-9638-bc48539a0efb",
            ObjectType::MediaType => "4ea4382b-2f5a-4c2b-9587-ae9b3cf3602e",
            ObjectType::MemberType => "9b5416fb-e72f-45a9-a07b-5a9a2709ce43",
        }
    }

    /// Resolve a persisted tag. Unknown tags are a fatal schema error.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.tag().eq_ignore_ascii_case(tag))
            .ok_or_else(|| StoreError::UnexpectedObjectType(tag.to_string()))
    }

    /// Parse the short names used on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "document" => Some(ObjectType::Document),
            "media" => Some(ObjectType::Media),
            "member" => Some(ObjectType::Member),
            "document-type" => Some(ObjectType::DocumentType),
            "media-type" => Some(ObjectType::MediaType),
            "member-type" => Some(ObjectType::MemberType),
            _ => None,
        }
    }

    /// Object type of the content types describing items of this type.
    pub fn content_type_object_type(self) -> Option<ObjectType> {
        match self {
            ObjectType::Document => Some(ObjectType::DocumentType),
            ObjectType::Media => Some(ObjectType::MediaType),
            ObjectType::Member => Some(ObjectType::MemberType),
            _ => None,
        }
    }

    /// Recycle bin node for trashable object types.
    pub fn recycle_bin_id(self) -> Option<i32> {
        match self {
            ObjectType::Document => Some(DOCUMENT_RECYCLE_BIN_ID),
            ObjectType::Media => Some(MEDIA_RECYCLE_BIN_ID),
            _ => None,
        }
    }

    /// Entity-type segment used in `umb://<type>/<key>` references.
    pub fn udi_entity_type(self) -> Option<&'static str> {
        match self {
            ObjectType::Document => Some("document"),
            ObjectType::Media => Some("media"),
            ObjectType::Member => Some("member"),
            ObjectType::DocumentType => Some("document-type"),
            ObjectType::MediaType => Some("media-type"),
            ObjectType::MemberType => Some("member-type"),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
