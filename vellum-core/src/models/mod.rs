//! Domain model
//!
//! - Node records and object-type tags
//! - Content types, property types and variation flags
//! - Content entities (documents, media, members) and their properties
//! - Versions, languages, relations and tags

pub mod content;
pub mod content_type;
pub mod language;
pub mod node;
pub mod object_type;
pub mod property;
pub mod relation;
pub mod tag;
pub mod variation;
pub mod version;

pub use content::{ContentBase, ContentEntity, CultureName, Document, Media, Member, PublishedState};
pub use content_type::{ContentType, PropertyType, ValueStorageType};
pub use language::Language;
pub use node::NodeRecord;
pub use object_type::{ObjectType, DOCUMENT_RECYCLE_BIN_ID, MEDIA_RECYCLE_BIN_ID, ROOT_ID};
pub use property::{Property, PropertyCollection, PropertyDataRow, PropertyValue, Value, ValueColumns};
pub use relation::{Relation, RelationType};
pub use tag::{Tag, TagSpec};
pub use variation::ContentVariation;
pub use version::ContentVersion;
