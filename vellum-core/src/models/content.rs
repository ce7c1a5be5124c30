//! Content entities: the shared content base plus documents, media and
//! members.

use crate::error::Result;
use crate::error::StoreError;
use crate::models::content_type::ContentType;
use crate::models::object_type::{ObjectType, ROOT_ID};
use crate::models::property::{Property, PropertyCollection, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

/// Name of an entity in one culture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureName {
    pub name: String,
    pub date: DateTime<Utc>,
}

/// State shared by every content entity.
#[derive(Debug, Clone)]
pub struct ContentBase {
    pub id: i32,
    pub key: Uuid,
    pub parent_id: i32,
    pub level: i32,
    pub path: String,
    pub sort_order: i32,
    pub trashed: bool,
    pub content_type: Arc<ContentType>,
    /// Invariant name. For culture-variant content it mirrors the default
    /// culture's name after a save.
    pub name: Option<String>,
    /// Culture names keyed by iso code.
    pub culture_names: BTreeMap<String, CultureName>,
    pub creator_id: Option<i32>,
    pub writer_id: Option<i32>,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    /// Current (draft) version.
    pub version_id: i32,
    pub properties: PropertyCollection,
}

impl ContentBase {
    pub fn new(name: Option<&str>, parent_id: i32, content_type: Arc<ContentType>) -> Self {
        let now = Utc::now();
        let properties = build_properties(&content_type);
        Self {
            id: 0,
            key: Uuid::new_v4(),
            parent_id,
            level: 0,
            path: String::new(),
            sort_order: 0,
            trashed: false,
            content_type,
            name: name.map(str::to_string),
            culture_names: BTreeMap::new(),
            creator_id: None,
            writer_id: None,
            create_date: now,
            update_date: now,
            version_id: 0,
            properties,
        }
    }

    pub fn has_identity(&self) -> bool {
        self.id > 0
    }

    pub fn varies_by_culture(&self) -> bool {
        self.content_type.varies_by_culture()
    }

    /// Set the name for a culture, or the invariant name when `culture` is
    /// `None` on invariant content.
    pub fn set_name(&mut self, name: &str, culture: Option<&str>) -> Result<()> {
        match (self.varies_by_culture(), culture) {
            (false, None) => {
                self.name = Some(name.to_string());
                Ok(())
            }
            (true, Some(culture)) => {
                self.culture_names.insert(
                    culture.to_string(),
                    CultureName {
                        name: name.to_string(),
                        date: Utc::now(),
                    },
                );
                Ok(())
            }
            (true, None) => Err(StoreError::InvariantViolation(
                "culture-variant content needs a culture for its name".to_string(),
            )),
            (false, Some(c)) => Err(StoreError::InvariantViolation(format!(
                "invariant content cannot have a name for culture '{}'",
                c
            ))),
        }
    }

    pub fn culture_name(&self, culture: &str) -> Option<&str> {
        self.culture_names
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(culture))
            .map(|(_, n)| n.name.as_str())
    }

    /// Cultures with a name; these are the available cultures.
    pub fn available_cultures(&self) -> impl Iterator<Item = &str> {
        self.culture_names.keys().map(String::as_str)
    }

    pub fn set_value(&mut self, alias: &str, value: impl Into<Value>, culture: Option<&str>) -> Result<()> {
        self.property_mut(alias)?.set_value(Some(value.into()), culture, None)
    }

    pub fn clear_value(&mut self, alias: &str, culture: Option<&str>) -> Result<()> {
        self.property_mut(alias)?.set_value(None, culture, None)
    }

    pub fn get_value(&self, alias: &str, culture: Option<&str>) -> Option<&Value> {
        self.properties.get(alias)?.get_value(culture, None, false)
    }

    fn property_mut(&mut self, alias: &str) -> Result<&mut Property> {
        self.properties
            .get_mut(alias)
            .ok_or_else(|| StoreError::not_found("Property", alias))
    }
}

/// Empty property collection for a content type's composite property types.
pub fn build_properties(content_type: &ContentType) -> PropertyCollection {
    PropertyCollection::new(
        content_type
            .composite_property_types()
            .into_iter()
            .map(|pt| Property::new(pt.clone(), content_type.effective_variation(pt)))
            .collect(),
    )
}

/// Publication state of a document. The transitional states are set by
/// [`Document::publish`] and [`Document::unpublish`] and resolved by the
/// repository after the save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishedState {
    Unpublished,
    Published,
    Publishing,
    Unpublishing,
}

/// A document: dual-version content with a published snapshot.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: ContentBase,
    pub published_state: PublishedState,
    /// Version holding the published snapshot, 0 when never published.
    pub published_version_id: i32,
    pub publish_date: Option<DateTime<Utc>>,
    pub publish_name: Option<String>,
    pub template_id: Option<i32>,
    /// Current values differ from published values (or nothing is published).
    pub edited: bool,
    pub published_cultures: BTreeSet<String>,
    pub edited_cultures: BTreeSet<String>,
}

impl Document {
    pub fn new(name: &str, parent_id: i32, content_type: Arc<ContentType>) -> Self {
        let varies = content_type.varies_by_culture();
        Self {
            content: ContentBase::new(if varies { None } else { Some(name) }, parent_id, content_type),
            published_state: PublishedState::Unpublished,
            published_version_id: 0,
            publish_date: None,
            publish_name: None,
            template_id: None,
            edited: true,
            published_cultures: BTreeSet::new(),
            edited_cultures: BTreeSet::new(),
        }
    }

    pub fn new_at_root(name: &str, content_type: Arc<ContentType>) -> Self {
        Self::new(name, ROOT_ID, content_type)
    }

    pub fn id(&self) -> i32 {
        self.content.id
    }

    /// Published or in the middle of being published.
    pub fn is_published(&self) -> bool {
        matches!(self.published_state, PublishedState::Published | PublishedState::Publishing)
    }

    /// Mark for publishing on the next save. Copies edited values of all
    /// cultures into the published side.
    pub fn publish(&mut self) {
        for property in self.content.properties.iter_mut() {
            property.publish_values(None);
        }
        self.published_state = PublishedState::Publishing;
    }

    /// Mark for unpublishing on the next save.
    pub fn unpublish(&mut self) {
        for property in self.content.properties.iter_mut() {
            property.unpublish_values();
        }
        self.published_state = PublishedState::Unpublishing;
    }
}

/// A media item: single-version content with an optional file path.
#[derive(Debug, Clone)]
pub struct Media {
    pub content: ContentBase,
    pub media_path: Option<String>,
}

impl Media {
    pub fn new(name: &str, parent_id: i32, content_type: Arc<ContentType>) -> Self {
        Self {
            content: ContentBase::new(Some(name), parent_id, content_type),
            media_path: None,
        }
    }

    pub fn id(&self) -> i32 {
        self.content.id
    }
}

/// A member: single-version content with login details.
#[derive(Debug, Clone)]
pub struct Member {
    pub content: ContentBase,
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
}

impl Member {
    pub fn new(name: &str, email: &str, username: &str, content_type: Arc<ContentType>) -> Self {
        Self {
            content: ContentBase::new(Some(name), ROOT_ID, content_type),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: None,
        }
    }

    pub fn id(&self) -> i32 {
        self.content.id
    }
}

/// Access to the shared content base of any entity kind.
pub trait ContentEntity {
    const OBJECT_TYPE: ObjectType;

    fn content(&self) -> &ContentBase;

    fn content_mut(&mut self) -> &mut ContentBase;
}

impl ContentEntity for Document {
    const OBJECT_TYPE: ObjectType = ObjectType::Document;

    fn content(&self) -> &ContentBase {
        &self.content
    }

    fn content_mut(&mut self) -> &mut ContentBase {
        &mut self.content
    }
}

impl ContentEntity for Media {
    const OBJECT_TYPE: ObjectType = ObjectType::Media;

    fn content(&self) -> &ContentBase {
        &self.content
    }

    fn content_mut(&mut self) -> &mut ContentBase {
        &mut self.content
    }
}

impl ContentEntity for Member {
    const OBJECT_TYPE: ObjectType = ObjectType::Member;

    fn content(&self) -> &ContentBase {
        &self.content
    }

    fn content_mut(&mut self) -> &mut ContentBase {
        &mut self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content_type::{PropertyType, ValueStorageType};
    use crate::models::variation::ContentVariation;

    fn variant_type() -> Arc<ContentType> {
        Arc::new(
            ContentType::new(ObjectType::DocumentType, "page")
                .with_variations(ContentVariation::CULTURE)
                .with_property(
                    PropertyType::new("title", "textbox", ValueStorageType::Nvarchar)
                        .with_variations(ContentVariation::CULTURE),
                )
                .with_property(PropertyType::new("count", "integer", ValueStorageType::Integer)),
        )
    }

    #[test]
    fn test_variant_document_names() {
        let mut doc = Document::new_at_root("ignored", variant_type());
        assert!(doc.content.name.is_none());
        assert!(doc.content.set_name("Home", None).is_err());
        doc.content.set_name("Home", Some("en-US")).unwrap();
        assert_eq!(doc.content.culture_name("EN-us"), Some("Home"));
        assert_eq!(doc.content.available_cultures().collect::<Vec<_>>(), vec!["en-US"]);
    }

    #[test]
    fn test_properties_follow_effective_variation() {
        let mut doc = Document::new_at_root("x", variant_type());
        doc.content.set_value("title", "Hello", Some("en-US")).unwrap();
        doc.content.set_value("count", 3i64, None).unwrap();
        assert!(doc.content.set_value("count", 3i64, Some("en-US")).is_err());
        assert!(doc.content.set_value("missing", 1i64, None).is_err());
    }

    #[test]
    fn test_publish_copies_values() {
        let mut doc = Document::new_at_root("x", variant_type());
        doc.content.set_value("title", "Hello", Some("en-US")).unwrap();
        doc.publish();
        assert_eq!(doc.published_state, PublishedState::Publishing);
        assert!(doc.is_published());
        let title = doc.content.properties.get("title").unwrap();
        assert_eq!(title.get_value(Some("en-US"), None, true), Some(&Value::text("Hello")));
        doc.unpublish();
        assert!(!doc.is_published());
    }
}
