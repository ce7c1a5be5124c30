//! Content types and the property types they declare

use crate::error::{Result, StoreError};
use crate::models::object_type::ObjectType;
use crate::models::variation::ContentVariation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column a property type's values are persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueStorageType {
    Integer,
    Decimal,
    Date,
    /// Short text (`varchar_value`).
    Nvarchar,
    /// Long text (`text_value`).
    Ntext,
}

impl ValueStorageType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueStorageType::Integer => "integer",
            ValueStorageType::Decimal => "decimal",
            ValueStorageType::Date => "date",
            ValueStorageType::Nvarchar => "nvarchar",
            ValueStorageType::Ntext => "ntext",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "integer" => Ok(ValueStorageType::Integer),
            "decimal" => Ok(ValueStorageType::Decimal),
            "date" => Ok(ValueStorageType::Date),
            "nvarchar" => Ok(ValueStorageType::Nvarchar),
            "ntext" => Ok(ValueStorageType::Ntext),
            other => Err(StoreError::Corrupt(format!("unknown value storage type '{}'", other))),
        }
    }
}

/// A typed property declared by a content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    pub id: i32,
    pub key: Uuid,
    /// Owning content type; assigned when the content type is saved.
    pub content_type_id: i32,
    pub alias: String,
    pub name: String,
    pub editor_alias: String,
    pub storage: ValueStorageType,
    pub mandatory: bool,
    pub variations: ContentVariation,
    pub sort_order: i32,
    /// Tag group for tag-editor properties. Values are split on commas and
    /// stored as tags when set.
    pub tag_group: Option<String>,
}

impl PropertyType {
    pub fn new(alias: impl Into<String>, editor_alias: impl Into<String>, storage: ValueStorageType) -> Self {
        let alias = alias.into();
        Self {
            id: 0,
            key: Uuid::new_v4(),
            content_type_id: 0,
            name: alias.clone(),
            alias,
            editor_alias: editor_alias.into(),
            storage,
            mandatory: false,
            variations: ContentVariation::NOTHING,
            sort_order: 0,
            tag_group: None,
        }
    }

    pub fn with_variations(mut self, variations: ContentVariation) -> Self {
        self.variations = variations;
        self
    }

    pub fn with_tag_group(mut self, group: impl Into<String>) -> Self {
        self.tag_group = Some(group.into());
        self
    }

    pub fn has_identity(&self) -> bool {
        self.id > 0
    }
}

/// Schema of a document, media or member type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: i32,
    pub key: Uuid,
    pub object_type: ObjectType,
    pub parent_id: i32,
    pub alias: String,
    pub name: String,
    pub icon: Option<String>,
    pub is_element: bool,
    pub variations: ContentVariation,
    /// Property types declared by this type.
    pub property_types: Vec<PropertyType>,
    /// Types this type composes (direct only).
    pub composition_ids: Vec<i32>,
    /// Types allowed as children of items of this type.
    pub allowed_child_ids: Vec<i32>,
    /// Property types obtained through compositions, resolved when loaded.
    #[serde(default)]
    pub composed_property_types: Vec<PropertyType>,
}

impl ContentType {
    pub fn new(object_type: ObjectType, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            id: 0,
            key: Uuid::new_v4(),
            object_type,
            parent_id: crate::models::object_type::ROOT_ID,
            name: alias.clone(),
            alias,
            icon: None,
            is_element: false,
            variations: ContentVariation::NOTHING,
            property_types: Vec::new(),
            composition_ids: Vec::new(),
            allowed_child_ids: Vec::new(),
            composed_property_types: Vec::new(),
        }
    }

    pub fn with_variations(mut self, variations: ContentVariation) -> Self {
        self.variations = variations;
        self
    }

    pub fn with_property(mut self, property_type: PropertyType) -> Self {
        self.add_property_type(property_type);
        self
    }

    pub fn has_identity(&self) -> bool {
        self.id > 0
    }

    pub fn varies_by_culture(&self) -> bool {
        self.variations.varies_by_culture()
    }

    /// Add a property type, giving it the next sort order.
    pub fn add_property_type(&mut self, mut property_type: PropertyType) {
        if property_type.sort_order == 0 {
            property_type.sort_order = self.property_types.len() as i32 + 1;
        }
        property_type.content_type_id = self.id;
        self.property_types.push(property_type);
    }

    pub fn remove_property_type(&mut self, alias: &str) -> Option<PropertyType> {
        let idx = self.property_types.iter().position(|p| p.alias == alias)?;
        Some(self.property_types.remove(idx))
    }

    pub fn property_type_mut(&mut self, alias: &str) -> Option<&mut PropertyType> {
        self.property_types.iter_mut().find(|p| p.alias == alias)
    }

    /// Own and composed property types. Own types win on alias clashes.
    pub fn composite_property_types(&self) -> Vec<&PropertyType> {
        let mut all: Vec<&PropertyType> = self.property_types.iter().collect();
        for composed in &self.composed_property_types {
            if !all.iter().any(|p| p.alias == composed.alias) {
                all.push(composed);
            }
        }
        all
    }

    pub fn find_property_type(&self, alias: &str) -> Option<&PropertyType> {
        self.composite_property_types().into_iter().find(|p| p.alias == alias)
    }

    /// Variation a property actually has on items of this type.
    pub fn effective_variation(&self, property_type: &PropertyType) -> ContentVariation {
        self.variations & property_type.variations
    }

    /// Clear from own property types the flags this type dropped since
    /// `previous`. Other mismatches are left for [`Self::validate_variations`].
    pub fn coerce_property_variations(&mut self, previous: ContentVariation) -> Vec<String> {
        let dropped = previous.without(self.variations);
        let mut coerced = Vec::new();
        if dropped.is_invariant() {
            return coerced;
        }
        for pt in &mut self.property_types {
            let clamped = pt.variations.without(dropped);
            if clamped != pt.variations {
                pt.variations = clamped;
                coerced.push(pt.alias.clone());
            }
        }
        coerced
    }

    /// Every own property type must vary by a subset of this type's flags.
    pub fn validate_variations(&self) -> Result<()> {
        for pt in &self.property_types {
            if !pt.variations.is_subset_of(self.variations) {
                return Err(StoreError::VariationMismatch {
                    content_type: self.alias.clone(),
                    property_type: pt.alias.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> ContentType {
        ContentType::new(ObjectType::DocumentType, "article")
            .with_variations(ContentVariation::CULTURE)
            .with_property(PropertyType::new("title", "textbox", ValueStorageType::Nvarchar)
                .with_variations(ContentVariation::CULTURE))
            .with_property(PropertyType::new("views", "integer", ValueStorageType::Integer))
    }

    #[test]
    fn test_sort_order_assigned() {
        let ct = article();
        assert_eq!(ct.property_types[0].sort_order, 1);
        assert_eq!(ct.property_types[1].sort_order, 2);
    }

    #[test]
    fn test_validate_rejects_wider_property() {
        let mut ct = article();
        ct.property_type_mut("views").unwrap().variations = ContentVariation::SEGMENT;
        assert!(matches!(ct.validate_variations(), Err(StoreError::VariationMismatch { .. })));
    }

    #[test]
    fn test_coerce_when_type_shrinks() {
        let mut ct = article();
        ct.variations = ContentVariation::NOTHING;
        let coerced = ct.coerce_property_variations(ContentVariation::CULTURE);
        assert_eq!(coerced, vec!["title".to_string()]);
        assert!(ct.validate_variations().is_ok());
    }

    #[test]
    fn test_coerce_leaves_unrelated_mismatch() {
        let mut ct = article();
        ct.property_type_mut("views").unwrap().variations = ContentVariation::SEGMENT;
        assert!(ct.coerce_property_variations(ContentVariation::CULTURE).is_empty());
        assert!(ct.validate_variations().is_err());
    }

    #[test]
    fn test_composite_prefers_own() {
        let mut ct = article();
        ct.composed_property_types.push(
            PropertyType::new("title", "other", ValueStorageType::Ntext),
        );
        ct.composed_property_types.push(
            PropertyType::new("seo", "textbox", ValueStorageType::Nvarchar),
        );
        let all = ct.composite_property_types();
        assert_eq!(all.len(), 3);
        assert_eq!(ct.find_property_type("title").unwrap().editor_alias, "textbox");
        assert!(ct.find_property_type("seo").is_some());
    }
}
