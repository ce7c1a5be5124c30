//! Property values: typed values, their storage columns and the per-entity
//! collection keyed by (culture, segment).

use crate::error::{Result, StoreError};
use crate::models::content_type::{PropertyType, ValueStorageType};
use crate::models::variation::ContentVariation;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Decimal(f64),
    Date(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

/// The four typed value columns of a `property_data` row (text split into
/// short and long). At most one is populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueColumns {
    pub int_value: Option<i64>,
    pub decimal_value: Option<f64>,
    pub date_value: Option<NaiveDateTime>,
    pub varchar_value: Option<String>,
    pub text_value: Option<String>,
}

impl ValueColumns {
    /// Place a value in the column its storage type dictates, converting
    /// where the conversion is lossless.
    pub fn from_value(value: &Value, storage: ValueStorageType) -> Result<Self> {
        let mismatch = || {
            StoreError::InvariantViolation(format!(
                "value {:?} cannot be stored as {}",
                value,
                storage.as_str()
            ))
        };
        let mut cols = ValueColumns::default();
        match storage {
            ValueStorageType::Integer => {
                cols.int_value = Some(match value {
                    Value::Integer(i) => *i,
                    Value::Text(s) => s.trim().parse().map_err(|_| mismatch())?,
                    _ => return Err(mismatch()),
                })
            }
            ValueStorageType::Decimal => {
                cols.decimal_value = Some(match value {
                    Value::Decimal(d) => *d,
                    Value::Integer(i) => *i as f64,
                    Value::Text(s) => s.trim().parse().map_err(|_| mismatch())?,
                    _ => return Err(mismatch()),
                })
            }
            ValueStorageType::Date => {
                cols.date_value = Some(match value {
                    Value::Date(d) => *d,
                    Value::Text(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%dT%H:%M:%S")
                        .map_err(|_| mismatch())?,
                    _ => return Err(mismatch()),
                })
            }
            ValueStorageType::Nvarchar => cols.varchar_value = Some(value_to_string(value)),
            ValueStorageType::Ntext => cols.text_value = Some(value_to_string(value)),
        }
        Ok(cols)
    }

    /// First populated column in storage order.
    pub fn to_value(&self) -> Option<Value> {
        if let Some(i) = self.int_value {
            return Some(Value::Integer(i));
        }
        if let Some(d) = self.decimal_value {
            return Some(Value::Decimal(d));
        }
        if let Some(d) = self.date_value {
            return Some(Value::Date(d));
        }
        self.varchar_value
            .clone()
            .or_else(|| self.text_value.clone())
            .map(Value::Text)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Integer(i) => i.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Date(d) => d.format("%Y-%m-%dT%H:%M:%S").to_string(),
        Value::Text(s) => s.clone(),
    }
}

/// Raw row of the `property_data` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDataRow {
    pub id: i64,
    pub version_id: i32,
    pub property_type_id: i32,
    pub language_id: Option<i32>,
    pub segment: Option<String>,
    pub columns: ValueColumns,
}

impl PropertyDataRow {
    /// Identity of the row within its version.
    pub fn key(&self) -> (i32, Option<i32>, Option<String>) {
        (self.property_type_id, self.language_id, self.segment.clone())
    }
}

/// Edited (draft) and published value of one (culture, segment) slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyValue {
    pub culture: Option<String>,
    pub segment: Option<String>,
    pub edited_value: Option<Value>,
    pub published_value: Option<Value>,
}

impl PropertyValue {
    fn matches(&self, culture: Option<&str>, segment: Option<&str>) -> bool {
        eq_ignore_case(self.culture.as_deref(), culture) && self.segment.as_deref() == segment
    }
}

fn eq_ignore_case(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// A property of an entity together with all of its variant values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub property_type: PropertyType,
    /// Effective variation on the owning entity's content type.
    pub variations: ContentVariation,
    pub values: Vec<PropertyValue>,
}

impl Property {
    pub fn new(property_type: PropertyType, variations: ContentVariation) -> Self {
        Self {
            property_type,
            variations,
            values: Vec::new(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.property_type.alias
    }

    pub fn get_value(&self, culture: Option<&str>, segment: Option<&str>, published: bool) -> Option<&Value> {
        let slot = self.values.iter().find(|v| v.matches(culture, segment))?;
        if published {
            slot.published_value.as_ref()
        } else {
            slot.edited_value.as_ref()
        }
    }

    /// Set the edited value of a slot. The key must fit the variation.
    pub fn set_value(&mut self, value: Option<Value>, culture: Option<&str>, segment: Option<&str>) -> Result<()> {
        if !self.variations.accepts(culture, segment) {
            return Err(StoreError::InvariantViolation(format!(
                "property '{}' ({}) does not accept culture {:?} segment {:?}",
                self.alias(),
                self.variations,
                culture,
                segment
            )));
        }
        self.slot_mut(culture, segment).edited_value = value;
        Ok(())
    }

    /// Used by the loader: sets either side without variation checks, so
    /// rows persisted under an older schema still load.
    pub fn load_value(&mut self, value: Option<Value>, culture: Option<&str>, segment: Option<&str>, published: bool) {
        let slot = self.slot_mut(culture, segment);
        if published {
            slot.published_value = value;
        } else {
            slot.edited_value = value;
        }
    }

    /// Copy edited values to published for one culture, or all when `None`.
    /// Invariant slots are always published along with any culture.
    pub fn publish_values(&mut self, culture: Option<&str>) {
        for slot in &mut self.values {
            let culture_matches = match (culture, slot.culture.as_deref()) {
                (None, _) => true,
                (_, None) => true,
                (Some(c), Some(sc)) => c.eq_ignore_ascii_case(sc),
            };
            if culture_matches {
                slot.published_value = slot.edited_value.clone();
            }
        }
    }

    pub fn unpublish_values(&mut self) {
        for slot in &mut self.values {
            slot.published_value = None;
        }
    }

    fn slot_mut(&mut self, culture: Option<&str>, segment: Option<&str>) -> &mut PropertyValue {
        if let Some(idx) = self.values.iter().position(|v| v.matches(culture, segment)) {
            return &mut self.values[idx];
        }
        self.values.push(PropertyValue {
            culture: culture.map(str::to_string),
            segment: segment.map(str::to_string),
            ..PropertyValue::default()
        });
        let last = self.values.len() - 1;
        &mut self.values[last]
    }
}

/// Ordered set of an entity's properties.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyCollection {
    properties: Vec<Property>,
}

impl PropertyCollection {
    pub fn new(properties: Vec<Property>) -> Self {
        Self { properties }
    }

    pub fn get(&self, alias: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.alias() == alias)
    }

    pub fn get_mut(&mut self, alias: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.alias() == alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
