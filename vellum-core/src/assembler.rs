//! Property collection assembly
//!
//! Rebuilds the properties of many content items at once from the raw rows
//! of their draft and published versions: one chunked fetch of rows, one
//! chunked fetch of the property types they reference, then grouping by
//! version.

use crate::config::EngineConfig;
use crate::error::{Result, StoreError};
use crate::models::content::build_properties;
use crate::models::content_type::{ContentType, PropertyType};
use crate::models::property::{PropertyCollection, PropertyDataRow};
use crate::property_data::load_rows;
use crate::repositories::content_type::property_types_by_ids;
use crate::repositories::language::Languages;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Versions of one content item to assemble.
#[derive(Debug, Clone)]
pub struct VersionRef {
    pub node_id: i32,
    pub draft_version_id: i32,
    /// 0 when nothing is published.
    pub published_version_id: i32,
    pub content_type: Arc<ContentType>,
}

/// Key of a row set. A draft that is also the published version is filed
/// under `NoVersion(node)` so both sides find their rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowSetKey {
    Version(i32),
    NoVersion(i32),
}

impl VersionRef {
    fn draft_key(&self) -> RowSetKey {
        if self.draft_version_id == self.published_version_id {
            RowSetKey::NoVersion(self.node_id)
        } else {
            RowSetKey::Version(self.draft_version_id)
        }
    }

    fn published_key(&self) -> Option<RowSetKey> {
        (self.published_version_id > 0).then_some(RowSetKey::Version(self.published_version_id))
    }
}

/// Group rows into row sets keyed per item. A key claimed twice means the
/// caller asked for the same version under two items; strict loading turns
/// that into an error.
pub fn group_row_sets<'a>(
    items: &[VersionRef],
    rows: &'a [PropertyDataRow],
    strict: bool,
) -> Result<HashMap<RowSetKey, Vec<&'a PropertyDataRow>>> {
    let mut by_version: HashMap<i32, Vec<&PropertyDataRow>> = HashMap::new();
    for row in rows {
        by_version.entry(row.version_id).or_default().push(row);
    }
    let mut sets = HashMap::new();
    for item in items {
        let mut claim = |key: RowSetKey, version_id: i32| -> Result<()> {
            if sets.contains_key(&key) {
                if strict {
                    return Err(StoreError::DuplicateVersion(version_id));
                }
                tracing::warn!("Version {} resolves to more than one row set", version_id);
                return Ok(());
            }
            sets.insert(key, by_version.get(&version_id).cloned().unwrap_or_default());
            Ok(())
        };
        claim(item.draft_key(), item.draft_version_id)?;
        if let Some(key) = item.published_key() {
            claim(key, item.published_version_id)?;
        }
    }
    Ok(sets)
}

/// Assemble the properties of each item, keyed by node id.
pub fn assemble(
    conn: &Connection,
    items: &[VersionRef],
    languages: &Languages,
    config: &EngineConfig,
) -> Result<HashMap<i32, PropertyCollection>> {
    let version_ids: Vec<i32> = items
        .iter()
        .flat_map(|i| [i.draft_version_id, i.published_version_id])
        .filter(|id| *id > 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let rows = load_rows(conn, &version_ids, config.max_parameter_count)?;

    let type_ids: Vec<i32> = rows
        .iter()
        .map(|r| r.property_type_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let property_types: HashMap<i32, PropertyType> = property_types_by_ids(conn, &type_ids, config.max_parameter_count)?
        .into_iter()
        .map(|pt| (pt.id, pt))
        .collect();

    let sets = group_row_sets(items, &rows, config.strict_property_loading)?;
    let mut result = HashMap::with_capacity(items.len());
    for item in items {
        let mut properties = build_properties(&item.content_type);
        if let Some(draft) = sets.get(&item.draft_key()) {
            fill(&mut properties, draft, &property_types, languages, false);
        }
        if let Some(published) = item.published_key().and_then(|k| sets.get(&k)) {
            fill(&mut properties, published, &property_types, languages, true);
        }
        result.insert(item.node_id, properties);
    }
    Ok(result)
}

fn fill(
    properties: &mut PropertyCollection,
    rows: &[&PropertyDataRow],
    property_types: &HashMap<i32, PropertyType>,
    languages: &Languages,
    published: bool,
) {
    for row in rows {
        let Some(pt) = property_types.get(&row.property_type_id) else {
            continue;
        };
        let Some(property) = properties.get_mut(&pt.alias) else {
            tracing::debug!("Skipping row of property type {} not on the content type", pt.alias);
            continue;
        };
        let culture = match row.language_id {
            Some(id) => match languages.iso_by_id(id) {
                Some(iso) => Some(iso.to_string()),
                None => {
                    tracing::warn!("Property row {} references unknown language {}", row.id, id);
                    continue;
                }
            },
            None => None,
        };
        property.load_value(
            row.columns.to_value(),
            culture.as_deref(),
            row.segment.as_deref(),
            published,
        );
    }
}
