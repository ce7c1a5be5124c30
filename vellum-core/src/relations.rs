//! Automatic relations derived from property values
//!
//! Picker and rich text values embed references such as
//! `umb://document/4fd1…`. On every save the owning node's automatic
//! relations are deleted and rebuilt from the references its values hold.
//! References whose target or relation type is missing are dropped with a
//! warning; they never fail the save.

use crate::chunk::{in_groups, placeholders};
use crate::error::Result;
use crate::models::object_type::ObjectType;
use crate::models::property::{PropertyCollection, Value};
use crate::models::relation::{RELATED_DOCUMENT_ALIAS, RELATED_MEDIA_ALIAS, RELATED_MEMBER_ALIAS};
use crate::repositories::relation::{bulk_insert, delete_by_parent, RelationTypes};
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use uuid::Uuid;

const UDI_PATTERN: &str = r"umb://(document|media|member)/([0-9a-fA-F]{32})";

/// A reference found in a property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityReference {
    pub key: Uuid,
    pub object_type: ObjectType,
    pub relation_type_alias: &'static str,
}

/// Finds references in the values of properties edited with particular
/// editors.
pub trait ReferenceExtractor: Send + Sync {
    fn handles(&self, editor_alias: &str) -> bool;

    fn references(&self, value: &Value) -> Vec<EntityReference>;
}

/// Extracts `umb://<type>/<key>` identifiers from text values.
#[derive(Debug, Clone)]
pub struct UdiReferenceExtractor {
    editor_aliases: Vec<String>,
}

impl Default for UdiReferenceExtractor {
    fn default() -> Self {
        Self::new(&[
            "contentPicker",
            "mediaPicker",
            "memberPicker",
            "multiNodeTreePicker",
            "richText",
        ])
    }
}

impl UdiReferenceExtractor {
    pub fn new(editor_aliases: &[&str]) -> Self {
        Self {
            editor_aliases: editor_aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

fn udi_regex() -> &'static Regex {
    static UDI_REGEX: OnceLock<Regex> = OnceLock::new();
    UDI_REGEX.get_or_init(|| Regex::new(UDI_PATTERN).unwrap())
}

impl ReferenceExtractor for UdiReferenceExtractor {
    fn handles(&self, editor_alias: &str) -> bool {
        self.editor_aliases.iter().any(|a| a.eq_ignore_ascii_case(editor_alias))
    }

    fn references(&self, value: &Value) -> Vec<EntityReference> {
        let Some(text) = value.as_text() else {
            return Vec::new();
        };
        udi_regex()
            .captures_iter(text)
            .filter_map(|caps| {
                let (object_type, alias) = match &caps[1] {
                    "document" => (ObjectType::Document, RELATED_DOCUMENT_ALIAS),
                    "media" => (ObjectType::Media, RELATED_MEDIA_ALIAS),
                    _ => (ObjectType::Member, RELATED_MEMBER_ALIAS),
                };
                let key = Uuid::parse_str(&caps[2]).ok()?;
                Some(EntityReference {
                    key,
                    object_type,
                    relation_type_alias: alias,
                })
            })
            .collect()
    }
}

type ExtractorFactory = Box<dyn Fn() -> Vec<Box<dyn ReferenceExtractor>> + Send + Sync>;

/// Extractor collection built on first use. Editors and the repositories
/// that need them can then be wired in any order.
pub struct ReferenceExtractors {
    factory: ExtractorFactory,
    resolved: OnceLock<Vec<Box<dyn ReferenceExtractor>>>,
}

impl ReferenceExtractors {
    pub fn new(factory: impl Fn() -> Vec<Box<dyn ReferenceExtractor>> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            resolved: OnceLock::new(),
        }
    }

    pub fn get(&self) -> &[Box<dyn ReferenceExtractor>] {
        self.resolved.get_or_init(|| (self.factory)())
    }
}

impl Default for ReferenceExtractors {
    fn default() -> Self {
        Self::new(|| vec![Box::new(UdiReferenceExtractor::default()) as Box<dyn ReferenceExtractor>])
    }
}

/// Outcome of one relation rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationSyncReport {
    pub removed: usize,
    pub references: usize,
    pub inserted: usize,
    pub dropped: usize,
}

/// Rebuilds automatic relations from property values.
#[derive(Default)]
pub struct RelationSynchronizer {
    extractors: ReferenceExtractors,
}

impl RelationSynchronizer {
    pub fn new(extractors: ReferenceExtractors) -> Self {
        Self { extractors }
    }

    /// Distinct references held by any edited or published value, in the
    /// order first seen.
    pub fn collect(&self, properties: &PropertyCollection) -> Vec<EntityReference> {
        let mut seen = HashSet::new();
        let mut references = Vec::new();
        for property in properties.iter() {
            let extractors: Vec<&dyn ReferenceExtractor> = self
                .extractors
                .get()
                .iter()
                .filter(|e| e.handles(&property.property_type.editor_alias))
                .map(|e| e.as_ref())
                .collect();
            if extractors.is_empty() {
                continue;
            }
            for slot in &property.values {
                for value in [&slot.edited_value, &slot.published_value].into_iter().flatten() {
                    for extractor in &extractors {
                        for reference in extractor.references(value) {
                            if seen.insert(reference.clone()) {
                                references.push(reference);
                            }
                        }
                    }
                }
            }
        }
        references
    }

    /// Replace the automatic relations owned by `node_id`.
    pub fn persist_relations(
        &self,
        conn: &Connection,
        node_id: i32,
        properties: &PropertyCollection,
        max_parameters: usize,
    ) -> Result<RelationSyncReport> {
        let references = self.collect(properties);
        let types = RelationTypes::load(conn)?;
        let mut report = RelationSyncReport {
            removed: delete_by_parent(conn, node_id, &types.automatic_ids(), max_parameters)?,
            references: references.len(),
            ..RelationSyncReport::default()
        };
        if references.is_empty() {
            return Ok(report);
        }

        let keys: Vec<String> = references
            .iter()
            .map(|r| r.key.to_string())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let targets = resolve_keys(conn, &keys, max_parameters)?;

        let mut relations = Vec::with_capacity(references.len());
        for reference in &references {
            let Some(relation_type) = types.by_alias(reference.relation_type_alias) else {
                tracing::warn!(
                    "Relation type '{}' no longer exists; dropping reference from node {}",
                    reference.relation_type_alias,
                    node_id
                );
                report.dropped += 1;
                continue;
            };
            match targets.get(&reference.key.to_string()) {
                Some((child_id, object_type)) if *object_type == reference.object_type => {
                    relations.push((node_id, *child_id, relation_type.id));
                }
                _ => {
                    tracing::warn!(
                        "Reference from node {} to {:?} {} cannot be resolved; dropping it",
                        node_id,
                        reference.object_type,
                        reference.key
                    );
                    report.dropped += 1;
                }
            }
        }
        bulk_insert(conn, &relations)?;
        report.inserted = relations.len();
        tracing::debug!(
            "Node {} relations: {} removed, {} inserted, {} dropped",
            node_id,
            report.removed,
            report.inserted,
            report.dropped
        );
        Ok(report)
    }
}

/// Node id and object type by key, in chunks.
fn resolve_keys(conn: &Connection, keys: &[String], max_parameters: usize) -> Result<HashMap<String, (i32, ObjectType)>> {
    let mut resolved = HashMap::with_capacity(keys.len());
    for group in in_groups(keys, max_parameters, 0) {
        let sql = format!(
            "SELECT unique_id, id, node_object_type FROM node WHERE unique_id IN ({})",
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(group.iter().map(|k| SqlValue::Text(k.clone()))))?;
        while let Some(row) = rows.next()? {
            let tag: String = row.get(2)?;
            resolved.insert(row.get::<_, String>(0)?, (row.get(1)?, ObjectType::from_tag(&tag)?));
        }
    }
    Ok(resolved)
}
