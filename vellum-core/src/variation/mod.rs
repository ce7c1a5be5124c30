//! Culture variation migration
//!
//! When a content type is saved with different variation flags, stored
//! data has to follow:
//! - names move between node text and default-language name rows
//! - property values move between invariant and default-language rows
//! - tag relationships move between invariant and default-language tags
//! - document and culture `edited` flags are recomputed
//!
//! Every step runs on the caller's connection, inside the caller's scope.

pub mod edited;
pub mod impact;
pub mod names;
pub mod property_data;
pub mod tags;

pub use edited::{renormalize_edited, EditedScope, EditedSummary};
pub use impact::{
    composer_ids, composition_ids, detect_changes, impacted_content_types, CultureTransition,
    PropertyVariationChange,
};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::content_type::ContentType;
use crate::models::object_type::ObjectType;
use crate::repositories::language::Languages;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// What a migration did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub content_type_id: i32,
    pub impacted_content_types: Vec<i32>,
    pub names: Option<CultureTransition>,
    pub changes: Vec<PropertyVariationChange>,
    pub property_rows_copied: usize,
    pub tag_relationships_copied: usize,
    pub edited: Option<EditedSummary>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.names.is_none() && self.changes.is_empty()
    }
}

/// Bring stored data in line after `previous` was saved as `current`.
pub fn migrate(
    conn: &Connection,
    previous: &ContentType,
    current: &ContentType,
    config: &EngineConfig,
) -> Result<MigrationReport> {
    let max = config.max_parameter_count;
    let impacted = impacted_content_types(conn, current)?;
    let changes = detect_changes(previous, current, &impacted);
    let mut report = MigrationReport {
        content_type_id: current.id,
        impacted_content_types: impacted.iter().map(|(id, _)| *id).collect(),
        names: CultureTransition::between(previous.variations, current.variations),
        changes,
        ..MigrationReport::default()
    };
    if report.is_empty() {
        return Ok(report);
    }
    let default_language_id = Languages::load(conn)?.require_default_id()?;

    if let Some(transition) = report.names {
        names::copy_names(conn, transition, default_language_id, &[current.id], max)?;
    }

    // (content type, enabled) -> property types
    let mut groups: BTreeMap<(i32, bool), Vec<i32>> = BTreeMap::new();
    for change in &report.changes {
        if let Some(transition) = change.culture_transition() {
            groups
                .entry((change.content_type_id, transition == CultureTransition::Enabled))
                .or_default()
                .push(change.property_type_id);
        }
    }
    for ((content_type_id, enabled), property_type_ids) in &groups {
        let transition = if *enabled {
            CultureTransition::Enabled
        } else {
            CultureTransition::Disabled
        };
        report.property_rows_copied += property_data::copy_property_data(
            conn,
            transition,
            default_language_id,
            property_type_ids,
            &[*content_type_id],
            max,
        )?;
        report.tag_relationships_copied += tags::copy_tag_data(
            conn,
            transition,
            default_language_id,
            property_type_ids,
            &[*content_type_id],
            max,
        )?;
    }

    if current.object_type == ObjectType::DocumentType {
        let scope = EditedScope {
            content_type_ids: report.impacted_content_types.clone(),
            ..EditedScope::default()
        };
        report.edited = Some(renormalize_edited(conn, &scope, default_language_id, max)?);
    }

    tracing::info!(
        "Variation migration for content type {}: names {:?}, {} property change(s), {} row(s) copied",
        current.id,
        report.names,
        report.changes.len(),
        report.property_rows_copied
    );
    Ok(report)
}
