//! Which content types and property types a variation change touches

use crate::error::Result;
use crate::models::content_type::ContentType;
use crate::models::variation::ContentVariation;
use rusqlite::{params, Connection};
use serde::Serialize;

/// Direction of a culture flag change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CultureTransition {
    Enabled,
    Disabled,
}

impl CultureTransition {
    pub fn between(from: ContentVariation, to: ContentVariation) -> Option<Self> {
        match (from.varies_by_culture(), to.varies_by_culture()) {
            (false, true) => Some(CultureTransition::Enabled),
            (true, false) => Some(CultureTransition::Disabled),
            _ => None,
        }
    }
}

/// Change of a property type's effective variation on one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyVariationChange {
    pub content_type_id: i32,
    pub property_type_id: i32,
    pub alias: String,
    pub from: ContentVariation,
    pub to: ContentVariation,
}

impl PropertyVariationChange {
    pub fn culture_transition(&self) -> Option<CultureTransition> {
        CultureTransition::between(self.from, self.to)
    }
}

/// Ids of every type that composes `content_type_id`, directly or through
/// other compositions.
pub fn composer_ids(conn: &Connection, content_type_id: i32) -> Result<Vec<i32>> {
    let mut stmt = conn.prepare_cached(
        "WITH RECURSIVE composers(id) AS ( \
             SELECT child_content_type_id FROM content_type_composition WHERE parent_content_type_id = ?1 \
             UNION \
             SELECT ctc.child_content_type_id FROM content_type_composition ctc \
             JOIN composers ON ctc.parent_content_type_id = composers.id \
         ) SELECT id FROM composers ORDER BY id",
    )?;
    let ids = stmt
        .query_map(params![content_type_id], |r| r.get::<_, i32>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Ids of every type `content_type_id` composes, transitively.
pub fn composition_ids(conn: &Connection, content_type_id: i32) -> Result<Vec<i32>> {
    let mut stmt = conn.prepare_cached(
        "WITH RECURSIVE composed(id) AS ( \
             SELECT parent_content_type_id FROM content_type_composition WHERE child_content_type_id = ?1 \
             UNION \
             SELECT ctc.parent_content_type_id FROM content_type_composition ctc \
             JOIN composed ON ctc.child_content_type_id = composed.id \
         ) SELECT id FROM composed ORDER BY id",
    )?;
    let ids = stmt
        .query_map(params![content_type_id], |r| r.get::<_, i32>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// The type itself plus every culture-varying type composing it, with the
/// variations each one currently has.
pub fn impacted_content_types(
    conn: &Connection,
    content_type: &ContentType,
) -> Result<Vec<(i32, ContentVariation)>> {
    let mut impacted = vec![(content_type.id, content_type.variations)];
    let mut stmt = conn.prepare_cached("SELECT variations FROM content_type WHERE node_id = ?1")?;
    for id in composer_ids(conn, content_type.id)? {
        if id == content_type.id {
            continue;
        }
        let bits: i64 = stmt.query_row(params![id], |r| r.get(0))?;
        let variations = ContentVariation::from_bits(bits);
        if variations.varies_by_culture() {
            impacted.push((id, variations));
        }
    }
    Ok(impacted)
}

/// Effective variation changes between two saves of a content type.
///
/// On the type itself every composite property type is compared as
/// `(old type & old property, new type & new property)`, which covers both
/// property-level edits and type-level flag changes reaching composed
/// properties. Composers see only the type's own property types, under
/// their own unchanged flags.
pub fn detect_changes(
    previous: &ContentType,
    current: &ContentType,
    impacted: &[(i32, ContentVariation)],
) -> Vec<PropertyVariationChange> {
    let mut changes = Vec::new();
    let old_types = previous.composite_property_types();
    for pt in current.composite_property_types() {
        let Some(old) = old_types.iter().find(|o| o.id == pt.id && pt.id > 0) else {
            continue;
        };
        let from = previous.variations & old.variations;
        let to = current.variations & pt.variations;
        if from != to {
            changes.push(PropertyVariationChange {
                content_type_id: current.id,
                property_type_id: pt.id,
                alias: pt.alias.clone(),
                from,
                to,
            });
        }
    }
    for (composer_id, composer_variations) in impacted {
        if *composer_id == current.id {
            continue;
        }
        for pt in &current.property_types {
            let Some(old) = previous.property_types.iter().find(|o| o.id == pt.id && pt.id > 0) else {
                continue;
            };
            let from = *composer_variations & old.variations;
            let to = *composer_variations & pt.variations;
            if from != to {
                changes.push(PropertyVariationChange {
                    content_type_id: *composer_id,
                    property_type_id: pt.id,
                    alias: pt.alias.clone(),
                    from,
                    to,
                });
            }
        }
    }
    changes
}
