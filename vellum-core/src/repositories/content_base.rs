//! Persistence shared by documents, media and members
//!
//! - name sanitizing and sibling-unique names
//! - node, content and version rows
//! - version culture names and tag bindings
//! - batched loading of the shared base
//! - the delete cascade

use crate::chunk::{in_groups, int_values, placeholders};
use crate::error::{Result, StoreError};
use crate::models::content::{ContentBase, CultureName};
use crate::models::content_type::ContentType;
use crate::models::node::{NodeRecord, NODE_COLUMNS};
use crate::models::object_type::ObjectType;
use crate::models::tag::{parse_tag_value, TagSpec};
use crate::naming::{unique_culture_name, unique_node_name};
use crate::repositories::language::Languages;
use crate::repositories::tag;
use crate::tree::{self, NewNode};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Make the names of `base` valid and unique among its siblings.
///
/// Invariant content needs a non-empty name. Culture-variant content needs
/// at least one culture name; each is made unique among the siblings' names
/// in that language, and the invariant name is taken from the default
/// culture (or the first available one) before it is made unique too.
pub(crate) fn sanitize_names(
    conn: &Connection,
    object_type: ObjectType,
    base: &mut ContentBase,
    languages: &Languages,
) -> Result<()> {
    let invariant = if base.varies_by_culture() {
        let mut renamed = Vec::new();
        for (culture, name) in &base.culture_names {
            let trimmed = name.name.trim();
            if trimmed.is_empty() {
                return Err(StoreError::EmptyName { id: base.id });
            }
            let language_id = languages.require_id(culture)?;
            let unique = unique_culture_name(conn, base.parent_id, object_type, base.id, language_id, trimmed)?;
            if unique != name.name {
                renamed.push((culture.clone(), unique));
            }
        }
        for (culture, unique) in renamed {
            if let Some(entry) = base.culture_names.get_mut(&culture) {
                entry.name = unique;
            }
        }
        let from_default = languages
            .default_iso()
            .and_then(|iso| base.culture_name(iso))
            .map(str::to_string);
        match from_default.or_else(|| base.culture_names.values().next().map(|n| n.name.clone())) {
            Some(name) => name,
            None => return Err(StoreError::EmptyName { id: base.id }),
        }
    } else {
        match base.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(StoreError::EmptyName { id: base.id }),
        }
    };
    base.name = Some(unique_node_name(conn, base.parent_id, object_type, base.id, &invariant)?);
    Ok(())
}

/// Insert the node and content rows of a new item.
pub(crate) fn insert_content(conn: &Connection, object_type: ObjectType, base: &mut ContentBase) -> Result<()> {
    let node = tree::insert_node(
        conn,
        &NewNode {
            key: base.key,
            parent_id: base.parent_id,
            object_type,
            text: base.name.as_deref(),
            user_id: base.creator_id,
            create_date: base.create_date,
        },
    )?;
    conn.execute(
        "INSERT INTO content (node_id, content_type_id) VALUES (?1, ?2)",
        params![node.id, base.content_type.id],
    )?;
    base.id = node.id;
    base.level = node.level;
    base.path = node.path;
    base.sort_order = node.sort_order;
    base.trashed = node.trashed;
    Ok(())
}

/// Insert a version row. Returns its id.
pub(crate) fn create_version(conn: &Connection, base: &ContentBase, current: bool) -> Result<i32> {
    conn.execute(
        "INSERT INTO content_version (node_id, version_date, user_id, current, text) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![base.id, base.update_date, base.writer_id, current, base.name],
    )?;
    Ok(conn.last_insert_rowid() as i32)
}

/// Refresh date, writer and text of an existing version.
pub(crate) fn touch_version(conn: &Connection, version_id: i32, base: &ContentBase) -> Result<()> {
    conn.execute(
        "UPDATE content_version SET version_date = ?2, user_id = ?3, text = ?4 WHERE id = ?1",
        params![version_id, base.update_date, base.writer_id, base.name],
    )?;
    Ok(())
}

/// Replace the culture names stored for one version.
pub(crate) fn write_version_names(
    conn: &Connection,
    version_id: i32,
    base: &ContentBase,
    languages: &Languages,
) -> Result<()> {
    conn.execute(
        "DELETE FROM content_version_culture_variation WHERE version_id = ?1",
        params![version_id],
    )?;
    if !base.varies_by_culture() {
        return Ok(());
    }
    let mut stmt = conn.prepare_cached(
        "INSERT INTO content_version_culture_variation (version_id, language_id, name, date, user_id) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (culture, name) in &base.culture_names {
        let language_id = languages.require_id(culture)?;
        stmt.execute(params![version_id, language_id, name.name, name.date, base.writer_id])?;
    }
    Ok(())
}

/// Rebind tags of every tag-group property from its edited values.
pub(crate) fn write_tags(conn: &Connection, base: &ContentBase, languages: &Languages) -> Result<()> {
    for property in base.properties.iter() {
        let Some(group) = property.property_type.tag_group.as_deref() else {
            continue;
        };
        let mut specs = Vec::new();
        for slot in &property.values {
            let Some(text) = slot.edited_value.as_ref().and_then(|v| v.as_text()) else {
                continue;
            };
            let language_id = match slot.culture.as_deref() {
                Some(culture) => Some(languages.require_id(culture)?),
                None => None,
            };
            specs.extend(
                parse_tag_value(text)
                    .iter()
                    .map(|t| TagSpec::new(t, group, language_id)),
            );
        }
        tag::assign(conn, base.id, property.property_type.id, &specs, true)?;
    }
    Ok(())
}

/// Node, content and current version of one stored item.
pub(crate) struct BaseRow {
    pub node: NodeRecord,
    pub content_type_id: i32,
    pub version_id: i32,
    pub version_date: DateTime<Utc>,
    pub writer_id: Option<i32>,
}

/// Base rows of the given ids, in the order of `ids`. Missing ids and ids
/// of another object type are skipped.
pub(crate) fn load_base_rows(
    conn: &Connection,
    object_type: ObjectType,
    ids: &[i32],
    max_parameters: usize,
) -> Result<Vec<BaseRow>> {
    let mut by_id = HashMap::with_capacity(ids.len());
    for group in in_groups(ids, max_parameters, 1) {
        let sql = format!(
            "SELECT {}, c.content_type_id, cv.id, cv.version_date, cv.user_id FROM node n \
             JOIN content c ON c.node_id = n.id \
             JOIN content_version cv ON cv.node_id = n.id AND cv.current = 1 \
             WHERE n.node_object_type = ? AND n.id IN ({})",
            NODE_COLUMNS,
            placeholders(group.len())
        );
        let mut values = vec![SqlValue::Text(object_type.tag().to_string())];
        values.extend(int_values(group));
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        while let Some(row) = rows.next()? {
            let node = NodeRecord::from_row(row, 0)?;
            by_id.insert(
                node.id,
                BaseRow {
                    content_type_id: row.get(11)?,
                    version_id: row.get(12)?,
                    version_date: row.get(13)?,
                    writer_id: row.get(14)?,
                    node,
                },
            );
        }
    }
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Culture names per version id.
pub(crate) fn load_version_names(
    conn: &Connection,
    version_ids: &[i32],
    languages: &Languages,
    max_parameters: usize,
) -> Result<HashMap<i32, BTreeMap<String, CultureName>>> {
    let mut names: HashMap<i32, BTreeMap<String, CultureName>> = HashMap::new();
    for group in in_groups(version_ids, max_parameters, 0) {
        let sql = format!(
            "SELECT version_id, language_id, name, date FROM content_version_culture_variation \
             WHERE version_id IN ({})",
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(int_values(group)))?;
        while let Some(row) = rows.next()? {
            let language_id: i32 = row.get(1)?;
            let Some(iso) = languages.iso_by_id(language_id) else {
                tracing::warn!("Culture name references unknown language {}", language_id);
                continue;
            };
            names.entry(row.get(0)?).or_default().insert(
                iso.to_string(),
                CultureName {
                    name: row.get(2)?,
                    date: row.get(3)?,
                },
            );
        }
    }
    Ok(names)
}

/// Build the in-memory base from its stored rows. Properties are filled by
/// the caller.
pub(crate) fn to_base(
    row: &BaseRow,
    content_type: Arc<ContentType>,
    culture_names: BTreeMap<String, CultureName>,
) -> ContentBase {
    let mut base = ContentBase::new(row.node.text.as_deref(), row.node.parent_id, content_type);
    base.id = row.node.id;
    base.key = row.node.key;
    base.level = row.node.level;
    base.path = row.node.path.clone();
    base.sort_order = row.node.sort_order;
    base.trashed = row.node.trashed;
    base.creator_id = row.node.user_id;
    base.writer_id = row.writer_id;
    base.create_date = row.node.create_date;
    base.update_date = row.version_date;
    base.version_id = row.version_id;
    base.culture_names = culture_names;
    base
}

/// Delete a node with all its descendants, deepest first. Returns the
/// deleted nodes in deletion order.
pub(crate) fn delete_tree(conn: &Connection, id: i32) -> Result<Vec<NodeRecord>> {
    let mut ids = tree::descendant_ids(conn, id)?;
    ids.push(id);
    let mut deleted = Vec::with_capacity(ids.len());
    for node_id in ids {
        if let Some(node) = tree::get_node(conn, node_id)? {
            delete_node_data(conn, node_id)?;
            deleted.push(node);
        }
    }
    tracing::info!("Deleted node {} and {} descendant(s)", id, deleted.len().saturating_sub(1));
    Ok(deleted)
}

/// Move an item under a new parent and refresh its placement. Returns the
/// ids whose placement changed.
pub(crate) fn move_content(conn: &Connection, base: &mut ContentBase, parent_id: i32) -> Result<Vec<i32>> {
    let moved = tree::move_node(conn, base.id, parent_id)?;
    let node = tree::get_node(conn, base.id)?.ok_or_else(|| StoreError::not_found("Node", base.id))?;
    base.parent_id = node.parent_id;
    base.level = node.level;
    base.path = node.path;
    base.sort_order = node.sort_order;
    base.trashed = node.trashed;
    Ok(moved)
}

fn delete_node_data(conn: &Connection, id: i32) -> Result<()> {
    const VERSIONS: &str = "(SELECT id FROM content_version WHERE node_id = ?1)";
    let statements = [
        "DELETE FROM relation WHERE parent_id = ?1 OR child_id = ?1".to_string(),
        "DELETE FROM tag_relationship WHERE node_id = ?1".to_string(),
        "DELETE FROM document WHERE node_id = ?1".to_string(),
        "DELETE FROM document_culture_variation WHERE node_id = ?1".to_string(),
        format!("DELETE FROM document_version WHERE id IN {}", VERSIONS),
        format!("DELETE FROM property_data WHERE version_id IN {}", VERSIONS),
        format!("DELETE FROM content_version_culture_variation WHERE version_id IN {}", VERSIONS),
        format!("DELETE FROM media_version WHERE id IN {}", VERSIONS),
        "DELETE FROM member WHERE node_id = ?1".to_string(),
        "DELETE FROM content_version WHERE node_id = ?1".to_string(),
        "DELETE FROM content WHERE node_id = ?1".to_string(),
        "DELETE FROM node WHERE id = ?1".to_string(),
    ];
    for sql in &statements {
        conn.execute(sql, params![id])?;
    }
    Ok(())
}
