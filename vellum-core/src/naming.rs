//! Sibling-unique names
//!
//! A name already used by a sibling gets the first free numeric suffix:
//! `Page`, `Page1`, `Page2`. Comparison is case-insensitive.

use crate::error::Result;
use crate::models::object_type::ObjectType;
use rusqlite::{params, Connection};
use std::collections::HashSet;

/// Pick `name` or the first `name{i}` (i ≥ 1) not present in `taken`.
pub fn resolve_unique_name<S: AsRef<str>>(name: &str, taken: &[S]) -> String {
    let taken: HashSet<String> = taken.iter().map(|s| s.as_ref().to_lowercase()).collect();
    if !taken.contains(&name.to_lowercase()) {
        return name.to_string();
    }
    let mut i: u32 = 1;
    loop {
        let candidate = format!("{}{}", name, i);
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        i += 1;
    }
}

/// Keep the names starting with `name` under Unicode case folding, the
/// same folding [`resolve_unique_name`] compares with.
fn with_prefix_of(names: Vec<String>, name: &str) -> Vec<String> {
    let prefix = name.to_lowercase();
    names
        .into_iter()
        .filter(|n| n.to_lowercase().starts_with(&prefix))
        .collect()
}

/// Names of siblings that could clash with `name`.
fn sibling_names(
    conn: &Connection,
    parent_id: i32,
    object_type: ObjectType,
    exclude_id: i32,
    name: &str,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT text FROM node WHERE parent_id = ?1 AND node_object_type = ?2 AND id <> ?3 \
         AND text IS NOT NULL",
    )?;
    let names = stmt
        .query_map(params![parent_id, object_type.tag(), exclude_id], |r| r.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(with_prefix_of(names, name))
}

/// Culture names of siblings' current versions that could clash with `name`.
fn sibling_culture_names(
    conn: &Connection,
    parent_id: i32,
    object_type: ObjectType,
    exclude_id: i32,
    language_id: i32,
    name: &str,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT cvcv.name FROM content_version_culture_variation cvcv \
         JOIN content_version cv ON cv.id = cvcv.version_id AND cv.current = 1 \
         JOIN node n ON n.id = cv.node_id \
         WHERE n.parent_id = ?1 AND n.node_object_type = ?2 AND n.id <> ?3 AND cvcv.language_id = ?4",
    )?;
    let names = stmt
        .query_map(params![parent_id, object_type.tag(), exclude_id, language_id], |r| r.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(with_prefix_of(names, name))
}

/// Unique invariant name among the node's siblings. `exclude_id` is the
/// node itself (0 for new nodes).
pub fn unique_node_name(
    conn: &Connection,
    parent_id: i32,
    object_type: ObjectType,
    exclude_id: i32,
    name: &str,
) -> Result<String> {
    let taken = sibling_names(conn, parent_id, object_type, exclude_id, name)?;
    Ok(resolve_unique_name(name, &taken))
}

/// Unique culture name among the siblings' names in the same language.
pub fn unique_culture_name(
    conn: &Connection,
    parent_id: i32,
    object_type: ObjectType,
    exclude_id: i32,
    language_id: i32,
    name: &str,
) -> Result<String> {
    let taken = sibling_culture_names(conn, parent_id, object_type, exclude_id, language_id, name)?;
    Ok(resolve_unique_name(name, &taken))
}
