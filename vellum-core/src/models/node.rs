//! Node records: identity and tree placement shared by every entity

use crate::error::{Result, StoreError};
use crate::models::object_type::{ObjectType, SYSTEM_ROOT_IDS};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw row of the `node` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: i32,
    pub key: Uuid,
    pub parent_id: i32,
    pub level: i32,
    pub path: String,
    pub sort_order: i32,
    pub trashed: bool,
    pub user_id: Option<i32>,
    pub text: Option<String>,
    pub object_type: ObjectType,
    pub create_date: DateTime<Utc>,
}

/// Column list matching [`NodeRecord::from_row`].
pub const NODE_COLUMNS: &str = "n.id, n.unique_id, n.parent_id, n.level, n.path, n.sort_order, \
     n.trashed, n.node_user, n.text, n.node_object_type, n.create_date";

impl NodeRecord {
    /// Read a record selected with [`NODE_COLUMNS`] starting at `offset`.
    pub fn from_row(row: &Row<'_>, offset: usize) -> Result<Self> {
        let key: String = row.get(offset + 1)?;
        let tag: String = row.get(offset + 9)?;
        Ok(Self {
            id: row.get(offset)?,
            key: parse_key(&key)?,
            parent_id: row.get(offset + 2)?,
            level: row.get(offset + 3)?,
            path: row.get(offset + 4)?,
            sort_order: row.get(offset + 5)?,
            trashed: row.get(offset + 6)?,
            user_id: row.get(offset + 7)?,
            text: row.get(offset + 8)?,
            object_type: ObjectType::from_tag(&tag)?,
            create_date: row.get(offset + 10)?,
        })
    }

    /// Path ids with the system roots removed.
    pub fn path_segments(&self) -> Result<Vec<i32>> {
        content_path_segments(&self.path)
    }
}

/// Parse a stored node key.
pub fn parse_key(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("bad node key '{}': {}", value, e)))
}

/// Split a comma-joined path into ids.
pub fn parse_path(path: &str) -> Result<Vec<i32>> {
    path.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<i32>()
                .map_err(|_| StoreError::Corrupt(format!("bad path segment '{}' in '{}'", s, path)))
        })
        .collect()
}

/// Path ids that are not system roots.
pub fn content_path_segments(path: &str) -> Result<Vec<i32>> {
    Ok(parse_path(path)?
        .into_iter()
        .filter(|id| !SYSTEM_ROOT_IDS.contains(id))
        .collect())
}

/// Path of a child given its parent's path.
pub fn child_path(parent_path: &str, id: i32) -> String {
    format!("{},{}", parent_path, id)
}
