//! Node identity and tree placement
//!
//! Every node stores its ancestor path (`-1,12,40`), its depth and its sort
//! order among siblings. This module keeps those three in sync:
//! - placement of new nodes
//! - moves (including into the recycle bins)
//! - a one-pass integrity check with optional repair

use crate::error::{Result, StoreError};
use crate::models::node::{child_path, content_path_segments, NodeRecord, NODE_COLUMNS};
use crate::models::object_type::{ObjectType, SYSTEM_ROOT_IDS};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Load one node by id.
pub fn get_node(conn: &Connection, id: i32) -> Result<Option<NodeRecord>> {
    let sql = format!("SELECT {} FROM node n WHERE n.id = ?1", NODE_COLUMNS);
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(NodeRecord::from_row(row, 0)?)),
        None => Ok(None),
    }
}

/// Load one node by key.
pub fn get_node_by_key(conn: &Connection, key: Uuid) -> Result<Option<NodeRecord>> {
    let sql = format!("SELECT {} FROM node n WHERE n.unique_id = ?1", NODE_COLUMNS);
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query(params![key.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(NodeRecord::from_row(row, 0)?)),
        None => Ok(None),
    }
}

fn require_node(conn: &Connection, id: i32) -> Result<NodeRecord> {
    get_node(conn, id)?.ok_or_else(|| StoreError::not_found("Node", id))
}

/// Sort order for a new last child of `parent_id`.
pub fn next_sort_order(conn: &Connection, parent_id: i32, object_type: ObjectType) -> Result<i32> {
    let max: Option<i32> = conn.query_row(
        "SELECT MAX(sort_order) FROM node WHERE parent_id = ?1 AND node_object_type = ?2",
        params![parent_id, object_type.tag()],
        |r| r.get(0),
    )?;
    Ok(max.map(|m| m + 1).unwrap_or(0))
}

/// Values for a new node row.
#[derive(Debug, Clone)]
pub struct NewNode<'a> {
    pub key: Uuid,
    pub parent_id: i32,
    pub object_type: ObjectType,
    pub text: Option<&'a str>,
    pub user_id: Option<i32>,
    pub create_date: DateTime<Utc>,
}

/// Insert a node as the last child of its parent and derive path, level
/// and sort order from the parent.
pub fn insert_node(conn: &Connection, node: &NewNode<'_>) -> Result<NodeRecord> {
    let parent = require_node(conn, node.parent_id)?;
    let level = parent.level + 1;
    let sort_order = next_sort_order(conn, node.parent_id, node.object_type)?;
    let trashed = parent.trashed || is_recycle_bin(parent.id);
    conn.execute(
        "INSERT INTO node (unique_id, parent_id, level, path, sort_order, trashed, node_user, text, node_object_type, create_date) \
         VALUES (?1, ?2, ?3, '', ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            node.key.to_string(),
            node.parent_id,
            level,
            sort_order,
            trashed,
            node.user_id,
            node.text,
            node.object_type.tag(),
            node.create_date
        ],
    )?;
    let id = conn.last_insert_rowid() as i32;
    let path = child_path(&parent.path, id);
    conn.execute("UPDATE node SET path = ?2 WHERE id = ?1", params![id, path])?;
    tracing::debug!("Inserted node {} at {}", id, path);
    Ok(NodeRecord {
        id,
        key: node.key,
        parent_id: node.parent_id,
        level,
        path,
        sort_order,
        trashed,
        user_id: node.user_id,
        text: node.text.map(str::to_string),
        object_type: node.object_type,
        create_date: node.create_date,
    })
}

fn is_recycle_bin(id: i32) -> bool {
    id == crate::models::DOCUMENT_RECYCLE_BIN_ID || id == crate::models::MEDIA_RECYCLE_BIN_ID
}

/// Update the display text of a node.
pub fn update_node_text(conn: &Connection, id: i32, text: Option<&str>) -> Result<()> {
    conn.execute("UPDATE node SET text = ?2 WHERE id = ?1", params![id, text])?;
    Ok(())
}

/// Move a node (and its subtree) under a new parent, appending it after
/// the parent's existing children. Returns the ids whose placement changed.
pub fn move_node(conn: &Connection, id: i32, new_parent_id: i32) -> Result<Vec<i32>> {
    let node = require_node(conn, id)?;
    let parent = require_node(conn, new_parent_id)?;
    if content_path_segments(&parent.path)?.contains(&id) || parent.id == id {
        return Err(StoreError::InvariantViolation(format!(
            "cannot move node {} below itself",
            id
        )));
    }
    let old_path = node.path.clone();
    let new_path = child_path(&parent.path, id);
    let new_level = parent.level + 1;
    let level_delta = new_level - node.level;
    let trashed = parent.trashed || is_recycle_bin(parent.id);
    let sort_order = next_sort_order(conn, new_parent_id, node.object_type)?;

    conn.execute(
        "UPDATE node SET parent_id = ?2, path = ?3, level = ?4, sort_order = ?5, trashed = ?6 WHERE id = ?1",
        params![id, new_parent_id, new_path, new_level, sort_order, trashed],
    )?;
    let mut moved = vec![id];
    let mut stmt = conn.prepare_cached("SELECT id FROM node WHERE path LIKE ?1 || ',%' ORDER BY level")?;
    let descendants = stmt
        .query_map(params![old_path], |r| r.get::<_, i32>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    conn.execute(
        "UPDATE node SET path = ?2 || substr(path, ?3), level = level + ?4, trashed = ?5 \
         WHERE path LIKE ?1 || ',%'",
        params![old_path, new_path, old_path.len() as i64 + 1, level_delta, trashed],
    )?;
    moved.extend(descendants);
    tracing::info!("Moved node {} from {} to {} ({} nodes)", id, old_path, new_path, moved.len());
    Ok(moved)
}

/// Ids of all descendants of a node, deepest first.
pub fn descendant_ids(conn: &Connection, id: i32) -> Result<Vec<i32>> {
    let node = require_node(conn, id)?;
    let mut stmt =
        conn.prepare_cached("SELECT id FROM node WHERE path LIKE ?1 || ',%' ORDER BY level DESC, id DESC")?;
    let ids = stmt
        .query_map(params![node.path], |r| r.get::<_, i32>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Rewrite sibling sort orders to follow `ordered_ids`.
pub fn sort_children(conn: &Connection, parent_id: i32, ordered_ids: &[i32]) -> Result<()> {
    let mut stmt = conn.prepare_cached("UPDATE node SET sort_order = ?3 WHERE id = ?1 AND parent_id = ?2")?;
    for (i, id) in ordered_ids.iter().enumerate() {
        if stmt.execute(params![id, parent_id, i as i32])? == 0 {
            return Err(StoreError::InvariantViolation(format!(
                "node {} is not a child of {}",
                id, parent_id
            )));
        }
    }
    Ok(())
}

// ── Integrity ──────────────────────────────────────────────

/// Kinds of path/level inconsistencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueType {
    /// The parent was not found among the valid nodes of the previous level.
    InvalidPathAndLevelByParentId,
    /// The path has no non-root segment.
    InvalidPathEmpty,
    /// The number of path segments differs from the level.
    InvalidPathLevelMismatch,
    /// The last path segment is not the node's id.
    InvalidPathById,
    /// The second-to-last path segment is not the parent's id.
    InvalidPathByParentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    pub issue_type: IssueType,
    pub fixed: bool,
}

/// Outcome of [`check_integrity`], keyed by node id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub issues: BTreeMap<i32, IntegrityIssue>,
}

impl IntegrityReport {
    pub fn ok(&self) -> bool {
        self.issues.is_empty() || self.issues.values().all(|i| i.fixed)
    }

    pub fn detected(&self) -> usize {
        self.issues.len()
    }

    pub fn fixed(&self) -> usize {
        self.issues.values().filter(|i| i.fixed).count()
    }

    pub fn unfixed_ids(&self) -> Vec<i32> {
        self.issues
            .iter()
            .filter(|(_, i)| !i.fixed)
            .map(|(id, _)| *id)
            .collect()
    }
}

struct TreeRow {
    id: i32,
    parent_id: i32,
    level: i32,
    path: String,
}

/// Validate path/level/parent consistency of every node of the given object
/// types, optionally repairing nodes whose parent is valid.
///
/// Nodes are streamed ordered by (level, parent, sort order). A node is valid
/// when its parent is among the ids seen at the previous level and its path
/// agrees with its level, id and parent. Repairs recompute path and level
/// from the validated parent; nodes whose parent never validates stay in the
/// report unfixed.
pub fn check_integrity(conn: &Connection, object_types: &[ObjectType], fix: bool) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();
    for object_type in object_types {
        check_object_type(conn, *object_type, fix, &mut report)?;
    }
    tracing::info!(
        "Integrity check: {} issue(s), {} fixed",
        report.detected(),
        report.fixed()
    );
    Ok(report)
}

fn check_object_type(
    conn: &Connection,
    object_type: ObjectType,
    fix: bool,
    report: &mut IntegrityReport,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, level, path FROM node WHERE node_object_type = ?1 \
         ORDER BY level, parent_id, sort_order",
    )?;
    let mut rows = stmt.query(params![object_type.tag()])?;

    let mut to_rebuild: HashMap<i32, Vec<TreeRow>> = HashMap::new();
    let mut valid: Vec<TreeRow> = Vec::new();
    let mut previous_level: HashSet<i32> = SYSTEM_ROOT_IDS.iter().copied().collect();
    let mut current_level: HashSet<i32> = previous_level.clone();
    let mut last_level = -1;

    while let Some(row) = rows.next()? {
        let node = TreeRow {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            level: row.get(2)?,
            path: row.get(3)?,
        };
        if node.level != last_level {
            previous_level = std::mem::take(&mut current_level);
            last_level = node.level;
        }

        let segments: Vec<String> = node
            .path
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| s.parse::<i32>().map(|id| !SYSTEM_ROOT_IDS.contains(&id)).unwrap_or(true))
            .map(str::to_string)
            .collect();

        let issue = if !previous_level.contains(&node.parent_id) {
            Some(IssueType::InvalidPathAndLevelByParentId)
        } else if segments.is_empty() {
            Some(IssueType::InvalidPathEmpty)
        } else if segments.len() as i32 != node.level {
            Some(IssueType::InvalidPathLevelMismatch)
        } else if segments[segments.len() - 1] != node.id.to_string() {
            Some(IssueType::InvalidPathById)
        } else if !SYSTEM_ROOT_IDS.contains(&node.parent_id)
            && (segments.len() < 2 || segments[segments.len() - 2] != node.parent_id.to_string())
        {
            Some(IssueType::InvalidPathByParentId)
        } else {
            None
        };

        match issue {
            Some(issue_type) => {
                report.issues.insert(node.id, IntegrityIssue { issue_type, fixed: false });
                to_rebuild.entry(node.parent_id).or_default().push(node);
            }
            None => {
                current_level.insert(node.id);
                if fix {
                    valid.push(node);
                }
            }
        }
    }

    if !fix {
        return Ok(());
    }

    let mut update = conn.prepare_cached("UPDATE node SET path = ?2, level = ?3 WHERE id = ?1")?;
    for parent in valid {
        let Some(children) = to_rebuild.remove(&parent.id) else {
            continue;
        };
        for child in children {
            let path = child_path(&parent.path, child.id);
            update.execute(params![child.id, path, parent.level + 1])?;
            if let Some(issue) = report.issues.get_mut(&child.id) {
                issue.fixed = true;
            }
            tracing::info!("Repaired path of node {} ({} -> {})", child.id, child.path, path);
        }
    }
    // Children of system roots have no valid row of their own to hang off.
    for root in SYSTEM_ROOT_IDS {
        let Some(children) = to_rebuild.remove(&root) else {
            continue;
        };
        let root_path: Option<String> = conn
            .query_row("SELECT path FROM node WHERE id = ?1", params![root], |r| r.get(0))
            .optional()?;
        let Some(root_path) = root_path else {
            continue;
        };
        for child in children {
            let path = child_path(&root_path, child.id);
            update.execute(params![child.id, path, 1])?;
            if let Some(issue) = report.issues.get_mut(&child.id) {
                issue.fixed = true;
            }
        }
    }
    Ok(())
}
