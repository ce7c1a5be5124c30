//! Version history
//!
//! Listing, pruning and protection of content versions. The current
//! version and a document's published version can never be deleted.

use crate::chunk::{in_groups, int_values, placeholders};
use crate::error::{Result, StoreError};
use crate::models::version::ContentVersion;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const VERSION_COLUMNS: &str = "cv.id, cv.node_id, cv.version_date, cv.user_id, cv.current, cv.text, \
     cv.prevent_cleanup, IFNULL(dv.published, 0), dv.template_id";

fn read_version(row: &Row<'_>) -> rusqlite::Result<ContentVersion> {
    Ok(ContentVersion {
        id: row.get(0)?,
        node_id: row.get(1)?,
        version_date: row.get(2)?,
        user_id: row.get(3)?,
        current: row.get(4)?,
        text: row.get(5)?,
        prevent_cleanup: row.get(6)?,
        published: row.get(7)?,
        template_id: row.get(8)?,
    })
}

/// All versions of a node, newest first.
pub fn versions(conn: &Connection, node_id: i32) -> Result<Vec<ContentVersion>> {
    let sql = format!(
        "SELECT {} FROM content_version cv LEFT JOIN document_version dv ON dv.id = cv.id \
         WHERE cv.node_id = ?1 ORDER BY cv.version_date DESC, cv.id DESC",
        VERSION_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let versions = stmt
        .query_map(params![node_id], read_version)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(versions)
}

pub fn get_version(conn: &Connection, version_id: i32) -> Result<Option<ContentVersion>> {
    let sql = format!(
        "SELECT {} FROM content_version cv LEFT JOIN document_version dv ON dv.id = cv.id WHERE cv.id = ?1",
        VERSION_COLUMNS
    );
    Ok(conn.query_row(&sql, params![version_id], read_version).optional()?)
}

pub fn set_prevent_cleanup(conn: &Connection, version_id: i32, prevent: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE content_version SET prevent_cleanup = ?2 WHERE id = ?1",
        params![version_id, prevent],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("Version", version_id));
    }
    Ok(())
}

/// Versions history pruning may remove: per node, everything beyond the
/// `keep_latest` newest versions, excluding current, published and
/// protected ones.
pub fn cleanup_candidates(conn: &Connection, keep_latest: usize) -> Result<Vec<ContentVersion>> {
    let sql = format!(
        "SELECT {} FROM (\
            SELECT cv.*, ROW_NUMBER() OVER (PARTITION BY cv.node_id ORDER BY cv.version_date DESC, cv.id DESC) AS rn \
            FROM content_version cv\
         ) cv LEFT JOIN document_version dv ON dv.id = cv.id \
         WHERE cv.rn > ?1 AND cv.current = 0 AND cv.prevent_cleanup = 0 AND IFNULL(dv.published, 0) = 0 \
         ORDER BY cv.node_id, cv.version_date, cv.id",
        VERSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let candidates = stmt
        .query_map(params![keep_latest as i64], read_version)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    tracing::debug!("{} version(s) eligible for cleanup", candidates.len());
    Ok(candidates)
}

/// Delete one version with its property rows and culture names.
pub fn delete_version(conn: &Connection, version_id: i32) -> Result<()> {
    let version = get_version(conn, version_id)?.ok_or_else(|| StoreError::not_found("Version", version_id))?;
    if version.current {
        return Err(StoreError::InvariantViolation(format!(
            "version {} is the current version of node {}",
            version_id, version.node_id
        )));
    }
    if version.published {
        return Err(StoreError::InvariantViolation(format!(
            "version {} is the published version of node {}",
            version_id, version.node_id
        )));
    }
    for sql in [
        "DELETE FROM property_data WHERE version_id = ?1",
        "DELETE FROM content_version_culture_variation WHERE version_id = ?1",
        "DELETE FROM document_version WHERE id = ?1",
        "DELETE FROM media_version WHERE id = ?1",
        "DELETE FROM content_version WHERE id = ?1",
    ] {
        conn.execute(sql, params![version_id])?;
    }
    Ok(())
}

/// Delete the given versions, skipping ones that must be kept. Returns
/// the ids actually deleted.
pub fn delete_versions(conn: &Connection, version_ids: &[i32], max_parameters: usize) -> Result<Vec<i32>> {
    let mut deletable = Vec::with_capacity(version_ids.len());
    for group in in_groups(version_ids, max_parameters, 0) {
        let sql = format!(
            "SELECT cv.id FROM content_version cv LEFT JOIN document_version dv ON dv.id = cv.id \
             WHERE cv.id IN ({}) AND cv.current = 0 AND IFNULL(dv.published, 0) = 0",
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(int_values(group)), |r| r.get::<_, i32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        deletable.extend(ids);
    }
    for id in &deletable {
        delete_version(conn, *id)?;
    }
    if deletable.len() < version_ids.len() {
        tracing::warn!(
            "Kept {} current or published version(s) out of {} requested",
            version_ids.len() - deletable.len(),
            version_ids.len()
        );
    }
    Ok(deletable)
}

/// Delete a node's versions older than `before`, except current, published
/// and protected ones. Returns how many were deleted.
pub fn delete_versions_before(conn: &Connection, node_id: i32, before: DateTime<Utc>) -> Result<usize> {
    let ids: Vec<i32> = {
        let mut stmt = conn.prepare_cached(
            "SELECT cv.id FROM content_version cv LEFT JOIN document_version dv ON dv.id = cv.id \
             WHERE cv.node_id = ?1 AND cv.version_date < ?2 AND cv.current = 0 \
             AND cv.prevent_cleanup = 0 AND IFNULL(dv.published, 0) = 0",
        )?;
        stmt.query_map(params![node_id, before], |r| r.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    for id in &ids {
        delete_version(conn, *id)?;
    }
    tracing::info!("Deleted {} version(s) of node {}", ids.len(), node_id);
    Ok(ids.len())
}

/// Delete every cleanup candidate. Returns how many were deleted.
pub fn cleanup_versions(conn: &Connection, keep_latest: usize) -> Result<usize> {
    let candidates = cleanup_candidates(conn, keep_latest)?;
    for version in &candidates {
        delete_version(conn, version.id)?;
    }
    tracing::info!("Cleaned up {} version(s)", candidates.len());
    Ok(candidates.len())
}
