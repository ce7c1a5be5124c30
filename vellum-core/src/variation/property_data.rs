//! Moving property values between invariant and default-language rows

use crate::chunk::{ensure_within_limit, int_values, placeholders};
use crate::error::Result;
use crate::variation::impact::CultureTransition;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

const VALUE_COLUMNS: &str = "int_value, decimal_value, date_value, varchar_value, text_value";

/// `version_id IN (...)` restricted to content of the given types.
pub(crate) fn versions_of_types(content_type_ids: &[i32]) -> String {
    format!(
        "version_id IN (SELECT cv.id FROM content_version cv JOIN content c ON c.node_id = cv.node_id \
         WHERE c.content_type_id IN ({}))",
        placeholders(content_type_ids.len())
    )
}

fn scoped_params(lead: Option<i32>, property_type_ids: &[i32], content_type_ids: &[i32]) -> Vec<SqlValue> {
    let mut params = Vec::with_capacity(1 + property_type_ids.len() + content_type_ids.len());
    if let Some(lead) = lead {
        params.push(SqlValue::Integer(lead as i64));
    }
    params.extend(int_values(property_type_ids));
    params.extend(int_values(content_type_ids));
    params
}

/// Copy values of `property_type_ids` on content of `content_type_ids`
/// between invariant rows and rows of `default_language_id`.
///
/// Enabling copies invariant rows to the default language and keeps the
/// invariant rows. Disabling copies default-language rows back to
/// invariant and then deletes every culture row of those properties.
pub fn copy_property_data(
    conn: &Connection,
    transition: CultureTransition,
    default_language_id: i32,
    property_type_ids: &[i32],
    content_type_ids: &[i32],
    max_parameters: usize,
) -> Result<usize> {
    if property_type_ids.is_empty() || content_type_ids.is_empty() {
        return Ok(0);
    }
    ensure_within_limit(
        1 + property_type_ids.len() + content_type_ids.len(),
        max_parameters,
        "property data copy",
    )?;
    let pts = placeholders(property_type_ids.len());
    let versions = versions_of_types(content_type_ids);
    let (target_filter, target_lead, source_filter, target_language) = match transition {
        CultureTransition::Enabled => ("language_id = ?", Some(default_language_id), "language_id IS NULL", "?"),
        CultureTransition::Disabled => ("language_id IS NULL", None, "language_id = ?", "NULL"),
    };

    // clear whatever the target key space holds so the copy cannot collide
    let sql = format!(
        "DELETE FROM property_data WHERE {} AND property_type_id IN ({}) AND {}",
        target_filter, pts, versions
    );
    conn.execute(&sql, params_from_iter(scoped_params(target_lead, property_type_ids, content_type_ids)))?;

    let sql = format!(
        "INSERT INTO property_data (version_id, property_type_id, language_id, segment, {cols}) \
         SELECT version_id, property_type_id, {lang}, segment, {cols} FROM property_data \
         WHERE {src} AND property_type_id IN ({pts}) AND {versions}",
        cols = VALUE_COLUMNS,
        lang = target_language,
        src = source_filter,
        pts = pts,
        versions = versions,
    );
    // the language id appears once either way: in the SELECT list when
    // enabling, in the WHERE clause when disabling
    let copied = conn.execute(
        &sql,
        params_from_iter(scoped_params(Some(default_language_id), property_type_ids, content_type_ids)),
    )?;

    if transition == CultureTransition::Disabled {
        let sql = format!(
            "DELETE FROM property_data WHERE language_id IS NOT NULL AND property_type_id IN ({}) AND {}",
            pts, versions
        );
        let removed = conn.execute(&sql, params_from_iter(scoped_params(None, property_type_ids, content_type_ids)))?;
        tracing::debug!("Removed {} culture property rows", removed);
    }
    tracing::info!(
        "Copied {} property rows ({:?}) for {} property type(s)",
        copied,
        transition,
        property_type_ids.len()
    );
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::database::Database;
    use rusqlite::params;

    fn fixture(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO language (id, iso_code, culture_name) VALUES (2, 'da-DK', 'Danish');
             INSERT INTO node (id, unique_id, parent_id, level, path, sort_order, node_object_type, create_date) VALUES
                (10, 'k10', -1, 1, '-1,10', 0, 't', '2024-01-01T00:00:00Z'),
                (11, 'k11', -1, 1, '-1,11', 0, 'd', '2024-01-01T00:00:00Z');
             INSERT INTO content_type (node_id, alias) VALUES (10, 't');
             INSERT INTO property_type (id, unique_id, content_type_id, alias, name, editor_alias, value_storage)
                VALUES (5, 'p5', 10, 'title', 'Title', 'textbox', 'nvarchar');
             INSERT INTO content (node_id, content_type_id) VALUES (11, 10);
             INSERT INTO content_version (id, node_id, version_date, current) VALUES (1, 11, '2024-01-01T00:00:00Z', 1);
             INSERT INTO property_data (version_id, property_type_id, language_id, varchar_value) VALUES (1, 5, NULL, 'inv');",
        )
        .unwrap();
    }

    fn value(conn: &Connection, lang: Option<i32>) -> Option<String> {
        conn.query_row(
            "SELECT varchar_value FROM property_data WHERE version_id = 1 AND IFNULL(language_id, 0) = IFNULL(?1, 0)",
            params![lang],
            |r| r.get(0),
        )
        .ok()
    }

    #[test]
    fn test_enable_keeps_invariant_rows() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        fixture(conn);
        let n = copy_property_data(conn, CultureTransition::Enabled, 1, &[5], &[10], 100).unwrap();
        assert_eq!(n, 1);
        assert_eq!(value(conn, Some(1)).as_deref(), Some("inv"));
        assert_eq!(value(conn, None).as_deref(), Some("inv"));
        // running twice replaces rather than duplicates
        copy_property_data(conn, CultureTransition::Enabled, 1, &[5], &[10], 100).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM property_data", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_disable_copies_back_and_drops_cultures() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        fixture(conn);
        conn.execute_batch(
            "INSERT INTO property_data (version_id, property_type_id, language_id, varchar_value) VALUES
                (1, 5, 1, 'english'), (1, 5, 2, 'dansk');",
        )
        .unwrap();
        copy_property_data(conn, CultureTransition::Disabled, 1, &[5], &[10], 100).unwrap();
        assert_eq!(value(conn, None).as_deref(), Some("english"));
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM property_data", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let err = copy_property_data(db.connection(), CultureTransition::Enabled, 1, &[1, 2, 3], &[4, 5], 3)
            .unwrap_err();
        assert!(matches!(err, crate::error::StoreError::NotSupported(_)));
    }
}
