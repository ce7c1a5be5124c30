//! Raw `property_data` rows: batched loads and per-version replacement

use crate::chunk::{in_groups, int_values, placeholders};
use crate::error::Result;
use crate::models::property::{PropertyCollection, PropertyDataRow, ValueColumns};
use crate::repositories::language::Languages;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;

const ROW_COLUMNS: &str = "pd.id, pd.version_id, pd.property_type_id, pd.language_id, pd.segment, \
     pd.int_value, pd.decimal_value, pd.date_value, pd.varchar_value, pd.text_value";

fn read_row(row: &Row<'_>) -> rusqlite::Result<PropertyDataRow> {
    Ok(PropertyDataRow {
        id: row.get(0)?,
        version_id: row.get(1)?,
        property_type_id: row.get(2)?,
        language_id: row.get(3)?,
        segment: row.get(4)?,
        columns: ValueColumns {
            int_value: row.get(5)?,
            decimal_value: row.get(6)?,
            date_value: row.get(7)?,
            varchar_value: row.get(8)?,
            text_value: row.get(9)?,
        },
    })
}

/// All rows of the given versions, fetched in chunks below the parameter
/// ceiling.
pub fn load_rows(conn: &Connection, version_ids: &[i32], max_parameters: usize) -> Result<Vec<PropertyDataRow>> {
    let mut rows = Vec::new();
    for group in in_groups(version_ids, max_parameters, 0) {
        let sql = format!(
            "SELECT {} FROM property_data pd WHERE pd.version_id IN ({}) \
             ORDER BY pd.version_id, pd.property_type_id, pd.language_id, pd.segment",
            ROW_COLUMNS,
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let chunk = stmt
            .query_map(params_from_iter(int_values(group)), read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.extend(chunk);
    }
    tracing::debug!("Loaded {} property rows for {} versions", rows.len(), version_ids.len());
    Ok(rows)
}

/// Rows to persist for one side (edited or published) of a property
/// collection. Empty values produce no row.
pub fn rows_from_properties(
    properties: &PropertyCollection,
    languages: &Languages,
    published: bool,
) -> Result<Vec<PropertyDataRow>> {
    let mut rows = Vec::new();
    for property in properties.iter() {
        for slot in &property.values {
            let value = if published {
                &slot.published_value
            } else {
                &slot.edited_value
            };
            let Some(value) = value else {
                continue;
            };
            let language_id = match &slot.culture {
                Some(culture) => Some(languages.require_id(culture)?),
                None => None,
            };
            rows.push(PropertyDataRow {
                id: 0,
                version_id: 0,
                property_type_id: property.property_type.id,
                language_id,
                segment: slot.segment.clone(),
                columns: ValueColumns::from_value(value, property.property_type.storage)?,
            });
        }
    }
    Ok(rows)
}

/// Make the rows of `version_id` equal to `rows`.
///
/// The existing row set is read first and diffed: matching keys are updated
/// only when a value changed, new keys inserted, vanished keys deleted. The
/// caller's scope already holds the write lock, so the read cannot race.
pub fn replace_rows(conn: &Connection, version_id: i32, rows: &[PropertyDataRow]) -> Result<()> {
    let existing = {
        let sql = format!("SELECT {} FROM property_data pd WHERE pd.version_id = ?1", ROW_COLUMNS);
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.query_map(params![version_id], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    let mut by_key: HashMap<(i32, Option<i32>, Option<String>), PropertyDataRow> =
        existing.into_iter().map(|r| (r.key(), r)).collect();

    let mut insert = conn.prepare_cached(
        "INSERT INTO property_data (version_id, property_type_id, language_id, segment, \
         int_value, decimal_value, date_value, varchar_value, text_value) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    let mut update = conn.prepare_cached(
        "UPDATE property_data SET int_value = ?2, decimal_value = ?3, date_value = ?4, \
         varchar_value = ?5, text_value = ?6 WHERE id = ?1",
    )?;
    let (mut inserted, mut updated) = (0usize, 0usize);
    for row in rows {
        let c = &row.columns;
        match by_key.remove(&row.key()) {
            Some(old) if old.columns == row.columns => {}
            Some(old) => {
                update.execute(params![
                    old.id,
                    c.int_value,
                    c.decimal_value,
                    c.date_value,
                    c.varchar_value,
                    c.text_value
                ])?;
                updated += 1;
            }
            None => {
                insert.execute(params![
                    version_id,
                    row.property_type_id,
                    row.language_id,
                    row.segment,
                    c.int_value,
                    c.decimal_value,
                    c.date_value,
                    c.varchar_value,
                    c.text_value
                ])?;
                inserted += 1;
            }
        }
    }
    let mut delete = conn.prepare_cached("DELETE FROM property_data WHERE id = ?1")?;
    for stale in by_key.values() {
        delete.execute(params![stale.id])?;
    }
    tracing::debug!(
        "Version {} properties: {} inserted, {} updated, {} deleted",
        version_id,
        inserted,
        updated,
        by_key.len()
    );
    Ok(())
}

/// Remove all rows of the given property types, across every version.
pub fn delete_for_property_types(conn: &Connection, property_type_ids: &[i32], max_parameters: usize) -> Result<()> {
    for group in in_groups(property_type_ids, max_parameters, 0) {
        let sql = format!(
            "DELETE FROM property_data WHERE property_type_id IN ({})",
            placeholders(group.len())
        );
        conn.execute(&sql, params_from_iter(int_values(group)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::database::Database;

    fn fixture(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO node (id, unique_id, parent_id, level, path, sort_order, text, node_object_type, create_date) VALUES
                (10, 'a0000000-0000-0000-0000-000000000010', -1, 1, '-1,10', 0, 't', 'x', '2024-01-01T00:00:00Z'),
                (11, 'a0000000-0000-0000-0000-000000000011', -1, 1, '-1,11', 1, 'd', 'y', '2024-01-01T00:00:00Z');
             INSERT INTO content_type (node_id, alias) VALUES (10, 't');
             INSERT INTO property_type (id, unique_id, content_type_id, alias, name, editor_alias, value_storage)
                VALUES (5, 'p5', 10, 'title', 'Title', 'textbox', 'nvarchar'),
                       (6, 'p6', 10, 'count', 'Count', 'integer', 'integer');
             INSERT INTO content (node_id, content_type_id) VALUES (11, 10);
             INSERT INTO content_version (id, node_id, version_date, current) VALUES
                (1, 11, '2024-01-01T00:00:00Z', 0),
                (2, 11, '2024-01-01T00:00:00Z', 1);",
        )
        .unwrap();
    }

    fn row(pt: i32, lang: Option<i32>, text: &str) -> PropertyDataRow {
        PropertyDataRow {
            id: 0,
            version_id: 0,
            property_type_id: pt,
            language_id: lang,
            segment: None,
            columns: ValueColumns {
                varchar_value: Some(text.to_string()),
                ..ValueColumns::default()
            },
        }
    }

    #[test]
    fn test_replace_diffs_existing_rows() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        fixture(conn);
        replace_rows(conn, 2, &[row(5, None, "a"), row(5, Some(1), "b")]).unwrap();
        let first = load_rows(conn, &[2], 100).unwrap();
        assert_eq!(first.len(), 2);

        replace_rows(conn, 2, &[row(5, None, "a"), row(6, None, "c")]).unwrap();
        let second = load_rows(conn, &[2], 100).unwrap();
        assert_eq!(second.len(), 2);
        // unchanged row kept its id
        let kept = second.iter().find(|r| r.property_type_id == 5).unwrap();
        assert_eq!(kept.id, first.iter().find(|r| r.language_id.is_none()).unwrap().id);
        assert!(second.iter().all(|r| r.language_id.is_none()));
    }

    #[test]
    fn test_chunked_load_and_type_delete() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        fixture(conn);
        replace_rows(conn, 1, &[row(5, None, "old")]).unwrap();
        replace_rows(conn, 2, &[row(5, None, "new"), row(6, None, "x")]).unwrap();
        let rows = load_rows(conn, &[1, 2], 1).unwrap();
        assert_eq!(rows.len(), 3);

        delete_for_property_types(conn, &[6], 10).unwrap();
        assert_eq!(load_rows(conn, &[1, 2], 10).unwrap().len(), 2);
    }
}
