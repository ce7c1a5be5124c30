//! Moving tag relationships between the invariant and default-language tag
//! namespaces

use crate::chunk::{ensure_within_limit, int_values, placeholders};
use crate::error::Result;
use crate::variation::impact::CultureTransition;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

/// Re-point tag relationships of `property_type_ids` on content of
/// `content_type_ids` to the tags of the target namespace, creating missing
/// tags (matched by text, group and language).
///
/// Enabling keeps the invariant relationships. Disabling removes the
/// relationships to culture tags afterwards.
pub fn copy_tag_data(
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
        2 + property_type_ids.len() + content_type_ids.len(),
        max_parameters,
        "tag copy",
    )?;
    let pts = placeholders(property_type_ids.len());
    let cts = placeholders(content_type_ids.len());
    let (source_lang, target_lang, target_match) = match transition {
        CultureTransition::Enabled => ("t.language_id IS NULL", "?", "x.language_id = ?"),
        CultureTransition::Disabled => ("t.language_id = ?", "NULL", "x.language_id IS NULL"),
    };
    let lang = SqlValue::Integer(default_language_id as i64);
    let mut scope = int_values(property_type_ids);
    scope.extend(int_values(content_type_ids));

    let create_tags = format!(
        "INSERT INTO tag (tag, tag_group, language_id) \
         SELECT DISTINCT t.tag, t.tag_group, {target_lang} FROM tag t \
         JOIN tag_relationship tr ON tr.tag_id = t.id \
         JOIN content c ON c.node_id = tr.node_id \
         LEFT JOIN tag x ON x.tag = t.tag AND x.tag_group = t.tag_group AND {target_match} \
         WHERE {source_lang} AND tr.property_type_id IN ({pts}) AND c.content_type_id IN ({cts}) AND x.id IS NULL",
    );
    let mut params = match transition {
        // target language in SELECT list, then in the LEFT JOIN
        CultureTransition::Enabled => vec![lang.clone(), lang.clone()],
        // source language in WHERE
        CultureTransition::Disabled => vec![lang.clone()],
    };
    params.extend(scope.iter().cloned());
    let created = conn.execute(&create_tags, params_from_iter(params))?;

    let relate = format!(
        "INSERT OR IGNORE INTO tag_relationship (node_id, tag_id, property_type_id) \
         SELECT tr.node_id, x.id, tr.property_type_id FROM tag_relationship tr \
         JOIN tag t ON t.id = tr.tag_id \
         JOIN content c ON c.node_id = tr.node_id \
         JOIN tag x ON x.tag = t.tag AND x.tag_group = t.tag_group AND {target_match} \
         WHERE {source_lang} AND tr.property_type_id IN ({pts}) AND c.content_type_id IN ({cts})",
    );
    // the language is bound once, in the join when enabling and in the
    // WHERE clause when disabling
    let mut params = vec![lang];
    params.extend(scope.iter().cloned());
    let related = conn.execute(&relate, params_from_iter(params))?;

    if transition == CultureTransition::Disabled {
        let drop = format!(
            "DELETE FROM tag_relationship WHERE property_type_id IN ({pts}) \
             AND node_id IN (SELECT node_id FROM content WHERE content_type_id IN ({cts})) \
             AND tag_id IN (SELECT id FROM tag WHERE language_id IS NOT NULL)",
        );
        conn.execute(&drop, params_from_iter(scope.iter().cloned()))?;
    }
    tracing::info!(
        "Tags {:?}: {} tag(s) created, {} relationship(s) copied",
        transition,
        created,
        related
    );
    Ok(related)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::database::Database;

    fn fixture(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO node (id, unique_id, parent_id, level, path, sort_order, node_object_type, create_date) VALUES
                (10, 'k10', -1, 1, '-1,10', 0, 't', '2024-01-01T00:00:00Z'),
                (11, 'k11', -1, 1, '-1,11', 0, 'd', '2024-01-01T00:00:00Z'),
                (12, 'k12', -1, 1, '-1,12', 1, 'd', '2024-01-01T00:00:00Z');
             INSERT INTO content_type (node_id, alias) VALUES (10, 't');
             INSERT INTO property_type (id, unique_id, content_type_id, alias, name, editor_alias, value_storage, tag_group)
                VALUES (5, 'p5', 10, 'tags', 'Tags', 'tags', 'ntext', 'default');
             INSERT INTO content (node_id, content_type_id) VALUES (11, 10), (12, 10);
             INSERT INTO tag (id, tag, tag_group, language_id) VALUES (1, 'red', 'default', NULL), (2, 'blue', 'default', NULL);
             INSERT INTO tag_relationship (node_id, tag_id, property_type_id) VALUES (11, 1, 5), (12, 1, 5), (12, 2, 5);",
        )
        .unwrap();
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_enable_creates_culture_tags_once() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        fixture(conn);
        let related = copy_tag_data(conn, CultureTransition::Enabled, 1, &[5], &[10], 100).unwrap();
        assert_eq!(related, 3);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM tag WHERE language_id = 1"), 2);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM tag_relationship"), 6);
        copy_tag_data(conn, CultureTransition::Enabled, 1, &[5], &[10], 100).unwrap();
        assert_eq!(count(conn, "SELECT COUNT(*) FROM tag WHERE language_id = 1"), 2);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM tag_relationship"), 6);
    }

    #[test]
    fn test_disable_moves_back_to_invariant() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        fixture(conn);
        copy_tag_data(conn, CultureTransition::Enabled, 1, &[5], &[10], 100).unwrap();
        conn.execute("DELETE FROM tag_relationship WHERE tag_id IN (1, 2)", []).unwrap();
        conn.execute("DELETE FROM tag WHERE id IN (1, 2)", []).unwrap();

        copy_tag_data(conn, CultureTransition::Disabled, 1, &[5], &[10], 100).unwrap();
        assert_eq!(count(conn, "SELECT COUNT(*) FROM tag WHERE language_id IS NULL"), 2);
        assert_eq!(
            count(
                conn,
                "SELECT COUNT(*) FROM tag_relationship tr JOIN tag t ON t.id = tr.tag_id WHERE t.language_id IS NOT NULL"
            ),
            0
        );
        assert_eq!(count(conn, "SELECT COUNT(*) FROM tag_relationship"), 3);
    }
}
