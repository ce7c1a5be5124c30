//! Tag store: binds tags to (node, property type)

use crate::error::Result;
use crate::models::{Tag, TagSpec};
use rusqlite::{params, Connection};

/// Find or create a tag and return its id.
pub fn ensure_tag(conn: &Connection, spec: &TagSpec) -> Result<i32> {
    conn.execute(
        "INSERT OR IGNORE INTO tag (tag, tag_group, language_id) VALUES (?1, ?2, ?3)",
        params![spec.text, spec.group, spec.language_id],
    )?;
    let id = conn.query_row(
        "SELECT id FROM tag WHERE tag = ?1 AND tag_group = ?2 AND IFNULL(language_id, 0) = IFNULL(?3, 0)",
        params![spec.text, spec.group, spec.language_id],
        |r| r.get(0),
    )?;
    Ok(id)
}

/// Assign tags to a node property. With `replace`, existing tags of the
/// property are removed first.
pub fn assign(conn: &Connection, node_id: i32, property_type_id: i32, tags: &[TagSpec], replace: bool) -> Result<()> {
    if replace {
        remove(conn, node_id, property_type_id)?;
    }
    for spec in tags {
        let tag_id = ensure_tag(conn, spec)?;
        conn.execute(
            "INSERT OR IGNORE INTO tag_relationship (node_id, tag_id, property_type_id) VALUES (?1, ?2, ?3)",
            params![node_id, tag_id, property_type_id],
        )?;
    }
    Ok(())
}

/// Remove every tag of a node property.
pub fn remove(conn: &Connection, node_id: i32, property_type_id: i32) -> Result<()> {
    conn.execute(
        "DELETE FROM tag_relationship WHERE node_id = ?1 AND property_type_id = ?2",
        params![node_id, property_type_id],
    )?;
    Ok(())
}

/// Remove every tag of a node.
pub fn remove_all(conn: &Connection, node_id: i32) -> Result<()> {
    conn.execute("DELETE FROM tag_relationship WHERE node_id = ?1", params![node_id])?;
    Ok(())
}

/// Tags bound to a node, optionally restricted to one property type.
pub fn tags_for_node(conn: &Connection, node_id: i32, property_type_id: Option<i32>) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.id, t.tag, t.tag_group, t.language_id FROM tag t \
         INNER JOIN tag_relationship r ON r.tag_id = t.id \
         WHERE r.node_id = ?1 AND (?2 IS NULL OR r.property_type_id = ?2) \
         ORDER BY t.tag_group, t.tag, t.language_id",
    )?;
    let tags = stmt
        .query_map(params![node_id, property_type_id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                text: row.get(1)?,
                group: row.get(2)?,
                language_id: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::database::Database;

    fn fixture(conn: &Connection) -> (i32, i32) {
        conn.execute_batch(
            "INSERT INTO node (id, unique_id, parent_id, level, path, sort_order, node_object_type, create_date) \
             VALUES (10, 'a', -1, 1, '-1,10', 0, 'x', '2024-01-01'); \
             INSERT INTO node (id, unique_id, parent_id, level, path, sort_order, node_object_type, create_date) \
             VALUES (11, 'b', -1, 1, '-1,11', 1, 'x', '2024-01-01'); \
             INSERT INTO content_type (node_id, alias) VALUES (10, 'ct'); \
             INSERT INTO property_type (id, unique_id, content_type_id, alias, name, editor_alias, value_storage) \
             VALUES (5, 'pt', 10, 'tags', 'Tags', 'tags', 'ntext');",
        )
        .unwrap();
        (11, 5)
    }

    #[test]
    fn test_assign_and_replace() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (node, pt) = fixture(conn);
        assign(conn, node, pt, &[TagSpec::new("rust", "default", None), TagSpec::new("cms", "default", None)], true).unwrap();
        assert_eq!(tags_for_node(conn, node, None).unwrap().len(), 2);
        assign(conn, node, pt, &[TagSpec::new("rust", "default", None)], true).unwrap();
        let tags = tags_for_node(conn, node, Some(pt)).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].text, "rust");
    }

    #[test]
    fn test_tags_are_language_scoped() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        fixture(conn);
        let invariant = ensure_tag(conn, &TagSpec::new("rust", "default", None)).unwrap();
        let english = ensure_tag(conn, &TagSpec::new("rust", "default", Some(1))).unwrap();
        assert_ne!(invariant, english);
        assert_eq!(ensure_tag(conn, &TagSpec::new("rust", "default", None)).unwrap(), invariant);
    }
}
