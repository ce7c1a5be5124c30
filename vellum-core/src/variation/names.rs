//! Moving content names between node text and default-language name rows

use crate::chunk::{ensure_within_limit, int_values, placeholders};
use crate::error::Result;
use crate::variation::impact::CultureTransition;
use crate::variation::property_data::versions_of_types;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

fn with_language(default_language_id: i32, content_type_ids: &[i32]) -> Vec<SqlValue> {
    let mut params = vec![SqlValue::Integer(default_language_id as i64)];
    params.extend(int_values(content_type_ids));
    params
}

/// Move names of content of `content_type_ids` when the types' own culture
/// flag changes.
///
/// Enabling writes a default-language name for every version (from the
/// version text) and a node-level culture record for every document.
/// Disabling copies the default-language names back into node and version
/// text and deletes all culture name records.
pub fn copy_names(
    conn: &Connection,
    transition: CultureTransition,
    default_language_id: i32,
    content_type_ids: &[i32],
    max_parameters: usize,
) -> Result<()> {
    if content_type_ids.is_empty() {
        return Ok(());
    }
    ensure_within_limit(1 + content_type_ids.len(), max_parameters, "name copy")?;
    let cts = placeholders(content_type_ids.len());
    let versions = versions_of_types(content_type_ids);
    let nodes = format!("(SELECT node_id FROM content WHERE content_type_id IN ({}))", cts);
    let scope = || params_from_iter(int_values(content_type_ids));
    let scoped = || params_from_iter(with_language(default_language_id, content_type_ids));

    match transition {
        CultureTransition::Enabled => {
            conn.execute(
                &format!(
                    "DELETE FROM content_version_culture_variation WHERE language_id = ? AND {}",
                    versions
                ),
                scoped(),
            )?;
            let version_names = conn.execute(
                &format!(
                    "INSERT INTO content_version_culture_variation (version_id, language_id, name, date, user_id) \
                     SELECT cv.id, ?, COALESCE(cv.text, n.text, ''), cv.version_date, cv.user_id \
                     FROM content_version cv JOIN node n ON n.id = cv.node_id \
                     JOIN content c ON c.node_id = cv.node_id WHERE c.content_type_id IN ({})",
                    cts
                ),
                scoped(),
            )?;
            conn.execute(
                &format!(
                    "DELETE FROM document_culture_variation WHERE language_id = ? AND node_id IN {}",
                    nodes
                ),
                scoped(),
            )?;
            let node_names = conn.execute(
                &format!(
                    "INSERT INTO document_culture_variation (node_id, language_id, edited, available, published, name) \
                     SELECT d.node_id, ?, d.edited, 1, d.published, n.text \
                     FROM document d JOIN node n ON n.id = d.node_id \
                     JOIN content c ON c.node_id = d.node_id WHERE c.content_type_id IN ({})",
                    cts
                ),
                scoped(),
            )?;
            tracing::info!(
                "Names moved to culture rows: {} version name(s), {} document record(s)",
                version_names,
                node_names
            );
        }
        CultureTransition::Disabled => {
            let node_names = conn.execute(
                &format!(
                    "UPDATE node SET text = ( \
                         SELECT cvcv.name FROM content_version cv \
                         JOIN content_version_culture_variation cvcv ON cvcv.version_id = cv.id \
                         WHERE cv.node_id = node.id AND cv.current = 1 AND cvcv.language_id = ?1) \
                     WHERE id IN (SELECT node_id FROM content WHERE content_type_id IN ({})) \
                     AND EXISTS (SELECT 1 FROM content_version cv \
                         JOIN content_version_culture_variation cvcv ON cvcv.version_id = cv.id \
                         WHERE cv.node_id = node.id AND cv.current = 1 AND cvcv.language_id = ?1)",
                    numbered(2, content_type_ids.len())
                ),
                scoped(),
            )?;
            let version_names = conn.execute(
                &format!(
                    "UPDATE content_version SET text = ( \
                         SELECT name FROM content_version_culture_variation \
                         WHERE version_id = content_version.id AND language_id = ?1) \
                     WHERE node_id IN (SELECT node_id FROM content WHERE content_type_id IN ({})) \
                     AND EXISTS (SELECT 1 FROM content_version_culture_variation \
                         WHERE version_id = content_version.id AND language_id = ?1)",
                    numbered(2, content_type_ids.len())
                ),
                scoped(),
            )?;
            conn.execute(
                &format!("DELETE FROM content_version_culture_variation WHERE {}", versions),
                scope(),
            )?;
            conn.execute(
                &format!("DELETE FROM document_culture_variation WHERE node_id IN {}", nodes),
                scope(),
            )?;
            tracing::info!(
                "Names moved to invariant text: {} node(s), {} version(s)",
                node_names,
                version_names
            );
        }
    }
    Ok(())
}

/// `?2, ?3, ...` numbered placeholders, for statements that reuse `?1`.
fn numbered(start: usize, n: usize) -> String {
    (start..start + n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}
