//! Recomputing the per-culture and per-document `edited` flags
//!
//! Current and published property rows are streamed together, ordered so
//! the published row of a (node, property type, language, segment) key
//! arrives right before the current row of the same key. Each current row
//! is classified against its published counterpart and the verdicts are
//! OR-ed per (node, language) and per node.

use crate::chunk::{ensure_within_limit, in_groups, int_values, placeholders};
use crate::error::Result;
use crate::models::property::ValueColumns;
use crate::models::variation::ContentVariation;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// What to recompute.
#[derive(Debug, Clone, Default)]
pub struct EditedScope {
    pub content_type_ids: Vec<i32>,
    /// Restrict to these property types; empty means all.
    pub property_type_ids: Vec<i32>,
    /// Restrict to one document.
    pub node_id: Option<i32>,
}

/// Outcome of a recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditedSummary {
    pub documents: usize,
    pub edited_documents: usize,
    pub culture_records_updated: usize,
    /// (node, language) verdicts without a culture record to hold them.
    pub missing_culture_records: usize,
}

struct StreamRow {
    node_id: i32,
    property_type_id: i32,
    language_id: Option<i32>,
    segment: Option<String>,
    current: bool,
    published: bool,
    variations: ContentVariation,
    type_varies_by_culture: bool,
    columns: ValueColumns,
}

impl StreamRow {
    fn same_key(&self, other: &StreamRow) -> bool {
        self.node_id == other.node_id
            && self.property_type_id == other.property_type_id
            && self.language_id == other.language_id
            && self.segment == other.segment
    }

    /// Row shape disagrees with the property's variation.
    fn structural_mismatch(&self) -> bool {
        self.language_id.is_some() != self.variations.varies_by_culture()
    }

    /// Language the verdict counts against. Invariant values of
    /// culture-variant documents count against the default language.
    fn attributed_language(&self, default_language_id: i32) -> Option<i32> {
        match self.language_id {
            Some(id) => Some(id),
            None if self.type_varies_by_culture => Some(default_language_id),
            None => None,
        }
    }
}

#[derive(Default)]
struct Verdicts {
    by_culture: HashMap<(i32, i32), bool>,
    by_node: HashMap<i32, bool>,
}

impl Verdicts {
    fn record(&mut self, row: &StreamRow, edited: bool, default_language_id: i32) {
        let node = self.by_node.entry(row.node_id).or_insert(false);
        *node |= edited;
        if let Some(language_id) = row.attributed_language(default_language_id) {
            let culture = self.by_culture.entry((row.node_id, language_id)).or_insert(false);
            *culture |= edited;
        }
    }
}

fn stream_sql(scope: &EditedScope) -> (String, Vec<SqlValue>) {
    let mut sql = format!(
        "SELECT cv.node_id, pd.property_type_id, pd.language_id, pd.segment, cv.current, dv.published, \
         ct.variations & pt.variations, ct.variations, \
         pd.int_value, pd.decimal_value, pd.date_value, pd.varchar_value, pd.text_value \
         FROM property_data pd \
         JOIN content_version cv ON cv.id = pd.version_id \
         JOIN document_version dv ON dv.id = cv.id \
         JOIN property_type pt ON pt.id = pd.property_type_id \
         JOIN content c ON c.node_id = cv.node_id \
         JOIN content_type ct ON ct.node_id = c.content_type_id \
         WHERE (cv.current = 1 OR dv.published = 1) AND c.content_type_id IN ({})",
        placeholders(scope.content_type_ids.len())
    );
    let mut params = int_values(&scope.content_type_ids);
    if !scope.property_type_ids.is_empty() {
        sql.push_str(&format!(
            " AND pd.property_type_id IN ({})",
            placeholders(scope.property_type_ids.len())
        ));
        params.extend(int_values(&scope.property_type_ids));
    }
    if let Some(node_id) = scope.node_id {
        sql.push_str(" AND cv.node_id = ?");
        params.push(SqlValue::Integer(node_id as i64));
    }
    // published (current = 0) sorts before current for the same key
    sql.push_str(
        " ORDER BY cv.node_id, pd.property_type_id, IFNULL(pd.language_id, 0), IFNULL(pd.segment, ''), cv.current",
    );
    (sql, params)
}

/// Recompute edited flags for every document in `scope`.
pub fn renormalize_edited(
    conn: &Connection,
    scope: &EditedScope,
    default_language_id: i32,
    max_parameters: usize,
) -> Result<EditedSummary> {
    if scope.content_type_ids.is_empty() {
        return Ok(EditedSummary::default());
    }
    ensure_within_limit(
        scope.content_type_ids.len() + scope.property_type_ids.len() + 1,
        max_parameters,
        "edited recomputation",
    )?;

    let verdicts = classify(conn, scope, default_language_id)?;
    let documents = documents_in_scope(conn, scope)?;

    let mut summary = EditedSummary {
        documents: documents.len(),
        ..EditedSummary::default()
    };

    // culture records
    let records = culture_records(conn, &documents, max_parameters)?;
    let mut by_value: BTreeMap<bool, Vec<i32>> = BTreeMap::new();
    for ((node_id, language_id), edited) in &verdicts.by_culture {
        match records.get(&(*node_id, *language_id)) {
            Some(record) => by_value.entry(*edited).or_default().push(record.id),
            None => {
                tracing::warn!(
                    "No culture record for node {} language {}; edited flag not stored",
                    node_id,
                    language_id
                );
                summary.missing_culture_records += 1;
            }
        }
    }
    // records no current or published value speaks for
    for (key, record) in &records {
        if !verdicts.by_culture.contains_key(key) {
            by_value.entry(!record.published).or_default().push(record.id);
        }
    }
    for (edited, ids) in &by_value {
        for group in in_groups(ids, max_parameters, 1) {
            let sql = format!(
                "UPDATE document_culture_variation SET edited = ? WHERE id IN ({})",
                placeholders(group.len())
            );
            let mut params = vec![SqlValue::Integer(*edited as i64)];
            params.extend(int_values(group));
            summary.culture_records_updated += conn.execute(&sql, params_from_iter(params))?;
        }
    }

    // documents
    let mut node_culture_edited: HashMap<i32, bool> = HashMap::new();
    for ((node_id, _), edited) in &verdicts.by_culture {
        *node_culture_edited.entry(*node_id).or_insert(false) |= *edited;
    }
    let mut by_value: BTreeMap<bool, Vec<i32>> = BTreeMap::new();
    for (node_id, published) in &documents {
        let edited = !published
            || verdicts.by_node.get(node_id).copied().unwrap_or(false)
            || node_culture_edited.get(node_id).copied().unwrap_or(false);
        if edited {
            summary.edited_documents += 1;
        }
        by_value.entry(edited).or_default().push(*node_id);
    }
    for (edited, ids) in &by_value {
        for group in in_groups(ids, max_parameters, 1) {
            let sql = format!(
                "UPDATE document SET edited = ? WHERE node_id IN ({})",
                placeholders(group.len())
            );
            let mut params = vec![SqlValue::Integer(*edited as i64)];
            params.extend(int_values(group));
            conn.execute(&sql, params_from_iter(params))?;
        }
    }
    tracing::info!(
        "Edited flags recomputed: {} document(s), {} edited, {} culture record(s)",
        summary.documents,
        summary.edited_documents,
        summary.culture_records_updated
    );
    Ok(summary)
}

fn classify(conn: &Connection, scope: &EditedScope, default_language_id: i32) -> Result<Verdicts> {
    let (sql, params) = stream_sql(scope);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut verdicts = Verdicts::default();
    let mut published: Option<StreamRow> = None;
    let mut published_matched = false;

    while let Some(r) = rows.next()? {
        let row = StreamRow {
            node_id: r.get(0)?,
            property_type_id: r.get(1)?,
            language_id: r.get(2)?,
            segment: r.get(3)?,
            current: r.get(4)?,
            published: r.get(5)?,
            variations: ContentVariation::from_bits(r.get(6)?),
            type_varies_by_culture: ContentVariation::from_bits(r.get(7)?).varies_by_culture(),
            columns: ValueColumns {
                int_value: r.get(8)?,
                decimal_value: r.get(9)?,
                date_value: r.get(10)?,
                varchar_value: r.get(11)?,
                text_value: r.get(12)?,
            },
        };

        if let Some(prev) = &published {
            if !prev.same_key(&row) {
                close_published(&mut verdicts, prev, published_matched, default_language_id);
                published = None;
            }
        }

        if !row.current {
            if row.published {
                published = Some(row);
                published_matched = false;
            }
            continue;
        }

        let edited = if row.structural_mismatch() || row.published {
            false
        } else {
            match &published {
                None => true,
                Some(p) => {
                    published_matched = true;
                    p.columns != row.columns
                }
            }
        };
        verdicts.record(&row, edited, default_language_id);
    }
    if let Some(prev) = &published {
        close_published(&mut verdicts, prev, published_matched, default_language_id);
    }
    Ok(verdicts)
}

/// A published value with no current counterpart was cleared in the draft.
fn close_published(verdicts: &mut Verdicts, row: &StreamRow, matched: bool, default_language_id: i32) {
    if !matched && !row.structural_mismatch() {
        verdicts.record(row, true, default_language_id);
    }
}

fn documents_in_scope(conn: &Connection, scope: &EditedScope) -> Result<Vec<(i32, bool)>> {
    let mut sql = format!(
        "SELECT d.node_id, d.published FROM document d JOIN content c ON c.node_id = d.node_id \
         WHERE c.content_type_id IN ({})",
        placeholders(scope.content_type_ids.len())
    );
    let mut params = int_values(&scope.content_type_ids);
    if let Some(node_id) = scope.node_id {
        sql.push_str(" AND d.node_id = ?");
        params.push(SqlValue::Integer(node_id as i64));
    }
    sql.push_str(" ORDER BY d.node_id");
    let mut stmt = conn.prepare(&sql)?;
    let docs = stmt
        .query_map(params_from_iter(params), |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(docs)
}

struct CultureRecord {
    id: i32,
    published: bool,
}

fn culture_records(
    conn: &Connection,
    documents: &[(i32, bool)],
    max_parameters: usize,
) -> Result<HashMap<(i32, i32), CultureRecord>> {
    let ids: Vec<i32> = documents.iter().map(|(id, _)| *id).collect();
    let mut records = HashMap::new();
    for group in in_groups(&ids, max_parameters, 0) {
        let sql = format!(
            "SELECT id, node_id, language_id, published FROM document_culture_variation WHERE node_id IN ({})",
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(int_values(group)))?;
        while let Some(r) = rows.next()? {
            records.insert(
                (r.get(1)?, r.get(2)?),
                CultureRecord {
                    id: r.get(0)?,
                    published: r.get(3)?,
                },
            );
        }
    }
    Ok(records)
}
