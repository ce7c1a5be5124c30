//! Document persistence
//!
//! Documents carry two versions once published: the current version holds
//! the draft and is updated in place by every save, the published version
//! is a frozen snapshot. Publishing turns the current version into the
//! published snapshot and inserts a fresh current version for subsequent
//! edits, so a live version is never written to again.

use crate::assembler::{assemble, VersionRef};
use crate::chunk::{in_groups, int_values, placeholders};
use crate::error::{Result, StoreError};
use crate::models::content::{Document, PublishedState};
use crate::models::content_type::ContentType;
use crate::models::object_type::{ObjectType, DOCUMENT_RECYCLE_BIN_ID};
use crate::notifications::NotificationKind;
use crate::property_data::{replace_rows, rows_from_properties};
use crate::query::{content_query, fetch_id_page, prepare_page, ContentFilter, Ordering, Page};
use crate::repositories::content_base::{
    create_version, delete_tree, insert_content, load_base_rows, load_version_names, move_content,
    sanitize_names, to_base, touch_version, write_tags, write_version_names, BaseRow,
};
use crate::repositories::language::Languages;
use crate::repositories::{effective_page_size, RepositoryContext};
use crate::tree;
use crate::variation::{renormalize_edited, EditedScope};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Publication columns of one stored document.
struct DocumentState {
    published: bool,
    edited: bool,
    template_id: Option<i32>,
    published_version_id: i32,
    publish_date: Option<DateTime<Utc>>,
    publish_name: Option<String>,
}

#[derive(Default)]
struct CultureState {
    published: BTreeSet<String>,
    edited: BTreeSet<String>,
}

pub struct DocumentRepository {
    ctx: Arc<RepositoryContext>,
}

impl DocumentRepository {
    pub fn new(ctx: Arc<RepositoryContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    pub fn get(&self, conn: &Connection, id: i32) -> Result<Option<Document>> {
        Ok(self.get_many(conn, &[id])?.into_iter().next())
    }

    pub fn require(&self, conn: &Connection, id: i32) -> Result<Document> {
        self.get(conn, id)?.ok_or_else(|| StoreError::not_found("Document", id))
    }

    pub fn get_by_key(&self, conn: &Connection, key: Uuid) -> Result<Option<Document>> {
        match tree::get_node_by_key(conn, key)? {
            Some(node) if node.object_type == ObjectType::Document => self.get(conn, node.id),
            _ => Ok(None),
        }
    }

    /// Documents in the order of `ids`; unknown ids are skipped.
    pub fn get_many(&self, conn: &Connection, ids: &[i32]) -> Result<Vec<Document>> {
        let rows = load_base_rows(conn, ObjectType::Document, ids, self.ctx.config.max_parameter_count)?;
        self.hydrate(conn, rows)
    }

    /// The document as it was at `version_id`: that version's values and
    /// names on the draft side, the live snapshot on the published side.
    pub fn get_version(&self, conn: &Connection, version_id: i32) -> Result<Option<Document>> {
        let version = conn
            .query_row(
                "SELECT cv.node_id, cv.version_date, cv.user_id, cv.text FROM content_version cv \
                 JOIN document_version dv ON dv.id = cv.id WHERE cv.id = ?1",
                params![version_id],
                |r| {
                    Ok((
                        r.get::<_, i32>(0)?,
                        r.get::<_, DateTime<Utc>>(1)?,
                        r.get::<_, Option<i32>>(2)?,
                        r.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((node_id, version_date, user_id, text)) = version else {
            return Ok(None);
        };
        let mut rows = load_base_rows(conn, ObjectType::Document, &[node_id], self.ctx.config.max_parameter_count)?;
        for row in &mut rows {
            row.version_id = version_id;
            row.version_date = version_date;
            row.writer_id = user_id;
            row.node.text = text.clone();
        }
        Ok(self.hydrate(conn, rows)?.into_iter().next())
    }

    /// One page of documents. A zero page size means the configured default.
    pub fn get_page(
        &self,
        conn: &Connection,
        filter: &ContentFilter,
        ordering: &Ordering,
        page_index: u64,
        page_size: u64,
    ) -> Result<Page<Document>> {
        let page_size = effective_page_size(&self.ctx.config, page_size);
        let query = prepare_page(
            content_query(ObjectType::Document),
            filter,
            ordering,
            page_index,
            page_size,
            self.ctx.config.max_parameter_count,
        )?;
        let ids = fetch_id_page(conn, &query, page_index, page_size)?;
        let documents = self.get_many(conn, &ids.items)?;
        Ok(Page {
            items: documents,
            total: ids.total,
            page_index,
            page_size,
        })
    }

    fn hydrate(&self, conn: &Connection, rows: Vec<BaseRow>) -> Result<Vec<Document>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let max = self.ctx.config.max_parameter_count;
        let languages = Languages::load(conn)?;
        let node_ids: Vec<i32> = rows.iter().map(|r| r.node.id).collect();
        let version_ids: Vec<i32> = rows.iter().map(|r| r.version_id).collect();
        let mut states = load_states(conn, &node_ids, max)?;
        let mut cultures = load_culture_states(conn, &node_ids, &languages, max)?;
        let mut names = load_version_names(conn, &version_ids, &languages, max)?;

        let mut types: HashMap<i32, Arc<ContentType>> = HashMap::new();
        let mut refs = Vec::with_capacity(rows.len());
        for row in &rows {
            let content_type = match types.get(&row.content_type_id) {
                Some(ct) => Arc::clone(ct),
                None => {
                    let ct = self.ctx.content_types.require(conn, row.content_type_id)?;
                    types.insert(row.content_type_id, Arc::clone(&ct));
                    ct
                }
            };
            let published_version_id = states.get(&row.node.id).map_or(0, |s| s.published_version_id);
            refs.push(VersionRef {
                node_id: row.node.id,
                draft_version_id: row.version_id,
                published_version_id,
                content_type,
            });
        }
        let mut properties = assemble(conn, &refs, &languages, &self.ctx.config)?;

        let mut documents = Vec::with_capacity(rows.len());
        for (row, item) in rows.iter().zip(refs) {
            let state = states
                .remove(&row.node.id)
                .ok_or_else(|| StoreError::Corrupt(format!("document {} has no document row", row.node.id)))?;
            let culture_state = cultures.remove(&row.node.id).unwrap_or_default();
            let mut content = to_base(row, item.content_type, names.remove(&row.version_id).unwrap_or_default());
            if let Some(props) = properties.remove(&row.node.id) {
                content.properties = props;
            }
            documents.push(Document {
                content,
                published_state: if state.published {
                    PublishedState::Published
                } else {
                    PublishedState::Unpublished
                },
                published_version_id: state.published_version_id,
                publish_date: state.publish_date,
                publish_name: state.publish_name,
                template_id: state.template_id,
                edited: state.edited,
                published_cultures: culture_state.published,
                edited_cultures: culture_state.edited,
            });
        }
        Ok(documents)
    }

    /// Persist a document, applying a pending publish or unpublish.
    ///
    /// The notification is published with the transitional state; the
    /// document's state is resolved afterwards.
    pub fn save(&self, conn: &Connection, document: &mut Document) -> Result<()> {
        let languages = Languages::load(conn)?;
        let max = self.ctx.config.max_parameter_count;
        sanitize_names(conn, ObjectType::Document, &mut document.content, &languages)?;
        document.content.update_date = Utc::now();

        if document.content.has_identity() {
            let current: i32 = conn
                .query_row(
                    "SELECT id FROM content_version WHERE node_id = ?1 AND current = 1",
                    params![document.content.id],
                    |r| r.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::not_found("Current version of document", document.content.id))?;
            document.content.version_id = current;
            tree::update_node_text(conn, document.content.id, document.content.name.as_deref())?;
            touch_version(conn, current, &document.content)?;
            conn.execute(
                "UPDATE document_version SET template_id = ?2 WHERE id = ?1",
                params![current, document.template_id],
            )?;
        } else {
            insert_content(conn, ObjectType::Document, &mut document.content)?;
            conn.execute(
                "INSERT INTO document (node_id, published, edited) VALUES (?1, 0, 1)",
                params![document.content.id],
            )?;
            document.content.version_id = self.insert_version(conn, document)?;
        }

        let draft_rows = rows_from_properties(&document.content.properties, &languages, false)?;
        replace_rows(conn, document.content.version_id, &draft_rows)?;
        write_version_names(conn, document.content.version_id, &document.content, &languages)?;

        match document.published_state {
            PublishedState::Publishing => self.publish_current(conn, document, &languages)?,
            PublishedState::Unpublishing => clear_published(conn, document)?,
            PublishedState::Published | PublishedState::Unpublished => {}
        }

        write_culture_records(conn, document, &languages)?;
        write_tags(conn, &document.content, &languages)?;
        renormalize_edited(
            conn,
            &EditedScope {
                content_type_ids: vec![document.content.content_type.id],
                property_type_ids: Vec::new(),
                node_id: Some(document.content.id),
            },
            languages.require_default_id()?,
            max,
        )?;
        read_edited(conn, document, &languages)?;
        self.ctx
            .relations
            .persist_relations(conn, document.content.id, &document.content.properties, max)?;

        let kind = match document.published_state {
            PublishedState::Publishing => NotificationKind::Published,
            PublishedState::Unpublishing => NotificationKind::Unpublished,
            _ => NotificationKind::Saved,
        };
        self.ctx
            .notify(kind, ObjectType::Document, &document.content, Some(document.published_state));
        document.published_state = match document.published_state {
            PublishedState::Publishing | PublishedState::Published => PublishedState::Published,
            PublishedState::Unpublishing | PublishedState::Unpublished => PublishedState::Unpublished,
        };
        tracing::debug!(
            "Saved document {} (version {}, {:?})",
            document.content.id,
            document.content.version_id,
            document.published_state
        );
        Ok(())
    }

    fn insert_version(&self, conn: &Connection, document: &Document) -> Result<i32> {
        let version_id = create_version(conn, &document.content, true)?;
        conn.execute(
            "INSERT INTO document_version (id, template_id, published) VALUES (?1, ?2, 0)",
            params![version_id, document.template_id],
        )?;
        Ok(version_id)
    }

    /// Freeze the current version as the published snapshot and open a new
    /// current version holding the same draft.
    fn publish_current(&self, conn: &Connection, document: &mut Document, languages: &Languages) -> Result<()> {
        let node_id = document.content.id;
        let snapshot = document.content.version_id;
        conn.execute(
            "UPDATE document_version SET published = 0 \
             WHERE published = 1 AND id IN (SELECT id FROM content_version WHERE node_id = ?1)",
            params![node_id],
        )?;
        let published_rows = rows_from_properties(&document.content.properties, languages, true)?;
        replace_rows(conn, snapshot, &published_rows)?;
        conn.execute("UPDATE content_version SET current = 0 WHERE id = ?1", params![snapshot])?;
        conn.execute("UPDATE document_version SET published = 1 WHERE id = ?1", params![snapshot])?;

        let draft = self.insert_version(conn, document)?;
        let draft_rows = rows_from_properties(&document.content.properties, languages, false)?;
        replace_rows(conn, draft, &draft_rows)?;
        write_version_names(conn, draft, &document.content, languages)?;
        conn.execute("UPDATE document SET published = 1 WHERE node_id = ?1", params![node_id])?;

        document.content.version_id = draft;
        document.published_version_id = snapshot;
        document.publish_date = Some(document.content.update_date);
        document.publish_name = document.content.name.clone();
        document.published_cultures = document.content.culture_names.keys().cloned().collect();
        tracing::info!("Published document {} as version {}", node_id, snapshot);
        Ok(())
    }

    /// Move a document under a new parent.
    pub fn move_to(&self, conn: &Connection, document: &mut Document, parent_id: i32) -> Result<Vec<i32>> {
        let moved = move_content(conn, &mut document.content, parent_id)?;
        self.ctx.notify(
            NotificationKind::Moved,
            ObjectType::Document,
            &document.content,
            Some(document.published_state),
        );
        Ok(moved)
    }

    /// Unpublish if needed, then move under the recycle bin.
    pub fn move_to_recycle_bin(&self, conn: &Connection, document: &mut Document) -> Result<Vec<i32>> {
        if document.is_published() {
            document.unpublish();
            self.save(conn, document)?;
        }
        self.move_to(conn, document, DOCUMENT_RECYCLE_BIN_ID)
    }

    /// Delete a document and its descendants. Returns the deleted ids,
    /// deepest first.
    pub fn delete(&self, conn: &Connection, id: i32) -> Result<Vec<i32>> {
        match tree::get_node(conn, id)? {
            Some(node) if node.object_type == ObjectType::Document => {}
            _ => return Err(StoreError::not_found("Document", id)),
        }
        let deleted = delete_tree(conn, id)?;
        self.ctx.notify_deleted(ObjectType::Document, &deleted);
        Ok(deleted.iter().map(|n| n.id).collect())
    }
}

fn clear_published(conn: &Connection, document: &mut Document) -> Result<()> {
    let node_id = document.content.id;
    conn.execute(
        "UPDATE document_version SET published = 0 \
         WHERE id IN (SELECT id FROM content_version WHERE node_id = ?1)",
        params![node_id],
    )?;
    conn.execute("UPDATE document SET published = 0 WHERE node_id = ?1", params![node_id])?;
    conn.execute(
        "UPDATE document_culture_variation SET published = 0 WHERE node_id = ?1",
        params![node_id],
    )?;
    document.published_version_id = 0;
    document.publish_date = None;
    document.publish_name = None;
    document.published_cultures.clear();
    tracing::info!("Unpublished document {}", node_id);
    Ok(())
}

/// Upsert the per-culture records of a variant document and drop the ones
/// whose culture no longer has a name. Invariant documents keep none.
fn write_culture_records(conn: &Connection, document: &Document, languages: &Languages) -> Result<()> {
    let node_id = document.content.id;
    if !document.content.varies_by_culture() {
        conn.execute(
            "DELETE FROM document_culture_variation WHERE node_id = ?1",
            params![node_id],
        )?;
        return Ok(());
    }
    let mut keep = BTreeSet::new();
    let mut upsert = conn.prepare_cached(
        "INSERT INTO document_culture_variation (node_id, language_id, edited, available, published, name) \
         VALUES (?1, ?2, 1, 1, ?3, ?4) \
         ON CONFLICT (node_id, language_id) DO UPDATE SET \
         available = 1, published = excluded.published, name = excluded.name",
    )?;
    for (culture, name) in &document.content.culture_names {
        let language_id = languages.require_id(culture)?;
        let published = document
            .published_cultures
            .iter()
            .any(|c| c.eq_ignore_ascii_case(culture));
        upsert.execute(params![node_id, language_id, published, name.name])?;
        keep.insert(language_id);
    }
    let existing: Vec<i32> = {
        let mut stmt =
            conn.prepare_cached("SELECT language_id FROM document_culture_variation WHERE node_id = ?1")?;
        stmt.query_map(params![node_id], |r| r.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    for language_id in existing.into_iter().filter(|id| !keep.contains(id)) {
        conn.execute(
            "DELETE FROM document_culture_variation WHERE node_id = ?1 AND language_id = ?2",
            params![node_id, language_id],
        )?;
    }
    Ok(())
}

fn read_edited(conn: &Connection, document: &mut Document, languages: &Languages) -> Result<()> {
    let node_id = document.content.id;
    document.edited = conn.query_row(
        "SELECT edited FROM document WHERE node_id = ?1",
        params![node_id],
        |r| r.get(0),
    )?;
    let mut stmt = conn.prepare_cached(
        "SELECT language_id FROM document_culture_variation WHERE node_id = ?1 AND edited = 1",
    )?;
    let ids = stmt
        .query_map(params![node_id], |r| r.get::<_, i32>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    document.edited_cultures = ids
        .into_iter()
        .filter_map(|id| languages.iso_by_id(id).map(str::to_string))
        .collect();
    Ok(())
}

fn load_states(conn: &Connection, node_ids: &[i32], max_parameters: usize) -> Result<HashMap<i32, DocumentState>> {
    let mut states = HashMap::with_capacity(node_ids.len());
    for group in in_groups(node_ids, max_parameters, 0) {
        let sql = format!(
            "SELECT d.node_id, d.published, d.edited, dv.template_id, pv.id, pv.version_date, pv.text \
             FROM document d \
             JOIN content_version cv ON cv.node_id = d.node_id AND cv.current = 1 \
             LEFT JOIN document_version dv ON dv.id = cv.id \
             LEFT JOIN content_version pv ON pv.node_id = d.node_id \
                AND pv.id IN (SELECT id FROM document_version WHERE published = 1) \
             WHERE d.node_id IN ({})",
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(int_values(group)))?;
        while let Some(row) = rows.next()? {
            states.insert(
                row.get::<_, i32>(0)?,
                DocumentState {
                    published: row.get(1)?,
                    edited: row.get(2)?,
                    template_id: row.get(3)?,
                    published_version_id: row.get::<_, Option<i32>>(4)?.unwrap_or(0),
                    publish_date: row.get(5)?,
                    publish_name: row.get(6)?,
                },
            );
        }
    }
    Ok(states)
}

fn load_culture_states(
    conn: &Connection,
    node_ids: &[i32],
    languages: &Languages,
    max_parameters: usize,
) -> Result<HashMap<i32, CultureState>> {
    let mut states: HashMap<i32, CultureState> = HashMap::new();
    for group in in_groups(node_ids, max_parameters, 0) {
        let sql = format!(
            "SELECT node_id, language_id, published, edited FROM document_culture_variation \
             WHERE node_id IN ({})",
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(int_values(group)))?;
        while let Some(row) = rows.next()? {
            let language_id: i32 = row.get(1)?;
            let Some(iso) = languages.iso_by_id(language_id) else {
                continue;
            };
            let state = states.entry(row.get(0)?).or_default();
            if row.get::<_, bool>(2)? {
                state.published.insert(iso.to_string());
            }
            if row.get::<_, bool>(3)? {
                state.edited.insert(iso.to_string());
            }
        }
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::database::Database;
    use crate::models::content_type::{PropertyType, ValueStorageType};
    use crate::models::variation::ContentVariation;
    use crate::models::Value;
    use crate::notifications::RecordingPublisher;

    fn setup(conn: &Connection, variations: ContentVariation) -> (DocumentRepository, Arc<ContentType>) {
        let ctx = RepositoryContext::new(EngineConfig::default()).into_shared();
        let mut ct = ContentType::new(ObjectType::DocumentType, "page")
            .with_variations(variations)
            .with_property(
                PropertyType::new("title", "textbox", ValueStorageType::Nvarchar).with_variations(variations),
            );
        ctx.content_types.save(conn, &mut ct).unwrap();
        let ct = ctx.content_types.require(conn, ct.id).unwrap();
        (DocumentRepository::new(ctx), ct)
    }

    fn version_flags(conn: &Connection, node_id: i32) -> (i64, i64) {
        conn.query_row(
            "SELECT SUM(cv.current), SUM(dv.published) FROM content_version cv \
             JOIN document_version dv ON dv.id = cv.id WHERE cv.node_id = ?1",
            params![node_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (repo, ct) = setup(conn, ContentVariation::NOTHING);
        let mut doc = Document::new_at_root("Home", ct);
        doc.content.set_value("title", "Hello", None).unwrap();
        repo.save(conn, &mut doc).unwrap();
        assert!(doc.edited);

        let loaded = repo.require(conn, doc.id()).unwrap();
        assert_eq!(loaded.content.name.as_deref(), Some("Home"));
        assert_eq!(loaded.content.get_value("title", None), Some(&Value::text("Hello")));
        assert_eq!(loaded.published_state, PublishedState::Unpublished);
        assert_eq!(version_flags(conn, doc.id()), (1, 0));
        assert!(repo.get_by_key(conn, doc.content.key).unwrap().is_some());
    }

    #[test]
    fn test_publish_splits_versions() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (repo, ct) = setup(conn, ContentVariation::NOTHING);
        let mut doc = Document::new_at_root("Home", ct);
        doc.content.set_value("title", "v1", None).unwrap();
        doc.publish();
        repo.save(conn, &mut doc).unwrap();
        assert_eq!(doc.published_state, PublishedState::Published);
        assert!(!doc.edited);
        assert_ne!(doc.published_version_id, doc.content.version_id);
        assert_eq!(version_flags(conn, doc.id()), (1, 1));

        doc.content.set_value("title", "v2", None).unwrap();
        repo.save(conn, &mut doc).unwrap();
        assert!(doc.edited);
        let loaded = repo.require(conn, doc.id()).unwrap();
        let title = loaded.content.properties.get("title").unwrap();
        assert_eq!(title.get_value(None, None, false), Some(&Value::text("v2")));
        assert_eq!(title.get_value(None, None, true), Some(&Value::text("v1")));

        let mut loaded = loaded;
        loaded.publish();
        repo.save(conn, &mut loaded).unwrap();
        assert_eq!(version_flags(conn, doc.id()), (1, 1));
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM content_version WHERE node_id = ?1", params![doc.id()], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 3);
    }

    #[test]
    fn test_unpublish_keeps_versions() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (repo, ct) = setup(conn, ContentVariation::NOTHING);
        let mut doc = Document::new_at_root("Home", ct);
        doc.publish();
        repo.save(conn, &mut doc).unwrap();
        doc.unpublish();
        repo.save(conn, &mut doc).unwrap();
        assert_eq!(doc.published_state, PublishedState::Unpublished);
        assert_eq!(doc.published_version_id, 0);
        assert!(doc.edited);
        assert_eq!(version_flags(conn, doc.id()), (1, 0));
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM content_version WHERE node_id = ?1", params![doc.id()], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 2);
    }

    #[test]
    fn test_notification_sees_transitional_state() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let recorder = Arc::new(RecordingPublisher::new());
        let ctx = RepositoryContext::new(EngineConfig::default())
            .with_notifications(recorder.clone())
            .into_shared();
        let mut ct = ContentType::new(ObjectType::DocumentType, "page");
        ctx.content_types.save(conn, &mut ct).unwrap();
        let repo = DocumentRepository::new(Arc::clone(&ctx));
        let mut doc = Document::new_at_root("Home", Arc::new(ct));
        doc.publish();
        repo.save(conn, &mut doc).unwrap();
        let seen = recorder.notifications();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Published);
        assert_eq!(seen[0].published_state, Some(PublishedState::Publishing));
        assert_eq!(doc.published_state, PublishedState::Published);
    }

    #[test]
    fn test_variant_culture_records() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        conn.execute("INSERT INTO language (iso_code, culture_name) VALUES ('da-DK', 'Danish')", [])
            .unwrap();
        let (repo, ct) = setup(conn, ContentVariation::CULTURE);
        let mut doc = Document::new_at_root("", ct);
        doc.content.set_name("Home", Some("en-US")).unwrap();
        doc.content.set_name("Hjem", Some("da-DK")).unwrap();
        doc.content.set_value("title", "Hello", Some("en-US")).unwrap();
        doc.publish();
        repo.save(conn, &mut doc).unwrap();
        assert_eq!(doc.content.name.as_deref(), Some("Home"));
        assert_eq!(doc.published_cultures.len(), 2);
        assert!(doc.edited_cultures.is_empty());

        doc.content.set_value("title", "Hi", Some("en-US")).unwrap();
        repo.save(conn, &mut doc).unwrap();
        assert!(doc.edited_cultures.contains("en-US"));
        assert!(!doc.edited_cultures.contains("da-DK"));

        let loaded = repo.require(conn, doc.id()).unwrap();
        assert_eq!(loaded.content.culture_name("da-DK"), Some("Hjem"));
        assert_eq!(loaded.edited_cultures, doc.edited_cultures);
    }

    #[test]
    fn test_recycle_bin_unpublishes() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (repo, ct) = setup(conn, ContentVariation::NOTHING);
        let mut doc = Document::new_at_root("Home", ct);
        doc.publish();
        repo.save(conn, &mut doc).unwrap();
        repo.move_to_recycle_bin(conn, &mut doc).unwrap();
        assert!(doc.content.trashed);
        assert_eq!(doc.content.parent_id, DOCUMENT_RECYCLE_BIN_ID);
        let loaded = repo.require(conn, doc.id()).unwrap();
        assert_eq!(loaded.published_state, PublishedState::Unpublished);
        assert!(loaded.content.trashed);
    }

    #[test]
    fn test_page_and_delete() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (repo, ct) = setup(conn, ContentVariation::NOTHING);
        let mut parent = Document::new_at_root("Parent", Arc::clone(&ct));
        repo.save(conn, &mut parent).unwrap();
        for _ in 0..3 {
            let mut child = Document::new("Child", parent.id(), Arc::clone(&ct));
            repo.save(conn, &mut child).unwrap();
        }
        let page = repo
            .get_page(conn, &ContentFilter::children_of(parent.id()), &Ordering::by("name"), 0, 0)
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.page_size, EngineConfig::default().default_page_size);
        let names: Vec<_> = page.items.iter().filter_map(|d| d.content.name.clone()).collect();
        assert_eq!(names, vec!["Child", "Child1", "Child2"]);

        let deleted = repo.delete(conn, parent.id()).unwrap();
        assert_eq!(deleted.len(), 4);
        assert!(repo.get(conn, parent.id()).unwrap().is_none());
    }
}
