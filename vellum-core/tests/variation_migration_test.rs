//! Culture variation migration integration tests

use rusqlite::{params, Connection};
use std::sync::Arc;
use vellum_core::models::ContentVariation;
use vellum_core::notifications::{CacheScope, RecordingPublisher};
use vellum_core::{
    ContentType, Database, Document, DocumentRepository, EngineConfig, ObjectType, PropertyType,
    RepositoryContext, Value, ValueStorageType,
};

struct Fixture {
    db: Database,
    ctx: Arc<RepositoryContext>,
    repo: DocumentRepository,
    content_type_id: i32,
}

impl Fixture {
    fn new(variations: ContentVariation) -> Self {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let ctx = RepositoryContext::new(EngineConfig::default()).into_shared();
        let mut ct = ContentType::new(ObjectType::DocumentType, "page")
            .with_variations(variations)
            .with_property(PropertyType::new("title", "textbox", ValueStorageType::Nvarchar));
        ctx.content_types.save(db.connection(), &mut ct).unwrap();
        let repo = DocumentRepository::new(Arc::clone(&ctx));
        Self {
            db,
            ctx,
            repo,
            content_type_id: ct.id,
        }
    }

    fn conn(&self) -> &Connection {
        self.db.connection()
    }

    fn content_type(&self) -> Arc<ContentType> {
        self.ctx.content_types.require(self.conn(), self.content_type_id).unwrap()
    }

    /// Change the variations of the type and of its title property.
    fn vary(&self, type_variations: ContentVariation, title_variations: ContentVariation) {
        let mut ct = self
            .ctx
            .content_types
            .load_uncached(self.conn(), self.content_type_id)
            .unwrap()
            .unwrap();
        ct.variations = type_variations;
        ct.property_type_mut("title").unwrap().variations = title_variations;
        self.ctx.content_types.save(self.conn(), &mut ct).unwrap();
    }

    fn culture_edited(&self, node_id: i32) -> Option<bool> {
        self.conn()
            .query_row(
                "SELECT dcv.edited FROM document_culture_variation dcv \
                 JOIN language l ON l.id = dcv.language_id WHERE dcv.node_id = ?1 AND l.iso_code = 'en-US'",
                params![node_id],
                |r| r.get(0),
            )
            .ok()
    }
}

#[test]
fn test_edited_after_publish_survives_conversion_to_variant() {
    let fx = Fixture::new(ContentVariation::NOTHING);
    let mut doc = Document::new_at_root("Home", fx.content_type());
    doc.content.set_value("title", "published", None).unwrap();
    doc.publish();
    fx.repo.save(fx.conn(), &mut doc).unwrap();
    doc.content.set_value("title", "edited", None).unwrap();
    fx.repo.save(fx.conn(), &mut doc).unwrap();
    assert!(fx.culture_edited(doc.id()).is_none());

    fx.vary(ContentVariation::CULTURE, ContentVariation::CULTURE);

    assert_eq!(fx.culture_edited(doc.id()), Some(true));
    let loaded = fx.repo.require(fx.conn(), doc.id()).unwrap();
    assert!(loaded.edited);
    assert!(loaded.edited_cultures.contains("en-US"));
    assert_eq!(loaded.content.culture_name("en-US"), Some("Home"));
    let title = loaded.content.properties.get("title").unwrap();
    assert_eq!(title.get_value(Some("en-US"), None, false), Some(&Value::text("edited")));
    assert_eq!(title.get_value(Some("en-US"), None, true), Some(&Value::text("published")));
}

#[test]
fn test_unedited_document_stays_clean_after_conversion() {
    let fx = Fixture::new(ContentVariation::NOTHING);
    let mut doc = Document::new_at_root("Home", fx.content_type());
    doc.content.set_value("title", "same", None).unwrap();
    doc.publish();
    fx.repo.save(fx.conn(), &mut doc).unwrap();
    assert!(!doc.edited);

    fx.vary(ContentVariation::CULTURE, ContentVariation::CULTURE);

    assert_eq!(fx.culture_edited(doc.id()), Some(false));
    let loaded = fx.repo.require(fx.conn(), doc.id()).unwrap();
    assert!(!loaded.edited);
    assert!(loaded.edited_cultures.is_empty());
}

/// Enabling then disabling culture on a property does not bring back the
/// invariant value: the round trip copies from the default culture, which
/// may have been edited in the meantime.
#[test]
fn test_enable_then_disable_is_not_idempotent() {
    let fx = Fixture::new(ContentVariation::CULTURE);
    let mut doc = Document::new_at_root("", fx.content_type());
    doc.content.set_name("Home", Some("en-US")).unwrap();
    doc.content.set_value("title", "original", None).unwrap();
    fx.repo.save(fx.conn(), &mut doc).unwrap();

    fx.vary(ContentVariation::CULTURE, ContentVariation::CULTURE);
    let invariant_rows: i64 = fx
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM property_data WHERE language_id IS NULL",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(invariant_rows, 1, "enabling keeps the invariant rows");

    let mut doc = fx.repo.require(fx.conn(), doc.id()).unwrap();
    assert_eq!(doc.content.get_value("title", Some("en-US")), Some(&Value::text("original")));
    doc.content.set_value("title", "changed", Some("en-US")).unwrap();
    fx.repo.save(fx.conn(), &mut doc).unwrap();

    fx.vary(ContentVariation::CULTURE, ContentVariation::NOTHING);
    let culture_rows: i64 = fx
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM property_data WHERE language_id IS NOT NULL",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(culture_rows, 0, "disabling deletes the culture rows");

    let doc = fx.repo.require(fx.conn(), doc.id()).unwrap();
    assert_eq!(doc.content.get_value("title", None), Some(&Value::text("changed")));
    assert_ne!(doc.content.get_value("title", None), Some(&Value::text("original")));
}

#[test]
fn test_disabling_type_culture_moves_names_back() {
    let fx = Fixture::new(ContentVariation::CULTURE);
    let mut doc = Document::new_at_root("", fx.content_type());
    doc.content.set_name("Forside", Some("en-US")).unwrap();
    fx.repo.save(fx.conn(), &mut doc).unwrap();

    fx.vary(ContentVariation::NOTHING, ContentVariation::NOTHING);

    let loaded = fx.repo.require(fx.conn(), doc.id()).unwrap();
    assert_eq!(loaded.content.name.as_deref(), Some("Forside"));
    assert!(loaded.content.culture_names.is_empty());
    assert!(fx.culture_edited(doc.id()).is_none());
}

#[test]
fn test_content_type_save_invalidates_caches() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let recorder = Arc::new(RecordingPublisher::new());
    let ctx = RepositoryContext::new(EngineConfig::default()).with_cache_invalidator(recorder.clone());
    let mut ct = ContentType::new(ObjectType::DocumentType, "page");
    ctx.content_types.save(conn, &mut ct).unwrap();
    ct.variations = ContentVariation::CULTURE;
    ctx.content_types.save(conn, &mut ct).unwrap();
    let invalidations = recorder.invalidations();
    assert_eq!(invalidations.len(), 2);
    assert!(invalidations.iter().all(|(scope, ids)| *scope == CacheScope::ContentTypes && ids.contains(&ct.id)));
}

#[test]
fn test_type_only_conversion_keeps_property_invariant() {
    let fx = Fixture::new(ContentVariation::NOTHING);
    let mut doc = Document::new_at_root("Home", fx.content_type());
    doc.content.set_value("title", "published", None).unwrap();
    doc.publish();
    fx.repo.save(fx.conn(), &mut doc).unwrap();
    doc.content.set_value("title", "edited", None).unwrap();
    fx.repo.save(fx.conn(), &mut doc).unwrap();

    fx.vary(ContentVariation::CULTURE, ContentVariation::NOTHING);

    assert_eq!(fx.culture_edited(doc.id()), Some(true));
    let loaded = fx.repo.require(fx.conn(), doc.id()).unwrap();
    assert!(loaded.edited);
    assert_eq!(loaded.content.culture_name("en-US"), Some("Home"));
    assert_eq!(loaded.content.get_value("title", None), Some(&Value::text("edited")));
    let culture_rows: i64 = fx
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM property_data WHERE language_id IS NOT NULL",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(culture_rows, 0);
}

#[test]
fn test_composed_property_change_migrates_composers() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let ctx = RepositoryContext::new(EngineConfig::default()).into_shared();
    let repo = DocumentRepository::new(Arc::clone(&ctx));

    let mut seo = ContentType::new(ObjectType::DocumentType, "seo")
        .with_variations(ContentVariation::CULTURE)
        .with_property(PropertyType::new("metaTitle", "textbox", ValueStorageType::Nvarchar));
    seo.is_element = true;
    ctx.content_types.save(conn, &mut seo).unwrap();

    let mut page = ContentType::new(ObjectType::DocumentType, "page").with_variations(ContentVariation::CULTURE);
    page.composition_ids = vec![seo.id];
    ctx.content_types.save(conn, &mut page).unwrap();

    let mut doc = Document::new_at_root("", ctx.content_types.require(conn, page.id).unwrap());
    doc.content.set_name("Home", Some("en-US")).unwrap();
    doc.content.set_value("metaTitle", "inv", None).unwrap();
    repo.save(conn, &mut doc).unwrap();

    let mut seo = ctx.content_types.load_uncached(conn, seo.id).unwrap().unwrap();
    seo.property_type_mut("metaTitle").unwrap().variations = ContentVariation::CULTURE;
    let report = ctx.content_types.save(conn, &mut seo).unwrap().unwrap();

    assert!(report.impacted_content_types.contains(&page.id));
    assert!(report.changes.iter().any(|c| c.content_type_id == page.id));
    assert_eq!(report.property_rows_copied, 1);
    let loaded = repo.require(conn, doc.id()).unwrap();
    assert_eq!(loaded.content.get_value("metaTitle", Some("en-US")), Some(&Value::text("inv")));
}
