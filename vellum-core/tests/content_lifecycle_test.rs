//! Content lifecycle integration tests
//!
//! Documents are saved through the repositories against a real SQLite file
//! or an in-memory database, then checked at the row level.

use rusqlite::{params, Connection};
use std::sync::Arc;
use tempfile::TempDir;
use vellum_core::models::{ContentVariation, Language, ROOT_ID};
use vellum_core::repositories::language::save_language;
use vellum_core::{
    check_integrity, ContentFilter, ContentType, Database, Document, DocumentRepository, EngineConfig, ObjectType,
    Ordering, PropertyType, RepositoryContext, Value, ValueStorageType,
};

fn page_type(ctx: &RepositoryContext, conn: &Connection) -> Arc<ContentType> {
    let mut ct = ContentType::new(ObjectType::DocumentType, "page")
        .with_property(PropertyType::new("title", "textbox", ValueStorageType::Nvarchar))
        .with_property(PropertyType::new("body", "richText", ValueStorageType::Ntext));
    ctx.content_types.save(conn, &mut ct).unwrap();
    ctx.content_types.require(conn, ct.id).unwrap()
}

fn repository() -> (Arc<RepositoryContext>, DocumentRepository) {
    let ctx = RepositoryContext::new(EngineConfig::default()).into_shared();
    let repo = DocumentRepository::new(Arc::clone(&ctx));
    (ctx, repo)
}

#[test]
fn test_round_trip_through_file_database() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("content.db");
    let (ctx, repo) = repository();

    let id = {
        let mut db = Database::open(&path, EngineConfig::default()).unwrap();
        let scope = db.scope().unwrap();
        let ct = page_type(&ctx, &scope);
        let mut doc = Document::new_at_root("Home", ct);
        doc.content.set_value("title", "Hello", None).unwrap();
        repo.save(&scope, &mut doc).unwrap();
        scope.complete().unwrap();
        doc.id()
    };

    let db = Database::open(&path, EngineConfig::default()).unwrap();
    let loaded = repo.require(db.connection(), id).unwrap();
    let values: Vec<(String, Option<Value>)> = loaded
        .content
        .properties
        .iter()
        .map(|p| (p.alias().to_string(), p.get_value(None, None, false).cloned()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("title".to_string(), Some(Value::text("Hello"))),
            ("body".to_string(), None),
        ]
    );
}

#[test]
fn test_uncompleted_scope_rolls_back() {
    let mut db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let (ctx, repo) = repository();
    {
        let scope = db.scope().unwrap();
        let ct = page_type(&ctx, &scope);
        let mut doc = Document::new_at_root("Home", ct);
        repo.save(&scope, &mut doc).unwrap();
    }
    ctx.content_types.clear_cache();
    let documents: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM document", [], |r| r.get(0))
        .unwrap();
    assert_eq!(documents, 0);
}

#[test]
fn test_version_flags_hold_through_publish_cycles() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    let ct = page_type(&ctx, conn);
    let mut doc = Document::new_at_root("Home", ct);

    let check = |conn: &Connection, node_id: i32| {
        let (current, published): (i64, i64) = conn
            .query_row(
                "SELECT SUM(cv.current), SUM(dv.published) FROM content_version cv \
                 JOIN document_version dv ON dv.id = cv.id WHERE cv.node_id = ?1",
                params![node_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(current, 1);
        assert!(published <= 1);
    };

    for round in 0..3 {
        doc.content.set_value("title", format!("draft {}", round).as_str(), None).unwrap();
        repo.save(conn, &mut doc).unwrap();
        check(conn, doc.id());
        doc.publish();
        repo.save(conn, &mut doc).unwrap();
        check(conn, doc.id());
    }
    doc.unpublish();
    repo.save(conn, &mut doc).unwrap();
    check(conn, doc.id());
}

#[test]
fn test_draft_save_leaves_published_values_alone() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    let ct = page_type(&ctx, conn);
    let mut doc = Document::new_at_root("Home", ct);
    doc.content.set_value("title", "live", None).unwrap();
    doc.publish();
    repo.save(conn, &mut doc).unwrap();
    let published_version = doc.published_version_id;

    for text in ["one", "two", "three"] {
        doc.content.set_value("title", text, None).unwrap();
        repo.save(conn, &mut doc).unwrap();
    }
    let live: String = conn
        .query_row(
            "SELECT varchar_value FROM property_data WHERE version_id = ?1",
            params![published_version],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(live, "live");
    let loaded = repo.require(conn, doc.id()).unwrap();
    assert_eq!(loaded.published_version_id, published_version);
    assert_eq!(loaded.content.get_value("title", None), Some(&Value::text("three")));
    assert!(loaded.edited);
}

#[test]
fn test_sibling_names_are_suffixed() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    let ct = page_type(&ctx, conn);
    let names: Vec<String> = (0..3)
        .map(|_| {
            let mut doc = Document::new_at_root("Page", Arc::clone(&ct));
            repo.save(conn, &mut doc).unwrap();
            doc.content.name.unwrap()
        })
        .collect();
    assert_eq!(names, vec!["Page", "Page1", "Page2"]);
}

#[test]
fn test_identical_names_page_deterministically() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    let ct = page_type(&ctx, conn);
    let mut parents = Vec::new();
    for i in 0..5 {
        let mut parent = Document::new_at_root(&format!("Folder {}", i), Arc::clone(&ct));
        repo.save(conn, &mut parent).unwrap();
        let mut doc = Document::new("Same", parent.id(), Arc::clone(&ct));
        repo.save(conn, &mut doc).unwrap();
        parents.push(parent.id());
    }
    let filter = ContentFilter {
        name_contains: Some("Same".to_string()),
        ..ContentFilter::default()
    };
    let ordering = Ordering::by("name");
    let mut seen = Vec::new();
    for index in 0..3 {
        let page = repo.get_page(conn, &filter, &ordering, index, 2).unwrap();
        assert_eq!(page.total, 5);
        seen.extend(page.items.iter().map(|d| d.id()));
    }
    let mut unique = seen.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(seen.len(), 5);
    assert_eq!(unique.len(), 5);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_integrity_fix_restores_paths() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    let ct = page_type(&ctx, conn);
    let mut parent = Document::new_at_root("Parent", Arc::clone(&ct));
    repo.save(conn, &mut parent).unwrap();
    let mut child = Document::new("Child", parent.id(), Arc::clone(&ct));
    repo.save(conn, &mut child).unwrap();
    let mut grandchild = Document::new("Grandchild", child.id(), Arc::clone(&ct));
    repo.save(conn, &mut grandchild).unwrap();

    conn.execute(
        "UPDATE node SET path = ?2 WHERE id = ?1",
        params![child.id(), format!("-1,999,{}", child.id())],
    )
    .unwrap();

    let report = check_integrity(conn, &[ObjectType::Document], true).unwrap();
    assert_eq!(report.detected(), 2);
    assert_eq!(report.fixed(), 1);
    assert_eq!(report.unfixed_ids(), vec![grandchild.id()]);

    let mut stmt = conn
        .prepare(
            "SELECT n.id, n.path, n.level, p.path, p.level FROM node n JOIN node p ON p.id = n.parent_id \
             WHERE n.node_object_type = ?1",
        )
        .unwrap();
    let rows: Vec<(i32, String, i32, String, i32)> = stmt
        .query_map(params![ObjectType::Document.tag()], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 3);
    for (id, path, level, parent_path, parent_level) in rows {
        assert_eq!(path, format!("{},{}", parent_path, id));
        assert_eq!(level, parent_level + 1);
    }
    assert!(check_integrity(conn, &[ObjectType::Document], false).unwrap().ok());
}

#[test]
fn test_variant_document_requires_a_name() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    let mut ct = ContentType::new(ObjectType::DocumentType, "variant").with_variations(ContentVariation::CULTURE);
    ctx.content_types.save(conn, &mut ct).unwrap();
    let mut doc = Document::new("ignored", ROOT_ID, Arc::new(ct));
    let err = repo.save(conn, &mut doc).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_custom_property_ordering_puts_nulls_last() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    let mut ct = ContentType::new(ObjectType::DocumentType, "ranked")
        .with_property(PropertyType::new("rank", "integer", ValueStorageType::Integer));
    ctx.content_types.save(conn, &mut ct).unwrap();
    let ct = ctx.content_types.require(conn, ct.id).unwrap();
    for (name, rank) in [("a", Some(3i64)), ("b", None), ("c", Some(1)), ("d", Some(2))] {
        let mut doc = Document::new_at_root(name, Arc::clone(&ct));
        if let Some(rank) = rank {
            doc.content.set_value("rank", rank, None).unwrap();
        }
        repo.save(conn, &mut doc).unwrap();
    }

    let names = |ordering: &Ordering| -> Vec<String> {
        repo.get_page(conn, &ContentFilter::default(), ordering, 0, 10)
            .unwrap()
            .items
            .into_iter()
            .map(|d| d.content.name.unwrap())
            .collect()
    };
    assert_eq!(names(&Ordering::custom("rank")), vec!["c", "d", "a", "b"]);
    assert_eq!(names(&Ordering::custom("rank").descending()), vec!["a", "d", "c", "b"]);
}

#[test]
fn test_name_ordering_prefers_culture_name() {
    let db = Database::open_in_memory(EngineConfig::default()).unwrap();
    let conn = db.connection();
    let (ctx, repo) = repository();
    save_language(conn, &mut Language::new("da-DK", "Danish")).unwrap();
    let mut ct = ContentType::new(ObjectType::DocumentType, "variant").with_variations(ContentVariation::CULTURE);
    ctx.content_types.save(conn, &mut ct).unwrap();
    let ct = ctx.content_types.require(conn, ct.id).unwrap();
    for (english, danish) in [("Alpha", Some("Zulu")), ("Bravo", Some("Able")), ("Charlie", None)] {
        let mut doc = Document::new_at_root("", Arc::clone(&ct));
        doc.content.set_name(english, Some("en-US")).unwrap();
        if let Some(danish) = danish {
            doc.content.set_name(danish, Some("da-DK")).unwrap();
        }
        repo.save(conn, &mut doc).unwrap();
    }

    let names = |ordering: &Ordering| -> Vec<String> {
        repo.get_page(conn, &ContentFilter::default(), ordering, 0, 10)
            .unwrap()
            .items
            .into_iter()
            .map(|d| d.content.name.unwrap())
            .collect()
    };
    assert_eq!(names(&Ordering::by("name")), vec!["Alpha", "Bravo", "Charlie"]);
    // Charlie has no Danish name and falls back to its node text
    assert_eq!(names(&Ordering::by("name").in_culture("da-DK")), vec!["Bravo", "Charlie", "Alpha"]);
}
