//! Version cleanup and edited-flag recomputation commands

use anyhow::{anyhow, Result};
use vellum_core::repositories::Languages;
use vellum_core::variation::composer_ids;
use vellum_core::{
    renormalize_edited as recompute, versions, ContentTypeRepository, Database, EditedScope, EditedSummary,
    ObjectType,
};

pub fn cleanup_versions(db: &mut Database, keep: usize, dry_run: bool) -> Result<usize> {
    let config = db.config().clone();
    let scope = db.scope()?;
    let candidates = versions::cleanup_candidates(&scope, keep)?;
    println!("Versions eligible for cleanup (keeping {} per item): {}", keep, candidates.len());
    if dry_run {
        for version in &candidates {
            println!("  node {} version {} ({})", version.node_id, version.id, version.version_date);
        }
        return Ok(0);
    }
    let ids: Vec<i32> = candidates.iter().map(|v| v.id).collect();
    let deleted = versions::delete_versions(&scope, &ids, config.max_parameter_count)?;
    scope.complete()?;
    println!("Deleted {} version(s)", deleted.len());
    Ok(deleted.len())
}

/// Recompute edited flags for the documents of one type and of every type
/// composing it.
pub fn renormalize_edited(db: &mut Database, alias: &str) -> Result<EditedSummary> {
    let config = db.config().clone();
    let scope = db.scope()?;
    let content_types = ContentTypeRepository::new(config.clone());
    let content_type = content_types
        .get_by_alias(&scope, ObjectType::DocumentType, alias)?
        .ok_or_else(|| anyhow!("Document type '{}' not found", alias))?;

    let mut content_type_ids = vec![content_type.id];
    content_type_ids.extend(composer_ids(&scope, content_type.id)?);
    let default_language_id = Languages::load(&scope)?.require_default_id()?;
    let summary = recompute(
        &scope,
        &EditedScope {
            content_type_ids,
            ..EditedScope::default()
        },
        default_language_id,
        config.max_parameter_count,
    )?;
    scope.complete()?;

    println!("Recomputed edited flags for '{}'", alias);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vellum_core::{ContentType, Document, DocumentRepository, EngineConfig, RepositoryContext};

    fn seeded() -> (Database, i32) {
        let mut db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let ctx = RepositoryContext::new(EngineConfig::default()).into_shared();
        let repo = DocumentRepository::new(Arc::clone(&ctx));
        let scope = db.scope().unwrap();
        let mut ct = ContentType::new(ObjectType::DocumentType, "page");
        ctx.content_types.save(&scope, &mut ct).unwrap();
        let mut doc = Document::new_at_root("Home", Arc::new(ct));
        for _ in 0..3 {
            doc.publish();
            repo.save(&scope, &mut doc).unwrap();
        }
        scope.complete().unwrap();
        (db, doc.id())
    }

    #[test]
    fn test_cleanup_versions_deletes_stale_history() {
        let (mut db, _) = seeded();
        assert_eq!(cleanup_versions(&mut db, 0, true).unwrap(), 0);
        assert_eq!(cleanup_versions(&mut db, 0, false).unwrap(), 2);
        assert_eq!(cleanup_versions(&mut db, 0, false).unwrap(), 0);
    }

    #[test]
    fn test_renormalize_edited_by_alias() {
        let (mut db, _) = seeded();
        let summary = renormalize_edited(&mut db, "page").unwrap();
        assert_eq!(summary.edited_documents, 0);
        assert!(renormalize_edited(&mut db, "missing").is_err());
    }
}
