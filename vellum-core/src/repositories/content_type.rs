//! Content type persistence and the schema cache
//!
//! Saving a content type persists its node, property types, compositions
//! and allowed children, migrates stored data when variation flags change,
//! then clears the cache unconditionally and notifies the invalidator.

use crate::chunk::{in_groups, int_values, placeholders};
use crate::config::EngineConfig;
use crate::error::{Result, StoreError};
use crate::models::content_type::{ContentType, PropertyType, ValueStorageType};
use crate::models::node::parse_key;
use crate::models::object_type::ObjectType;
use crate::models::variation::ContentVariation;
use crate::notifications::{CacheInvalidator, CacheScope, NullNotifications};
use crate::property_data::delete_for_property_types;
use crate::tree::{self, NewNode};
use crate::variation::{self, composer_ids, composition_ids, MigrationReport};
use chrono::Utc;
use lru::LruCache;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const PROPERTY_TYPE_COLUMNS: &str = "id, unique_id, content_type_id, alias, name, editor_alias, \
     value_storage, mandatory, variations, sort_order, tag_group";

fn read_property_type(row: &Row<'_>) -> Result<PropertyType> {
    let key: String = row.get(1)?;
    let storage: String = row.get(6)?;
    Ok(PropertyType {
        id: row.get(0)?,
        key: parse_key(&key)?,
        content_type_id: row.get(2)?,
        alias: row.get(3)?,
        name: row.get(4)?,
        editor_alias: row.get(5)?,
        storage: ValueStorageType::parse(&storage)?,
        mandatory: row.get(7)?,
        variations: ContentVariation::from_bits(row.get(8)?),
        sort_order: row.get(9)?,
        tag_group: row.get(10)?,
    })
}

/// Property types by id, in chunks.
pub fn property_types_by_ids(conn: &Connection, ids: &[i32], max_parameters: usize) -> Result<Vec<PropertyType>> {
    let mut result = Vec::with_capacity(ids.len());
    for group in in_groups(ids, max_parameters, 0) {
        let sql = format!(
            "SELECT {} FROM property_type WHERE id IN ({}) ORDER BY id",
            PROPERTY_TYPE_COLUMNS,
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(int_values(group)))?;
        while let Some(row) = rows.next()? {
            result.push(read_property_type(row)?);
        }
    }
    Ok(result)
}

fn property_types_of(conn: &Connection, content_type_ids: &[i32], max_parameters: usize) -> Result<Vec<PropertyType>> {
    let mut result = Vec::new();
    for group in in_groups(content_type_ids, max_parameters, 0) {
        let sql = format!(
            "SELECT {} FROM property_type WHERE content_type_id IN ({}) ORDER BY content_type_id, sort_order, id",
            PROPERTY_TYPE_COLUMNS,
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(int_values(group)))?;
        while let Some(row) = rows.next()? {
            result.push(read_property_type(row)?);
        }
    }
    Ok(result)
}

fn is_type_object(object_type: ObjectType) -> bool {
    matches!(
        object_type,
        ObjectType::DocumentType | ObjectType::MediaType | ObjectType::MemberType
    )
}

/// Content, media and member types with an LRU cache in front.
pub struct ContentTypeRepository {
    config: EngineConfig,
    cache: Mutex<LruCache<i32, Arc<ContentType>>>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl ContentTypeRepository {
    pub fn new(config: EngineConfig) -> Self {
        let capacity = NonZeroUsize::new(config.content_type_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            invalidator: Arc::new(NullNotifications),
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Load a content type by id, from the cache when possible.
    pub fn get(&self, conn: &Connection, id: i32) -> Result<Option<Arc<ContentType>>> {
        if let Some(cached) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(&id) {
            return Ok(Some(Arc::clone(cached)));
        }
        let Some(loaded) = self.load_uncached(conn, id)? else {
            return Ok(None);
        };
        let loaded = Arc::new(loaded);
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(id, Arc::clone(&loaded));
        Ok(Some(loaded))
    }

    pub fn require(&self, conn: &Connection, id: i32) -> Result<Arc<ContentType>> {
        self.get(conn, id)?
            .ok_or_else(|| StoreError::not_found("ContentType", id))
    }

    pub fn get_by_key(&self, conn: &Connection, key: Uuid) -> Result<Option<Arc<ContentType>>> {
        let id: Option<i32> = conn
            .query_row(
                "SELECT ct.node_id FROM content_type ct JOIN node n ON n.id = ct.node_id WHERE n.unique_id = ?1",
                params![key.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get(conn, id),
            None => Ok(None),
        }
    }

    pub fn get_by_alias(&self, conn: &Connection, object_type: ObjectType, alias: &str) -> Result<Option<Arc<ContentType>>> {
        let id: Option<i32> = conn
            .query_row(
                "SELECT ct.node_id FROM content_type ct JOIN node n ON n.id = ct.node_id \
                 WHERE ct.alias = ?1 COLLATE NOCASE AND n.node_object_type = ?2",
                params![alias, object_type.tag()],
                |r| r.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get(conn, id),
            None => Ok(None),
        }
    }

    /// Every type of one object type, ordered by alias.
    pub fn get_all(&self, conn: &Connection, object_type: ObjectType) -> Result<Vec<Arc<ContentType>>> {
        let mut stmt = conn.prepare_cached(
            "SELECT ct.node_id FROM content_type ct JOIN node n ON n.id = ct.node_id \
             WHERE n.node_object_type = ?1 ORDER BY ct.alias",
        )?;
        let ids = stmt
            .query_map(params![object_type.tag()], |r| r.get::<_, i32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut all = Vec::with_capacity(ids.len());
        for id in ids {
            all.push(self.require(conn, id)?);
        }
        Ok(all)
    }

    /// Read a content type straight from the database.
    pub fn load_uncached(&self, conn: &Connection, id: i32) -> Result<Option<ContentType>> {
        let row = conn
            .query_row(
                "SELECT n.unique_id, n.parent_id, n.text, n.node_object_type, ct.alias, ct.icon, ct.is_element, ct.variations \
                 FROM content_type ct JOIN node n ON n.id = ct.node_id WHERE ct.node_id = ?1",
                params![id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, i32>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, Option<String>>(5)?,
                        r.get::<_, bool>(6)?,
                        r.get::<_, i64>(7)?,
                    ))
                },
            )
            .optional()?;
        let Some((key, parent_id, name, tag, alias, icon, is_element, variations)) = row else {
            return Ok(None);
        };

        let max = self.config.max_parameter_count;
        let property_types = property_types_of(conn, &[id], max)?;

        let mut stmt = conn.prepare_cached(
            "SELECT parent_content_type_id FROM content_type_composition \
             WHERE child_content_type_id = ?1 ORDER BY parent_content_type_id",
        )?;
        let direct_compositions = stmt
            .query_map(params![id], |r| r.get::<_, i32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare_cached(
            "SELECT allowed_id FROM content_type_allowed WHERE content_type_id = ?1 ORDER BY sort_order, allowed_id",
        )?;
        let allowed_child_ids = stmt
            .query_map(params![id], |r| r.get::<_, i32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let composed_property_types = property_types_of(conn, &composition_ids(conn, id)?, max)?;

        Ok(Some(ContentType {
            id,
            key: parse_key(&key)?,
            object_type: ObjectType::from_tag(&tag)?,
            parent_id,
            name: name.unwrap_or_else(|| alias.clone()),
            alias,
            icon,
            is_element,
            variations: ContentVariation::from_bits(variations),
            property_types,
            composition_ids: direct_compositions,
            allowed_child_ids,
            composed_property_types,
        }))
    }

    /// Insert or update a content type. Returns the migration report when
    /// an existing type was updated.
    pub fn save(&self, conn: &Connection, content_type: &mut ContentType) -> Result<Option<MigrationReport>> {
        if !is_type_object(content_type.object_type) {
            return Err(StoreError::UnexpectedObjectType(format!(
                "{:?} is not a content type kind",
                content_type.object_type
            )));
        }
        self.ensure_unique_aliases(conn, content_type)?;
        let previous = if content_type.has_identity() {
            Some(
                self.load_uncached(conn, content_type.id)?
                    .ok_or_else(|| StoreError::not_found("ContentType", content_type.id))?,
            )
        } else {
            None
        };

        if let Some(previous) = &previous {
            let coerced = content_type.coerce_property_variations(previous.variations);
            if !coerced.is_empty() {
                tracing::info!(
                    "Coerced variations of {:?} down to those of content type '{}'",
                    coerced,
                    content_type.alias
                );
            }
        }
        content_type.validate_variations()?;

        match &previous {
            None => {
                let node = tree::insert_node(
                    conn,
                    &NewNode {
                        key: content_type.key,
                        parent_id: content_type.parent_id,
                        object_type: content_type.object_type,
                        text: Some(&content_type.name),
                        user_id: None,
                        create_date: Utc::now(),
                    },
                )?;
                content_type.id = node.id;
                conn.execute(
                    "INSERT INTO content_type (node_id, alias, icon, is_element, variations) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        content_type.id,
                        content_type.alias,
                        content_type.icon,
                        content_type.is_element,
                        content_type.variations.bits()
                    ],
                )?;
            }
            Some(_) => {
                tree::update_node_text(conn, content_type.id, Some(&content_type.name))?;
                conn.execute(
                    "UPDATE content_type SET alias = ?2, icon = ?3, is_element = ?4, variations = ?5 WHERE node_id = ?1",
                    params![
                        content_type.id,
                        content_type.alias,
                        content_type.icon,
                        content_type.is_element,
                        content_type.variations.bits()
                    ],
                )?;
            }
        }

        self.save_property_types(conn, content_type, previous.as_ref())?;
        self.save_compositions(conn, content_type)?;
        conn.execute(
            "DELETE FROM content_type_allowed WHERE content_type_id = ?1",
            params![content_type.id],
        )?;
        for (sort_order, allowed_id) in content_type.allowed_child_ids.iter().enumerate() {
            conn.execute(
                "INSERT INTO content_type_allowed (content_type_id, allowed_id, sort_order) VALUES (?1, ?2, ?3)",
                params![content_type.id, allowed_id, sort_order as i32],
            )?;
        }
        content_type.composed_property_types =
            property_types_of(conn, &composition_ids(conn, content_type.id)?, self.config.max_parameter_count)?;

        let report = match &previous {
            Some(previous) => Some(variation::migrate(conn, previous, content_type, &self.config)?),
            None => None,
        };

        self.clear_cache();
        let mut touched = vec![content_type.id];
        if let Some(report) = &report {
            touched = report.impacted_content_types.clone();
        }
        self.invalidator.invalidate(CacheScope::ContentTypes, &touched);
        tracing::debug!("Saved content type {} ({})", content_type.alias, content_type.id);
        Ok(report)
    }

    fn ensure_unique_aliases(&self, conn: &Connection, content_type: &ContentType) -> Result<()> {
        let clash: Option<i32> = conn
            .query_row(
                "SELECT ct.node_id FROM content_type ct JOIN node n ON n.id = ct.node_id \
                 WHERE ct.alias = ?1 COLLATE NOCASE AND n.node_object_type = ?2 AND ct.node_id <> ?3",
                params![content_type.alias, content_type.object_type.tag(), content_type.id],
                |r| r.get(0),
            )
            .optional()?;
        if clash.is_some() {
            return Err(StoreError::DuplicateAlias(content_type.alias.clone()));
        }
        let mut seen = HashSet::new();
        for pt in &content_type.property_types {
            if !seen.insert(pt.alias.to_lowercase()) {
                return Err(StoreError::DuplicateAlias(pt.alias.clone()));
            }
        }
        Ok(())
    }

    fn save_property_types(
        &self,
        conn: &Connection,
        content_type: &mut ContentType,
        previous: Option<&ContentType>,
    ) -> Result<()> {
        let id = content_type.id;
        for pt in &mut content_type.property_types {
            pt.content_type_id = id;
            if pt.has_identity() {
                conn.execute(
                    "UPDATE property_type SET alias = ?2, name = ?3, editor_alias = ?4, value_storage = ?5, \
                     mandatory = ?6, variations = ?7, sort_order = ?8, tag_group = ?9, content_type_id = ?10 WHERE id = ?1",
                    params![
                        pt.id,
                        pt.alias,
                        pt.name,
                        pt.editor_alias,
                        pt.storage.as_str(),
                        pt.mandatory,
                        pt.variations.bits(),
                        pt.sort_order,
                        pt.tag_group,
                        id
                    ],
                )?;
            } else {
                conn.execute(
                    "INSERT INTO property_type (unique_id, content_type_id, alias, name, editor_alias, value_storage, \
                     mandatory, variations, sort_order, tag_group) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        pt.key.to_string(),
                        id,
                        pt.alias,
                        pt.name,
                        pt.editor_alias,
                        pt.storage.as_str(),
                        pt.mandatory,
                        pt.variations.bits(),
                        pt.sort_order,
                        pt.tag_group
                    ],
                )?;
                pt.id = conn.last_insert_rowid() as i32;
            }
        }

        let Some(previous) = previous else {
            return Ok(());
        };
        let kept: HashSet<i32> = content_type.property_types.iter().map(|p| p.id).collect();
        let removed: Vec<i32> = previous
            .property_types
            .iter()
            .map(|p| p.id)
            .filter(|id| !kept.contains(id))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }
        let max = self.config.max_parameter_count;
        delete_for_property_types(conn, &removed, max)?;
        for group in in_groups(&removed, max, 0) {
            let list = placeholders(group.len());
            conn.execute(
                &format!("DELETE FROM tag_relationship WHERE property_type_id IN ({})", list),
                params_from_iter(int_values(group)),
            )?;
            conn.execute(
                &format!("DELETE FROM property_type WHERE id IN ({})", list),
                params_from_iter(int_values(group)),
            )?;
        }
        tracing::info!(
            "Removed {} property type(s) and their data from content type {}",
            removed.len(),
            id
        );
        Ok(())
    }

    fn save_compositions(&self, conn: &Connection, content_type: &ContentType) -> Result<()> {
        let composers: HashSet<i32> = composer_ids(conn, content_type.id)?.into_iter().collect();
        for composed in &content_type.composition_ids {
            if *composed == content_type.id || composers.contains(composed) {
                return Err(StoreError::InvariantViolation(format!(
                    "composing {} into {} would create a cycle",
                    composed, content_type.id
                )));
            }
        }
        conn.execute(
            "DELETE FROM content_type_composition WHERE child_content_type_id = ?1",
            params![content_type.id],
        )?;
        for composed in &content_type.composition_ids {
            conn.execute(
                "INSERT INTO content_type_composition (parent_content_type_id, child_content_type_id) VALUES (?1, ?2)",
                params![composed, content_type.id],
            )?;
        }
        Ok(())
    }

    /// Delete an unused content type.
    pub fn delete(&self, conn: &Connection, id: i32) -> Result<()> {
        let in_use: i64 = conn.query_row(
            "SELECT COUNT(*) FROM content WHERE content_type_id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        if in_use > 0 {
            return Err(StoreError::InvariantViolation(format!(
                "content type {} is used by {} item(s)",
                id, in_use
            )));
        }
        let composers = composer_ids(conn, id)?;
        if !composers.is_empty() {
            return Err(StoreError::InvariantViolation(format!(
                "content type {} is composed by {:?}",
                id, composers
            )));
        }
        conn.execute("DELETE FROM property_type WHERE content_type_id = ?1", params![id])?;
        conn.execute(
            "DELETE FROM content_type_allowed WHERE content_type_id = ?1 OR allowed_id = ?1",
            params![id],
        )?;
        conn.execute(
            "DELETE FROM content_type_composition WHERE child_content_type_id = ?1",
            params![id],
        )?;
        conn.execute("DELETE FROM content_type WHERE node_id = ?1", params![id])?;
        conn.execute("DELETE FROM node WHERE id = ?1", params![id])?;
        self.clear_cache();
        self.invalidator.invalidate(CacheScope::ContentTypes, &[id]);
        tracing::info!("Deleted content type {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::notifications::RecordingPublisher;

    fn page_type() -> ContentType {
        ContentType::new(ObjectType::DocumentType, "page")
            .with_property(PropertyType::new("title", "textbox", ValueStorageType::Nvarchar))
            .with_property(PropertyType::new("body", "richText", ValueStorageType::Ntext))
    }

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let repo = ContentTypeRepository::new(EngineConfig::default());
        let mut ct = page_type();
        assert!(repo.save(db.connection(), &mut ct).unwrap().is_none());
        assert!(ct.id > 0);
        let loaded = repo.require(db.connection(), ct.id).unwrap();
        assert_eq!(loaded.alias, "page");
        assert_eq!(loaded.property_types.len(), 2);
        assert_eq!(loaded.property_types[0].alias, "title");
        assert!(loaded.property_types.iter().all(|p| p.id > 0));
        let by_alias = repo
            .get_by_alias(db.connection(), ObjectType::DocumentType, "PAGE")
            .unwrap()
            .unwrap();
        assert_eq!(by_alias.id, ct.id);
        let by_key = repo.get_by_key(db.connection(), ct.key).unwrap().unwrap();
        assert_eq!(by_key.id, ct.id);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let repo = ContentTypeRepository::new(EngineConfig::default());
        repo.save(db.connection(), &mut page_type()).unwrap();
        let err = repo.save(db.connection(), &mut page_type()).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAlias(_)));
        // same alias for another object type is fine
        let mut media = ContentType::new(ObjectType::MediaType, "page");
        repo.save(db.connection(), &mut media).unwrap();
    }

    #[test]
    fn test_cache_cleared_and_invalidator_called() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let recorder = Arc::new(RecordingPublisher::new());
        let repo = ContentTypeRepository::new(EngineConfig::default()).with_invalidator(recorder.clone());
        let mut ct = page_type();
        repo.save(db.connection(), &mut ct).unwrap();
        let first = repo.require(db.connection(), ct.id).unwrap();
        ct.name = "Landing page".to_string();
        repo.save(db.connection(), &mut ct).unwrap();
        let second = repo.require(db.connection(), ct.id).unwrap();
        assert_eq!(first.name, "page");
        assert_eq!(second.name, "Landing page");
        assert_eq!(recorder.invalidations().len(), 2);
    }

    #[test]
    fn test_compositions_resolve_transitively() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let repo = ContentTypeRepository::new(EngineConfig::default());
        let mut seo = ContentType::new(ObjectType::DocumentType, "seo")
            .with_property(PropertyType::new("metaTitle", "textbox", ValueStorageType::Nvarchar));
        repo.save(conn, &mut seo).unwrap();
        let mut base = ContentType::new(ObjectType::DocumentType, "base");
        base.composition_ids = vec![seo.id];
        repo.save(conn, &mut base).unwrap();
        let mut page = page_type();
        page.composition_ids = vec![base.id];
        repo.save(conn, &mut page).unwrap();

        let loaded = repo.require(conn, page.id).unwrap();
        assert!(loaded.find_property_type("metaTitle").is_some());
        assert_eq!(loaded.composition_ids, vec![base.id]);

        // seo composing page would close a cycle
        let mut seo = repo.load_uncached(conn, seo.id).unwrap().unwrap();
        seo.composition_ids = vec![page.id];
        assert!(matches!(
            repo.save(conn, &mut seo),
            Err(StoreError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_removed_property_type_data_deleted() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let repo = ContentTypeRepository::new(EngineConfig::default());
        let mut ct = page_type();
        repo.save(conn, &mut ct).unwrap();
        let body_id = ct.find_property_type("body").unwrap().id;
        ct.remove_property_type("body");
        repo.save(conn, &mut ct).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM property_type WHERE id = ?1", params![body_id], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_shrinking_type_coerces_properties() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let repo = ContentTypeRepository::new(EngineConfig::default());
        let mut ct = ContentType::new(ObjectType::DocumentType, "article")
            .with_variations(ContentVariation::CULTURE)
            .with_property(
                PropertyType::new("title", "textbox", ValueStorageType::Nvarchar)
                    .with_variations(ContentVariation::CULTURE),
            );
        repo.save(db.connection(), &mut ct).unwrap();
        ct.variations = ContentVariation::NOTHING;
        let report = repo.save(db.connection(), &mut ct).unwrap().unwrap();
        assert_eq!(report.names, Some(variation::CultureTransition::Disabled));
        let loaded = repo.require(db.connection(), ct.id).unwrap();
        assert_eq!(loaded.property_types[0].variations, ContentVariation::NOTHING);
    }

    #[test]
    fn test_save_rejects_property_wider_than_type() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let repo = ContentTypeRepository::new(EngineConfig::default());
        let mut ct = ContentType::new(ObjectType::DocumentType, "article").with_property(
            PropertyType::new("title", "textbox", ValueStorageType::Nvarchar)
                .with_variations(ContentVariation::CULTURE),
        );
        let err = repo.save(conn, &mut ct).unwrap_err();
        assert!(matches!(err, StoreError::VariationMismatch { .. }));
        assert!(repo.get_by_alias(conn, ObjectType::DocumentType, "article").unwrap().is_none());

        // an existing type whose flags stay put is not coerced either
        ct.property_type_mut("title").unwrap().variations = ContentVariation::NOTHING;
        repo.save(conn, &mut ct).unwrap();
        ct.property_type_mut("title").unwrap().variations = ContentVariation::CULTURE;
        let err = repo.save(conn, &mut ct).unwrap_err();
        assert!(matches!(err, StoreError::VariationMismatch { .. }));
        let stored = repo.load_uncached(conn, ct.id).unwrap().unwrap();
        assert_eq!(stored.property_types[0].variations, ContentVariation::NOTHING);
    }

    #[test]
    fn test_delete_rejects_types_in_use() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let repo = ContentTypeRepository::new(EngineConfig::default());
        let mut ct = page_type();
        repo.save(conn, &mut ct).unwrap();
        conn.execute_batch(&format!(
            "INSERT INTO node (id, unique_id, parent_id, level, path, sort_order, node_object_type, create_date)
                VALUES (500, 'k500', -1, 1, '-1,500', 9, 'x', '2024-01-01T00:00:00Z');
             INSERT INTO content (node_id, content_type_id) VALUES (500, {});",
            ct.id
        ))
        .unwrap();
        assert!(matches!(repo.delete(conn, ct.id), Err(StoreError::InvariantViolation(_))));
        conn.execute("DELETE FROM content WHERE node_id = 500", []).unwrap();
        repo.delete(conn, ct.id).unwrap();
        assert!(repo.get(conn, ct.id).unwrap().is_none());
    }
}
