//! Media persistence: one version per item, updated in place

use crate::assembler::{assemble, VersionRef};
use crate::chunk::{in_groups, int_values, placeholders};
use crate::error::{Result, StoreError};
use crate::models::content::Media;
use crate::models::object_type::{ObjectType, MEDIA_RECYCLE_BIN_ID};
use crate::notifications::NotificationKind;
use crate::property_data::{replace_rows, rows_from_properties};
use crate::query::{content_query, fetch_id_page, prepare_page, ContentFilter, Ordering, Page};
use crate::repositories::content_base::{
    create_version, delete_tree, insert_content, load_base_rows, load_version_names, move_content,
    sanitize_names, to_base, touch_version, write_tags, write_version_names,
};
use crate::repositories::language::Languages;
use crate::repositories::{effective_page_size, RepositoryContext};
use crate::tree;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub struct MediaRepository {
    ctx: Arc<RepositoryContext>,
}

impl MediaRepository {
    pub fn new(ctx: Arc<RepositoryContext>) -> Self {
        Self { ctx }
    }

    pub fn get(&self, conn: &Connection, id: i32) -> Result<Option<Media>> {
        Ok(self.get_many(conn, &[id])?.into_iter().next())
    }

    pub fn get_by_key(&self, conn: &Connection, key: Uuid) -> Result<Option<Media>> {
        match tree::get_node_by_key(conn, key)? {
            Some(node) if node.object_type == ObjectType::Media => self.get(conn, node.id),
            _ => Ok(None),
        }
    }

    pub fn get_many(&self, conn: &Connection, ids: &[i32]) -> Result<Vec<Media>> {
        let max = self.ctx.config.max_parameter_count;
        let rows = load_base_rows(conn, ObjectType::Media, ids, max)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let languages = Languages::load(conn)?;
        let version_ids: Vec<i32> = rows.iter().map(|r| r.version_id).collect();
        let mut paths = load_paths(conn, &version_ids, max)?;
        let mut names = load_version_names(conn, &version_ids, &languages, max)?;

        let mut refs = Vec::with_capacity(rows.len());
        for row in &rows {
            refs.push(VersionRef {
                node_id: row.node.id,
                draft_version_id: row.version_id,
                published_version_id: 0,
                content_type: self.ctx.content_types.require(conn, row.content_type_id)?,
            });
        }
        let mut properties = assemble(conn, &refs, &languages, &self.ctx.config)?;
        Ok(rows
            .iter()
            .zip(refs)
            .map(|(row, item)| {
                let mut content = to_base(row, item.content_type, names.remove(&row.version_id).unwrap_or_default());
                if let Some(props) = properties.remove(&row.node.id) {
                    content.properties = props;
                }
                Media {
                    content,
                    media_path: paths.remove(&row.version_id).flatten(),
                }
            })
            .collect())
    }

    pub fn get_page(
        &self,
        conn: &Connection,
        filter: &ContentFilter,
        ordering: &Ordering,
        page_index: u64,
        page_size: u64,
    ) -> Result<Page<Media>> {
        let page_size = effective_page_size(&self.ctx.config, page_size);
        let query = prepare_page(
            content_query(ObjectType::Media),
            filter,
            ordering,
            page_index,
            page_size,
            self.ctx.config.max_parameter_count,
        )?;
        let ids = fetch_id_page(conn, &query, page_index, page_size)?;
        Ok(Page {
            items: self.get_many(conn, &ids.items)?,
            total: ids.total,
            page_index,
            page_size,
        })
    }

    pub fn save(&self, conn: &Connection, media: &mut Media) -> Result<()> {
        let languages = Languages::load(conn)?;
        sanitize_names(conn, ObjectType::Media, &mut media.content, &languages)?;
        media.content.update_date = Utc::now();

        if media.content.has_identity() {
            let version_id: i32 = conn.query_row(
                "SELECT id FROM content_version WHERE node_id = ?1 AND current = 1",
                params![media.content.id],
                |r| r.get(0),
            )?;
            media.content.version_id = version_id;
            tree::update_node_text(conn, media.content.id, media.content.name.as_deref())?;
            touch_version(conn, version_id, &media.content)?;
            conn.execute(
                "UPDATE media_version SET path = ?2 WHERE id = ?1",
                params![version_id, media.media_path],
            )?;
        } else {
            insert_content(conn, ObjectType::Media, &mut media.content)?;
            let version_id = create_version(conn, &media.content, true)?;
            conn.execute(
                "INSERT INTO media_version (id, path) VALUES (?1, ?2)",
                params![version_id, media.media_path],
            )?;
            media.content.version_id = version_id;
        }

        let rows = rows_from_properties(&media.content.properties, &languages, false)?;
        replace_rows(conn, media.content.version_id, &rows)?;
        write_version_names(conn, media.content.version_id, &media.content, &languages)?;
        write_tags(conn, &media.content, &languages)?;
        self.ctx.relations.persist_relations(
            conn,
            media.content.id,
            &media.content.properties,
            self.ctx.config.max_parameter_count,
        )?;
        self.ctx
            .notify(NotificationKind::Saved, ObjectType::Media, &media.content, None);
        Ok(())
    }

    pub fn move_to(&self, conn: &Connection, media: &mut Media, parent_id: i32) -> Result<Vec<i32>> {
        let moved = move_content(conn, &mut media.content, parent_id)?;
        self.ctx
            .notify(NotificationKind::Moved, ObjectType::Media, &media.content, None);
        Ok(moved)
    }

    pub fn move_to_recycle_bin(&self, conn: &Connection, media: &mut Media) -> Result<Vec<i32>> {
        self.move_to(conn, media, MEDIA_RECYCLE_BIN_ID)
    }

    pub fn delete(&self, conn: &Connection, id: i32) -> Result<Vec<i32>> {
        match tree::get_node(conn, id)? {
            Some(node) if node.object_type == ObjectType::Media => {}
            _ => return Err(StoreError::not_found("Media", id)),
        }
        let deleted = delete_tree(conn, id)?;
        self.ctx.notify_deleted(ObjectType::Media, &deleted);
        Ok(deleted.iter().map(|n| n.id).collect())
    }
}

fn load_paths(conn: &Connection, version_ids: &[i32], max_parameters: usize) -> Result<HashMap<i32, Option<String>>> {
    let mut paths = HashMap::with_capacity(version_ids.len());
    for group in in_groups(version_ids, max_parameters, 0) {
        let sql = format!("SELECT id, path FROM media_version WHERE id IN ({})", placeholders(group.len()));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(int_values(group)), |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<std::result::Result<Vec<(i32, Option<String>)>, _>>()?;
        paths.extend(rows);
    }
    Ok(paths)
}
