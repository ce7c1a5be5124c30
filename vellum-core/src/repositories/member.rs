//! Member persistence: single-version content plus login details

use crate::assembler::{assemble, VersionRef};
use crate::chunk::{in_groups, int_values, placeholders};
use crate::error::{Result, StoreError};
use crate::models::content::Member;
use crate::models::object_type::ObjectType;
use crate::notifications::NotificationKind;
use crate::property_data::{replace_rows, rows_from_properties};
use crate::query::{content_query, fetch_id_page, prepare_page, ContentFilter, Ordering, Page};
use crate::repositories::content_base::{
    create_version, delete_tree, insert_content, load_base_rows, load_version_names, sanitize_names, to_base,
    touch_version, write_tags, write_version_names,
};
use crate::repositories::language::Languages;
use crate::repositories::{effective_page_size, RepositoryContext};
use crate::tree;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Arc;

struct Login {
    email: String,
    username: String,
    password_hash: Option<String>,
}

pub struct MemberRepository {
    ctx: Arc<RepositoryContext>,
}

impl MemberRepository {
    pub fn new(ctx: Arc<RepositoryContext>) -> Self {
        Self { ctx }
    }

    pub fn get(&self, conn: &Connection, id: i32) -> Result<Option<Member>> {
        Ok(self.get_many(conn, &[id])?.into_iter().next())
    }

    /// Login names compare case-insensitively.
    pub fn get_by_username(&self, conn: &Connection, username: &str) -> Result<Option<Member>> {
        let id: Option<i32> = conn
            .query_row(
                "SELECT node_id FROM member WHERE login_name = ?1",
                params![username],
                |r| r.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get(conn, id),
            None => Ok(None),
        }
    }

    pub fn get_many(&self, conn: &Connection, ids: &[i32]) -> Result<Vec<Member>> {
        let max = self.ctx.config.max_parameter_count;
        let rows = load_base_rows(conn, ObjectType::Member, ids, max)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let languages = Languages::load(conn)?;
        let node_ids: Vec<i32> = rows.iter().map(|r| r.node.id).collect();
        let version_ids: Vec<i32> = rows.iter().map(|r| r.version_id).collect();
        let mut logins = load_logins(conn, &node_ids, max)?;
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

        let mut members = Vec::with_capacity(rows.len());
        for (row, item) in rows.iter().zip(refs) {
            let login = logins
                .remove(&row.node.id)
                .ok_or_else(|| StoreError::Corrupt(format!("member {} has no member row", row.node.id)))?;
            let mut content = to_base(row, item.content_type, names.remove(&row.version_id).unwrap_or_default());
            if let Some(props) = properties.remove(&row.node.id) {
                content.properties = props;
            }
            members.push(Member {
                content,
                email: login.email,
                username: login.username,
                password_hash: login.password_hash,
            });
        }
        Ok(members)
    }

    pub fn get_page(
        &self,
        conn: &Connection,
        filter: &ContentFilter,
        ordering: &Ordering,
        page_index: u64,
        page_size: u64,
    ) -> Result<Page<Member>> {
        let page_size = effective_page_size(&self.ctx.config, page_size);
        let query = prepare_page(
            content_query(ObjectType::Member),
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

    /// Persist a member. Names are not made unique among members; login
    /// names must be.
    pub fn save(&self, conn: &Connection, member: &mut Member) -> Result<()> {
        let languages = Languages::load(conn)?;
        ensure_login_available(conn, &member.username, member.content.id)?;
        if member.content.varies_by_culture() {
            sanitize_names(conn, ObjectType::Member, &mut member.content, &languages)?;
        } else {
            let name = member.content.name.as_deref().map(str::trim).unwrap_or_default().to_string();
            if name.is_empty() {
                return Err(StoreError::EmptyName { id: member.content.id });
            }
            member.content.name = Some(name);
        }
        member.content.update_date = Utc::now();

        if member.content.has_identity() {
            let version_id: i32 = conn.query_row(
                "SELECT id FROM content_version WHERE node_id = ?1 AND current = 1",
                params![member.content.id],
                |r| r.get(0),
            )?;
            member.content.version_id = version_id;
            tree::update_node_text(conn, member.content.id, member.content.name.as_deref())?;
            touch_version(conn, version_id, &member.content)?;
            conn.execute(
                "UPDATE member SET email = ?2, login_name = ?3, password = ?4 WHERE node_id = ?1",
                params![member.content.id, member.email, member.username, member.password_hash],
            )?;
        } else {
            insert_content(conn, ObjectType::Member, &mut member.content)?;
            conn.execute(
                "INSERT INTO member (node_id, email, login_name, password) VALUES (?1, ?2, ?3, ?4)",
                params![member.content.id, member.email, member.username, member.password_hash],
            )?;
            member.content.version_id = create_version(conn, &member.content, true)?;
        }

        let rows = rows_from_properties(&member.content.properties, &languages, false)?;
        replace_rows(conn, member.content.version_id, &rows)?;
        write_version_names(conn, member.content.version_id, &member.content, &languages)?;
        write_tags(conn, &member.content, &languages)?;
        self.ctx.relations.persist_relations(
            conn,
            member.content.id,
            &member.content.properties,
            self.ctx.config.max_parameter_count,
        )?;
        self.ctx
            .notify(NotificationKind::Saved, ObjectType::Member, &member.content, None);
        Ok(())
    }

    pub fn delete(&self, conn: &Connection, id: i32) -> Result<()> {
        match tree::get_node(conn, id)? {
            Some(node) if node.object_type == ObjectType::Member => {}
            _ => return Err(StoreError::not_found("Member", id)),
        }
        let deleted = delete_tree(conn, id)?;
        self.ctx.notify_deleted(ObjectType::Member, &deleted);
        Ok(())
    }
}

fn ensure_login_available(conn: &Connection, username: &str, own_id: i32) -> Result<()> {
    if username.trim().is_empty() {
        return Err(StoreError::InvariantViolation("member login name is empty".to_string()));
    }
    let taken: Option<i32> = conn
        .query_row(
            "SELECT node_id FROM member WHERE login_name = ?1 AND node_id <> ?2",
            params![username, own_id],
            |r| r.get(0),
        )
        .optional()?;
    match taken {
        Some(_) => Err(StoreError::DuplicateAlias(username.to_string())),
        None => Ok(()),
    }
}

fn load_logins(conn: &Connection, node_ids: &[i32], max_parameters: usize) -> Result<HashMap<i32, Login>> {
    let mut logins = HashMap::with_capacity(node_ids.len());
    for group in in_groups(node_ids, max_parameters, 0) {
        let sql = format!(
            "SELECT node_id, email, login_name, password FROM member WHERE node_id IN ({})",
            placeholders(group.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(int_values(group)))?;
        while let Some(row) = rows.next()? {
            logins.insert(
                row.get::<_, i32>(0)?,
                Login {
                    email: row.get(1)?,
                    username: row.get(2)?,
                    password_hash: row.get(3)?,
                },
            );
        }
    }
    Ok(logins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::database::Database;
    use crate::models::content_type::ContentType;

    fn setup(conn: &Connection) -> (MemberRepository, Arc<ContentType>) {
        let ctx = RepositoryContext::new(EngineConfig::default()).into_shared();
        let mut ct = ContentType::new(ObjectType::MemberType, "member");
        ctx.content_types.save(conn, &mut ct).unwrap();
        let ct = ctx.content_types.require(conn, ct.id).unwrap();
        (MemberRepository::new(ctx), ct)
    }

    #[test]
    fn test_member_round_trip() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (repo, ct) = setup(conn);
        let mut member = Member::new("Ada", "ada@example.com", "ada", ct);
        member.password_hash = Some("hash".to_string());
        repo.save(conn, &mut member).unwrap();

        let loaded = repo.get_by_username(conn, "ADA").unwrap().unwrap();
        assert_eq!(loaded.id(), member.id());
        assert_eq!(loaded.email, "ada@example.com");
        assert_eq!(loaded.password_hash.as_deref(), Some("hash"));
    }

    #[test]
    fn test_duplicate_login_rejected_but_names_may_repeat() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let (repo, ct) = setup(conn);
        let mut first = Member::new("Ada", "ada@example.com", "ada", Arc::clone(&ct));
        repo.save(conn, &mut first).unwrap();
        let mut clash = Member::new("Other", "other@example.com", "Ada", Arc::clone(&ct));
        assert!(matches!(repo.save(conn, &mut clash), Err(StoreError::DuplicateAlias(_))));

        let mut namesake = Member::new("Ada", "ada2@example.com", "ada2", ct);
        repo.save(conn, &mut namesake).unwrap();
        assert_eq!(namesake.content.name.as_deref(), Some("Ada"));
    }
}
