//! SQLite database handle, schema and the transactional scope
//!
//! The engine never commits on its own: callers open a [`Scope`] (an
//! IMMEDIATE transaction) and pass it to repository operations, which take
//! `&Connection` and therefore also work against a bare connection.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::object_type::{
    ObjectType, DOCUMENT_RECYCLE_BIN_ID, MEDIA_RECYCLE_BIN_ID, ROOT_ID,
};
use crate::models::relation::{RELATED_DOCUMENT_ALIAS, RELATED_MEDIA_ALIAS, RELATED_MEMBER_ALIAS};
use chrono::Utc;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::ops::Deref;
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS node (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unique_id TEXT NOT NULL,
    parent_id INTEGER NOT NULL,
    level INTEGER NOT NULL,
    path TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    trashed INTEGER NOT NULL DEFAULT 0,
    node_user INTEGER,
    text TEXT,
    node_object_type TEXT NOT NULL,
    create_date TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ix_node_unique_id ON node(unique_id);
CREATE INDEX IF NOT EXISTS ix_node_parent ON node(parent_id);
CREATE INDEX IF NOT EXISTS ix_node_tree ON node(node_object_type, level, parent_id, sort_order);

CREATE TABLE IF NOT EXISTS content_type (
    node_id INTEGER PRIMARY KEY REFERENCES node(id),
    alias TEXT NOT NULL,
    icon TEXT,
    is_element INTEGER NOT NULL DEFAULT 0,
    variations INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS content_type_composition (
    parent_content_type_id INTEGER NOT NULL REFERENCES content_type(node_id),
    child_content_type_id INTEGER NOT NULL REFERENCES content_type(node_id),
    PRIMARY KEY (parent_content_type_id, child_content_type_id)
);

CREATE TABLE IF NOT EXISTS content_type_allowed (
    content_type_id INTEGER NOT NULL REFERENCES content_type(node_id),
    allowed_id INTEGER NOT NULL REFERENCES content_type(node_id),
    sort_order INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (content_type_id, allowed_id)
);

CREATE TABLE IF NOT EXISTS property_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unique_id TEXT NOT NULL UNIQUE,
    content_type_id INTEGER NOT NULL REFERENCES content_type(node_id),
    alias TEXT NOT NULL,
    name TEXT NOT NULL,
    editor_alias TEXT NOT NULL,
    value_storage TEXT NOT NULL,
    mandatory INTEGER NOT NULL DEFAULT 0,
    variations INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER NOT NULL DEFAULT 0,
    tag_group TEXT
);
CREATE INDEX IF NOT EXISTS ix_property_type_content_type ON property_type(content_type_id);

CREATE TABLE IF NOT EXISTS language (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    iso_code TEXT NOT NULL UNIQUE COLLATE NOCASE,
    culture_name TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0,
    is_mandatory INTEGER NOT NULL DEFAULT 0,
    fallback_language_id INTEGER REFERENCES language(id)
);

CREATE TABLE IF NOT EXISTS content (
    node_id INTEGER PRIMARY KEY REFERENCES node(id),
    content_type_id INTEGER NOT NULL REFERENCES content_type(node_id)
);

CREATE TABLE IF NOT EXISTS content_version (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id INTEGER NOT NULL REFERENCES content(node_id),
    version_date TEXT NOT NULL,
    user_id INTEGER,
    current INTEGER NOT NULL,
    text TEXT,
    prevent_cleanup INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS ix_content_version_node ON content_version(node_id, current);

CREATE TABLE IF NOT EXISTS document (
    node_id INTEGER PRIMARY KEY REFERENCES content(node_id),
    published INTEGER NOT NULL DEFAULT 0,
    edited INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS document_version (
    id INTEGER PRIMARY KEY REFERENCES content_version(id),
    template_id INTEGER,
    published INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS media_version (
    id INTEGER PRIMARY KEY REFERENCES content_version(id),
    path TEXT
);

CREATE TABLE IF NOT EXISTS member (
    node_id INTEGER PRIMARY KEY REFERENCES content(node_id),
    email TEXT NOT NULL,
    login_name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password TEXT
);

CREATE TABLE IF NOT EXISTS property_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL REFERENCES content_version(id),
    property_type_id INTEGER NOT NULL REFERENCES property_type(id),
    language_id INTEGER REFERENCES language(id),
    segment TEXT,
    int_value INTEGER,
    decimal_value REAL,
    date_value TEXT,
    varchar_value TEXT,
    text_value TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS ix_property_data_key
    ON property_data(version_id, property_type_id, IFNULL(language_id, 0), IFNULL(segment, ''));
CREATE INDEX IF NOT EXISTS ix_property_data_type ON property_data(property_type_id);

CREATE TABLE IF NOT EXISTS content_version_culture_variation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL REFERENCES content_version(id),
    language_id INTEGER NOT NULL REFERENCES language(id),
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    user_id INTEGER,
    UNIQUE (version_id, language_id)
);

CREATE TABLE IF NOT EXISTS document_culture_variation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id INTEGER NOT NULL REFERENCES node(id),
    language_id INTEGER NOT NULL REFERENCES language(id),
    edited INTEGER NOT NULL DEFAULT 0,
    available INTEGER NOT NULL DEFAULT 0,
    published INTEGER NOT NULL DEFAULT 0,
    name TEXT,
    UNIQUE (node_id, language_id)
);

CREATE TABLE IF NOT EXISTS relation_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type_unique_id TEXT NOT NULL UNIQUE,
    alias TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    dual INTEGER NOT NULL DEFAULT 0,
    parent_object_type TEXT,
    child_object_type TEXT,
    is_dependency INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS relation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER NOT NULL REFERENCES node(id),
    child_id INTEGER NOT NULL REFERENCES node(id),
    rel_type INTEGER NOT NULL REFERENCES relation_type(id),
    datetime TEXT NOT NULL,
    comment TEXT
);
CREATE INDEX IF NOT EXISTS ix_relation_parent ON relation(parent_id, rel_type);
CREATE INDEX IF NOT EXISTS ix_relation_child ON relation(child_id);

CREATE TABLE IF NOT EXISTS tag (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag TEXT NOT NULL,
    tag_group TEXT NOT NULL,
    language_id INTEGER REFERENCES language(id)
);
CREATE UNIQUE INDEX IF NOT EXISTS ix_tag_key ON tag(tag, tag_group, IFNULL(language_id, 0));

CREATE TABLE IF NOT EXISTS tag_relationship (
    node_id INTEGER NOT NULL REFERENCES node(id),
    tag_id INTEGER NOT NULL REFERENCES tag(id),
    property_type_id INTEGER NOT NULL REFERENCES property_type(id),
    PRIMARY KEY (node_id, property_type_id, tag_id)
);

CREATE TABLE IF NOT EXISTS user_login (
    session_id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    logged_in_utc TEXT NOT NULL,
    last_validated_utc TEXT NOT NULL,
    logged_out_utc TEXT,
    ip_address TEXT
);
";

/// Language seeded into an empty store.
pub const DEFAULT_LANGUAGE_ISO: &str = "en-US";

/// Open database handle.
pub struct Database {
    conn: Connection,
    config: EngineConfig,
}

impl Database {
    /// Open (creating if needed) a database file and ensure the schema.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        tracing::debug!("Opened database at {:?}", path);
        let conn = configure(conn, &config, true)?;
        install_schema(&conn)?;
        Ok(Self { conn, config })
    }

    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        let conn = configure(Connection::open_in_memory()?, &config, false)?;
        install_schema(&conn)?;
        Ok(Self { conn, config })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Begin a write scope. The transaction takes the write lock up front.
    pub fn scope(&mut self) -> Result<Scope<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Scope { tx })
    }
}

fn configure(conn: Connection, config: &EngineConfig, on_disk: bool) -> Result<Connection> {
    if on_disk {
        conn.pragma_update_and_check(None, "journal_mode", &config.journal_mode, |_| Ok(()))?;
    }
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(conn)
}

/// Create tables and seed system rows. Idempotent.
pub fn install_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    let now = Utc::now();
    let roots = [
        (ROOT_ID, ROOT_ID, "-1", ObjectType::SystemRoot, "00000000-0000-0000-0000-000000000001"),
        (
            DOCUMENT_RECYCLE_BIN_ID,
            ROOT_ID,
            "-1,-20",
            ObjectType::DocumentRecycleBin,
            "00000000-0000-0000-0000-000000000020",
        ),
        (
            MEDIA_RECYCLE_BIN_ID,
            ROOT_ID,
            "-1,-21",
            ObjectType::MediaRecycleBin,
            "00000000-0000-0000-0000-000000000021",
        ),
    ];
    for (id, parent, path, object_type, key) in roots {
        conn.execute(
            "INSERT OR IGNORE INTO node (id, unique_id, parent_id, level, path, sort_order, trashed, text, node_object_type, create_date) \
             VALUES (?1, ?2, ?3, 0, ?4, 0, 0, ?5, ?6, ?7)",
            params![id, key, parent, path, format!("{:?}", object_type), object_type.tag(), now],
        )?;
    }
    let languages: i64 = conn.query_row("SELECT COUNT(*) FROM language", [], |r| r.get(0))?;
    if languages == 0 {
        conn.execute(
            "INSERT INTO language (iso_code, culture_name, is_default, is_mandatory) VALUES (?1, ?2, 1, 0)",
            params![DEFAULT_LANGUAGE_ISO, "English (United States)"],
        )?;
    }
    let relation_types = [
        (RELATED_DOCUMENT_ALIAS, "Related Document", ObjectType::Document, "4954ce93-3bf9-3d1e-9cd2-21bf9f9c2abf"),
        (RELATED_MEDIA_ALIAS, "Related Media", ObjectType::Media, "5a4e85f2-3ef3-41a8-a4d6-8f1c14ef3b35"),
        (RELATED_MEMBER_ALIAS, "Related Member", ObjectType::Member, "7b1b4a3a-0a4e-4d71-9a0c-36b1f1c1ee10"),
    ];
    for (alias, name, child, key) in relation_types {
        conn.execute(
            "INSERT OR IGNORE INTO relation_type (type_unique_id, alias, name, dual, parent_object_type, child_object_type, is_dependency) \
             VALUES (?1, ?2, ?3, 0, NULL, ?4, 1)",
            params![key, alias, name, child.tag()],
        )?;
    }
    Ok(())
}

/// Ambient write transaction. Dropping without [`Scope::complete`] rolls
/// back.
pub struct Scope<'a> {
    tx: Transaction<'a>,
}

impl Scope<'_> {
    pub fn complete(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

impl Deref for Scope<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_schema_is_idempotent() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        install_schema(db.connection()).unwrap();
        let roots: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM node WHERE id < 0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(roots, 3);
        let langs: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM language WHERE is_default = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(langs, 1);
    }

    #[test]
    fn test_scope_rolls_back_when_dropped() {
        let mut db = Database::open_in_memory(EngineConfig::default()).unwrap();
        {
            let scope = db.scope().unwrap();
            scope
                .execute("INSERT INTO language (iso_code, culture_name) VALUES ('da-DK', 'Danish')", [])
                .unwrap();
        }
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM language", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let scope = db.scope().unwrap();
        scope
            .execute("INSERT INTO language (iso_code, culture_name) VALUES ('da-DK', 'Danish')", [])
            .unwrap();
        scope.complete().unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM language", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.sqlite");
        {
            let db = Database::open(&path, EngineConfig::default()).unwrap();
            db.connection()
                .execute("INSERT INTO language (iso_code, culture_name) VALUES ('fr-FR', 'French')", [])
                .unwrap();
        }
        let db = Database::open(&path, EngineConfig::default()).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM language", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
