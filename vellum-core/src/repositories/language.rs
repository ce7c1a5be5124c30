//! Language directory: iso code ↔ numeric id

use crate::error::{Result, StoreError};
use crate::models::Language;
use rusqlite::{params, Connection};

/// Snapshot of all languages, loaded once per operation.
#[derive(Debug, Clone, Default)]
pub struct Languages {
    items: Vec<Language>,
}

impl Languages {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, iso_code, culture_name, is_default, is_mandatory, fallback_language_id \
             FROM language ORDER BY id",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(Language {
                    id: row.get(0)?,
                    iso_code: row.get(1)?,
                    culture_name: row.get(2)?,
                    is_default: row.get(3)?,
                    is_mandatory: row.get(4)?,
                    fallback_language_id: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    pub fn all(&self) -> &[Language] {
        &self.items
    }

    pub fn id_by_iso(&self, iso_code: &str) -> Option<i32> {
        self.items
            .iter()
            .find(|l| l.iso_code.eq_ignore_ascii_case(iso_code))
            .map(|l| l.id)
    }

    pub fn iso_by_id(&self, id: i32) -> Option<&str> {
        self.items.iter().find(|l| l.id == id).map(|l| l.iso_code.as_str())
    }

    pub fn default_language(&self) -> Option<&Language> {
        self.items.iter().find(|l| l.is_default)
    }

    pub fn default_id(&self) -> Option<i32> {
        self.default_language().map(|l| l.id)
    }

    pub fn default_iso(&self) -> Option<&str> {
        self.default_language().map(|l| l.iso_code.as_str())
    }

    /// Default language id; a store without one is unusable for variant
    /// content.
    pub fn require_default_id(&self) -> Result<i32> {
        self.default_id()
            .ok_or_else(|| StoreError::Corrupt("no default language configured".to_string()))
    }

    /// Id of a known culture.
    pub fn require_id(&self, iso_code: &str) -> Result<i32> {
        self.id_by_iso(iso_code)
            .ok_or_else(|| StoreError::not_found("Language", iso_code))
    }
}

/// Insert or update a language. Making it default demotes the previous one.
pub fn save_language(conn: &Connection, language: &mut Language) -> Result<()> {
    if language.is_default {
        conn.execute("UPDATE language SET is_default = 0 WHERE id <> ?1", params![language.id])?;
    }
    if language.id > 0 {
        conn.execute(
            "UPDATE language SET iso_code = ?2, culture_name = ?3, is_default = ?4, is_mandatory = ?5, fallback_language_id = ?6 \
             WHERE id = ?1",
            params![
                language.id,
                language.iso_code,
                language.culture_name,
                language.is_default,
                language.is_mandatory,
                language.fallback_language_id
            ],
        )?;
    } else {
        conn.execute(
            "INSERT INTO language (iso_code, culture_name, is_default, is_mandatory, fallback_language_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                language.iso_code,
                language.culture_name,
                language.is_default,
                language.is_mandatory,
                language.fallback_language_id
            ],
        )?;
        language.id = conn.last_insert_rowid() as i32;
    }
    tracing::debug!("Saved language {} ({})", language.iso_code, language.id);
    Ok(())
}
