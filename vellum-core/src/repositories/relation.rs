//! Relation-type directory and relation rows

use crate::chunk::{in_groups, int_values, placeholders};
use crate::error::Result;
use crate::models::relation::AUTOMATIC_RELATION_TYPES;
use crate::models::{ObjectType, Relation, RelationType};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, Row};

/// Snapshot of all relation types.
#[derive(Debug, Clone, Default)]
pub struct RelationTypes {
    items: Vec<RelationType>,
}

impl RelationTypes {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, type_unique_id, alias, name, dual, parent_object_type, child_object_type, is_dependency \
             FROM relation_type ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(1)?;
            let parent: Option<String> = row.get(5)?;
            let child: Option<String> = row.get(6)?;
            items.push(RelationType {
                id: row.get(0)?,
                key: crate::models::node::parse_key(&key)?,
                alias: row.get(2)?,
                name: row.get(3)?,
                is_bidirectional: row.get(4)?,
                parent_object_type: parent.as_deref().map(ObjectType::from_tag).transpose()?,
                child_object_type: child.as_deref().map(ObjectType::from_tag).transpose()?,
                is_dependency: row.get(7)?,
            });
        }
        Ok(Self { items })
    }

    pub fn by_alias(&self, alias: &str) -> Option<&RelationType> {
        self.items.iter().find(|t| t.alias.eq_ignore_ascii_case(alias))
    }

    pub fn by_id(&self, id: i32) -> Option<&RelationType> {
        self.items.iter().find(|t| t.id == id)
    }

    /// Ids of the automatic relation types that exist in the store.
    pub fn automatic_ids(&self) -> Vec<i32> {
        AUTOMATIC_RELATION_TYPES
            .iter()
            .filter_map(|alias| self.by_alias(alias))
            .map(|t| t.id)
            .collect()
    }
}

fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<Relation> {
    Ok(Relation {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        child_id: row.get(2)?,
        relation_type_id: row.get(3)?,
        create_date: row.get(4)?,
        comment: row.get(5)?,
    })
}

/// Relations whose parent is `parent_id`.
pub fn relations_by_parent(conn: &Connection, parent_id: i32) -> Result<Vec<Relation>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, parent_id, child_id, rel_type, datetime, comment FROM relation WHERE parent_id = ?1 ORDER BY id",
    )?;
    let relations = stmt
        .query_map(params![parent_id], relation_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(relations)
}

/// Relations whose child is `child_id`.
pub fn relations_by_child(conn: &Connection, child_id: i32) -> Result<Vec<Relation>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, parent_id, child_id, rel_type, datetime, comment FROM relation WHERE child_id = ?1 ORDER BY id",
    )?;
    let relations = stmt
        .query_map(params![child_id], relation_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(relations)
}

/// Insert a manually authored relation.
pub fn save_relation(conn: &Connection, relation: &mut Relation) -> Result<()> {
    conn.execute(
        "INSERT INTO relation (parent_id, child_id, rel_type, datetime, comment) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            relation.parent_id,
            relation.child_id,
            relation.relation_type_id,
            relation.create_date,
            relation.comment
        ],
    )?;
    relation.id = conn.last_insert_rowid() as i32;
    Ok(())
}

/// Delete relations owned by `parent_id` whose type is in `relation_type_ids`.
pub fn delete_by_parent(
    conn: &Connection,
    parent_id: i32,
    relation_type_ids: &[i32],
    max_parameters: usize,
) -> Result<usize> {
    let mut deleted = 0;
    for group in in_groups(relation_type_ids, max_parameters, 1) {
        let sql = format!(
            "DELETE FROM relation WHERE parent_id = ? AND rel_type IN ({})",
            placeholders(group.len())
        );
        let mut values = int_values(&[parent_id]);
        values.extend(int_values(group));
        deleted += conn.execute(&sql, params_from_iter(values))?;
    }
    Ok(deleted)
}

/// Insert many (parent, child, type) relations at once.
pub fn bulk_insert(conn: &Connection, relations: &[(i32, i32, i32)]) -> Result<()> {
    let now = Utc::now();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO relation (parent_id, child_id, rel_type, datetime) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (parent, child, rel_type) in relations {
        stmt.execute(params![parent, child, rel_type, now])?;
    }
    Ok(())
}
