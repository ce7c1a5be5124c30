//! Ordering of content listings
//!
//! System fields map to fixed columns. `name` maps to the culture name of
//! the current version falling back to the node text, and custom properties
//! sort by a correlated sub-select over the typed value columns. Every
//! ordering is selected under an alias and the node id is always appended
//! as the last term so paging windows are stable.

use crate::error::{Result, StoreError};
use crate::query::builder::{Direction, Fragment, JoinKind, SelectQuery};
use rusqlite::types::Value as SqlValue;

/// Alias under which the ordering value is selected.
pub const ORDERING_ALIAS: &str = "ordering_value";

/// Fields every content item has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemField {
    Id,
    SortOrder,
    Path,
    Level,
    ParentId,
    CreateDate,
    UpdateDate,
    Owner,
    Updater,
    ContentTypeAlias,
    Name,
}

impl SystemField {
    /// Case-insensitive lookup of a field name.
    pub fn parse(name: &str) -> Option<Self> {
        let field = match name.to_ascii_lowercase().as_str() {
            "id" => SystemField::Id,
            "sortorder" => SystemField::SortOrder,
            "path" => SystemField::Path,
            "level" => SystemField::Level,
            "parentid" => SystemField::ParentId,
            "createdate" => SystemField::CreateDate,
            "updatedate" => SystemField::UpdateDate,
            "owner" | "creator" => SystemField::Owner,
            "updater" | "writer" => SystemField::Updater,
            "contenttypealias" => SystemField::ContentTypeAlias,
            "name" => SystemField::Name,
            _ => return None,
        };
        Some(field)
    }

    fn column(self) -> &'static str {
        match self {
            SystemField::Id => "n.id",
            SystemField::SortOrder => "n.sort_order",
            SystemField::Path => "n.path",
            SystemField::Level => "n.level",
            SystemField::ParentId => "n.parent_id",
            SystemField::CreateDate => "n.create_date",
            SystemField::UpdateDate => "cv.version_date",
            SystemField::Owner => "n.node_user",
            SystemField::Updater => "cv.user_id",
            SystemField::ContentTypeAlias => "ct.alias",
            SystemField::Name => "n.text",
        }
    }
}

/// Requested ordering of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
    /// Culture for `name` and culture-variant custom properties.
    pub culture: Option<String>,
    /// `field` is a property type alias rather than a system field.
    pub is_custom: bool,
}

impl Default for Ordering {
    fn default() -> Self {
        Ordering::by("sortOrder")
    }
}

impl Ordering {
    pub fn by(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
            culture: None,
            is_custom: false,
        }
    }

    pub fn custom(alias: impl Into<String>) -> Self {
        Self {
            is_custom: true,
            ..Self::by(alias)
        }
    }

    pub fn descending(mut self) -> Self {
        self.direction = Direction::Descending;
        self
    }

    pub fn in_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }
}

/// Sub-select yielding the first populated typed column of a property of the
/// current version. Culture rows win over invariant rows.
fn custom_property_expr(alias: &str, culture: Option<&str>) -> Fragment {
    let mut sql = String::from(
        "(SELECT CASE \
         WHEN opd.int_value IS NOT NULL THEN opd.int_value \
         WHEN opd.decimal_value IS NOT NULL THEN opd.decimal_value \
         WHEN opd.date_value IS NOT NULL THEN opd.date_value \
         ELSE COALESCE(opd.varchar_value, opd.text_value) END \
         FROM property_data opd \
         JOIN content_version ocv ON ocv.id = opd.version_id AND ocv.current = 1 \
         JOIN property_type opt ON opt.id = opd.property_type_id \
         LEFT JOIN language ol ON ol.id = opd.language_id \
         WHERE ocv.node_id = n.id AND opt.alias = ? AND opd.segment IS NULL",
    );
    let mut params: Vec<SqlValue> = vec![SqlValue::Text(alias.to_string())];
    match culture {
        Some(culture) => {
            sql.push_str(" AND (opd.language_id IS NULL OR ol.iso_code = ? COLLATE NOCASE)");
            params.push(SqlValue::Text(culture.to_string()));
        }
        None => sql.push_str(" AND opd.language_id IS NULL"),
    }
    sql.push_str(" ORDER BY opd.language_id IS NULL LIMIT 1)");
    Fragment::with_params(sql, params)
}

/// Add the ordering to a content query rooted at `node n` joined to its
/// current version `cv` and content type `ct`.
pub fn apply_ordering(query: &mut SelectQuery, ordering: &Ordering) -> Result<()> {
    let expr = if ordering.is_custom {
        if ordering.field.trim().is_empty() {
            return Err(StoreError::InvalidOrdering("empty property alias".to_string()));
        }
        custom_property_expr(&ordering.field, ordering.culture.as_deref())
    } else {
        let field = SystemField::parse(&ordering.field)
            .ok_or_else(|| StoreError::InvalidOrdering(ordering.field.clone()))?;
        match (field, ordering.culture.as_deref()) {
            (SystemField::Name, Some(culture)) => {
                query.add_join(
                    JoinKind::Left,
                    "content_version_culture_variation ocn",
                    Fragment::new(
                        "ocn.version_id = cv.id AND ocn.language_id = \
                         (SELECT id FROM language WHERE iso_code = ? COLLATE NOCASE)",
                    )
                    .bind(culture.to_string()),
                );
                Fragment::new("COALESCE(ocn.name, n.text)")
            }
            (field, _) => Fragment::new(field.column()),
        }
    };
    let nulls_last = ordering.is_custom;
    let alias = query.add_computed_column(expr, ORDERING_ALIAS);
    query.add_order_by(alias, ordering.direction, nulls_last);
    query.add_order_by("n.id", Direction::Ascending, false);
    Ok(())
}
