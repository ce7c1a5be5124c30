//! Paged content listings
//!
//! - [`builder`]: structured SELECT with joins, computed columns and
//!   predicates
//! - [`ordering`]: system field, culture name and custom property ordering
//! - [`ContentFilter`] and [`prepare_page`]: filtered, ordered, windowed
//!   id queries

pub mod builder;
pub mod ordering;

pub use builder::{Direction, Fragment, JoinKind, SelectQuery};
pub use ordering::{apply_ordering, Ordering, SystemField};

use crate::chunk::{ensure_within_limit, int_values, placeholders};
use crate::error::{Result, StoreError};
use crate::models::object_type::ObjectType;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page_index: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page_index: self.page_index,
            page_size: self.page_size,
        }
    }
}

/// Restrictions on a content listing.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub parent_id: Option<i32>,
    /// Any depth below this node.
    pub ancestor_id: Option<i32>,
    pub content_type_ids: Vec<i32>,
    /// Explicit id list. Bound in one IN-list, so it must fit the parameter
    /// ceiling.
    pub ids: Vec<i32>,
    pub trashed: Option<bool>,
    /// Substring of the invariant name.
    pub name_contains: Option<String>,
    /// Documents with a published version only.
    pub published_only: bool,
}

impl ContentFilter {
    pub fn children_of(parent_id: i32) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }

    fn apply(&self, query: &mut SelectQuery, max_parameters: usize) -> Result<()> {
        if let Some(parent_id) = self.parent_id {
            query.add_predicate(Fragment::new("n.parent_id = ?").bind(parent_id));
        }
        if let Some(ancestor_id) = self.ancestor_id {
            query.add_predicate(
                Fragment::new("n.path LIKE (SELECT path FROM node WHERE id = ?) || ',%'").bind(ancestor_id),
            );
        }
        if !self.content_type_ids.is_empty() {
            ensure_within_limit(self.content_type_ids.len(), max_parameters, "content type filter")?;
            query.add_predicate(Fragment::with_params(
                format!("c.content_type_id IN ({})", placeholders(self.content_type_ids.len())),
                int_values(&self.content_type_ids),
            ));
        }
        if !self.ids.is_empty() {
            ensure_within_limit(self.ids.len(), max_parameters, "id filter")?;
            query.add_predicate(Fragment::with_params(
                format!("n.id IN ({})", placeholders(self.ids.len())),
                int_values(&self.ids),
            ));
        }
        if let Some(trashed) = self.trashed {
            query.add_predicate(Fragment::new("n.trashed = ?").bind(trashed));
        }
        if let Some(needle) = &self.name_contains {
            query.add_predicate(
                Fragment::new("n.text LIKE ? ESCAPE '\\'").bind(format!("%{}%", escape_like(needle))),
            );
        }
        if self.published_only {
            query.add_predicate(Fragment::new(
                "EXISTS (SELECT 1 FROM document d WHERE d.node_id = n.id AND d.published = 1)",
            ));
        }
        Ok(())
    }
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Node ids of content of one object type joined to the current version and
/// content type. Aliases: `n` node, `c` content, `ct` content type, `cv`
/// current version.
pub fn content_query(object_type: ObjectType) -> SelectQuery {
    SelectQuery::from("node n")
        .column("n.id")
        .join(JoinKind::Inner, "content c", Fragment::new("c.node_id = n.id"))
        .join(JoinKind::Inner, "content_type ct", Fragment::new("ct.node_id = c.content_type_id"))
        .join(
            JoinKind::Inner,
            "content_version cv",
            Fragment::new("cv.node_id = n.id AND cv.current = 1"),
        )
        .predicate(Fragment::new("n.node_object_type = ?").bind(object_type.tag().to_string()))
}

/// Apply filter, ordering and the page window to a base query.
pub fn prepare_page(
    mut base: SelectQuery,
    filter: &ContentFilter,
    ordering: &Ordering,
    page_index: u64,
    page_size: u64,
    max_parameters: usize,
) -> Result<SelectQuery> {
    if page_size == 0 {
        return Err(StoreError::NotSupported("page size must be positive".to_string()));
    }
    filter.apply(&mut base, max_parameters)?;
    apply_ordering(&mut base, ordering)?;
    base.page(page_index, page_size);
    Ok(base)
}

/// Run a prepared query that selects the node id first, plus its count.
pub fn fetch_id_page(conn: &Connection, query: &SelectQuery, page_index: u64, page_size: u64) -> Result<Page<i32>> {
    let (count_sql, count_params) = query.build_count();
    let total: i64 = conn.query_row(&count_sql, params_from_iter(count_params), |r| r.get(0))?;

    let (sql, params) = query.build();
    tracing::debug!("Page query: {}", sql);
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(params), |r| r.get::<_, i32>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Page {
        items,
        total: total as u64,
        page_index,
        page_size,
    })
}
