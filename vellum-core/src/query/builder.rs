//! Structured SELECT builder
//!
//! Queries are assembled from clauses instead of spliced strings. Fragments
//! use anonymous `?` placeholders; [`SelectQuery::build`] emits the clauses
//! in SQL order and concatenates their parameters in the same order.

use rusqlite::types::Value as SqlValue;

/// A piece of SQL with its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Append a bound value.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Combine with another fragment using AND.
    pub fn and(mut self, other: Fragment) -> Self {
        if self.sql.is_empty() {
            return other;
        }
        if !other.sql.is_empty() {
            self.sql = format!("({}) AND ({})", self.sql, other.sql);
            self.params.extend(other.params);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    fn keyword(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    on: Fragment,
}

#[derive(Debug, Clone)]
struct OrderTerm {
    expr: String,
    direction: Direction,
    nulls_last: bool,
}

/// A SELECT statement under construction.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    from: String,
    columns: Vec<Fragment>,
    joins: Vec<Join>,
    predicates: Vec<Fragment>,
    order_by: Vec<OrderTerm>,
    limit: Option<(u64, u64)>,
}

impl SelectQuery {
    /// `from` is a table with its alias, e.g. `node n`.
    pub fn from(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn column(mut self, expr: impl Into<String>) -> Self {
        self.add_column(expr);
        self
    }

    pub fn add_column(&mut self, expr: impl Into<String>) {
        self.columns.push(Fragment::new(expr));
    }

    /// Add `expr AS alias`. Returns the alias for use in ORDER BY.
    pub fn add_computed_column(&mut self, expr: Fragment, alias: &str) -> String {
        self.columns.push(Fragment {
            sql: format!("{} AS {}", expr.sql, alias),
            params: expr.params,
        });
        alias.to_string()
    }

    pub fn join(mut self, kind: JoinKind, table: impl Into<String>, on: Fragment) -> Self {
        self.add_join(kind, table, on);
        self
    }

    pub fn add_join(&mut self, kind: JoinKind, table: impl Into<String>, on: Fragment) {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on,
        });
    }

    pub fn predicate(mut self, predicate: Fragment) -> Self {
        self.add_predicate(predicate);
        self
    }

    pub fn add_predicate(&mut self, predicate: Fragment) {
        if !predicate.is_empty() {
            self.predicates.push(predicate);
        }
    }

    /// Add an ORDER BY term. With `nulls_last`, NULLs sort after values
    /// regardless of direction.
    pub fn add_order_by(&mut self, expr: impl Into<String>, direction: Direction, nulls_last: bool) {
        self.order_by.push(OrderTerm {
            expr: expr.into(),
            direction,
            nulls_last,
        });
    }

    /// Restrict to one zero-based page.
    pub fn page(&mut self, page_index: u64, page_size: u64) {
        self.limit = Some((page_size, page_index.saturating_mul(page_size)));
    }

    fn push_from_and_where(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        sql.push_str(" FROM ");
        sql.push_str(&self.from);
        for join in &self.joins {
            sql.push_str(match join.kind {
                JoinKind::Inner => " JOIN ",
                JoinKind::Left => " LEFT JOIN ",
            });
            sql.push_str(&join.table);
            sql.push_str(" ON ");
            sql.push_str(&join.on.sql);
            params.extend(join.on.params.iter().cloned());
        }
        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            let clauses: Vec<String> = self.predicates.iter().map(|p| format!("({})", p.sql)).collect();
            sql.push_str(&clauses.join(" AND "));
            for p in &self.predicates {
                params.extend(p.params.iter().cloned());
            }
        }
    }

    /// Render SQL and its parameters.
    pub fn build(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<&str> = self.columns.iter().map(|c| c.sql.as_str()).collect();
            sql.push_str(&cols.join(", "));
            for c in &self.columns {
                params.extend(c.params.iter().cloned());
            }
        }
        self.push_from_and_where(&mut sql, &mut params);
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    if o.nulls_last {
                        format!("({} IS NULL) ASC, {} {}", o.expr, o.expr, o.direction.keyword())
                    } else {
                        format!("{} {}", o.expr, o.direction.keyword())
                    }
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some((limit, offset)) = self.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(limit as i64));
            params.push(SqlValue::Integer(offset as i64));
        }
        (sql, params)
    }

    /// Render `SELECT COUNT(*)` over the same joins and predicates.
    pub fn build_count(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::from("SELECT COUNT(*)");
        let mut params = Vec::new();
        self.push_from_and_where(&mut sql, &mut params);
        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_order_and_params() {
        let mut q = SelectQuery::from("node n")
            .column("n.id")
            .join(
                JoinKind::Left,
                "language l",
                Fragment::new("l.iso_code = ?").bind("en-US".to_string()),
            )
            .predicate(Fragment::new("n.parent_id = ?").bind(5i64));
        q.add_computed_column(Fragment::new("COALESCE(?, n.text)").bind("x".to_string()), "label");
        q.add_order_by("label", Direction::Descending, true);
        q.page(2, 10);
        let (sql, params) = q.build();
        assert_eq!(
            sql,
            "SELECT n.id, COALESCE(?, n.text) AS label FROM node n LEFT JOIN language l ON l.iso_code = ? \
             WHERE (n.parent_id = ?) ORDER BY (label IS NULL) ASC, label DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            params,
            vec![
                SqlValue::Text("x".into()),
                SqlValue::Text("en-US".into()),
                SqlValue::Integer(5),
                SqlValue::Integer(10),
                SqlValue::Integer(20),
            ]
        );
    }

    #[test]
    fn test_count_skips_columns_and_paging() {
        let mut q = SelectQuery::from("node n").predicate(Fragment::new("n.trashed = ?").bind(0i64));
        q.add_computed_column(Fragment::new("?").bind(1i64), "one");
        q.page(0, 5);
        let (sql, params) = q.build_count();
        assert_eq!(sql, "SELECT COUNT(*) FROM node n WHERE (n.trashed = ?)");
        assert_eq!(params, vec![SqlValue::Integer(0)]);
    }

    #[test]
    fn test_fragment_and() {
        let f = Fragment::new("a = ?").bind(1i64).and(Fragment::new("b = ?").bind(2i64));
        assert_eq!(f.sql, "(a = ?) AND (b = ?)");
        assert_eq!(f.params.len(), 2);
        let e = Fragment::default().and(Fragment::new("c"));
        assert_eq!(e.sql, "c");
    }
}
