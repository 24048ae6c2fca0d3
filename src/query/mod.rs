//! Tag-expression queries
//!
//! An expression selects a set of files: `A B` (or `A and B`) intersects,
//! `A or B` unites, `not A` (or `-A`) complements against all indexed
//! files. Evaluation is pushed into SQLite as a single compound query over
//! per-tag subqueries; a tag is effective on a file when it appears either
//! explicitly or in the materialised implicit taggings.

mod parser;

use std::collections::HashMap;

use crate::entities::{FileId, TagId};
use crate::error::{Result, TmsuError};
use crate::storage::{self, Transaction};

#[derive(Debug, PartialEq)]
pub enum Expression {
    Tag(String),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Parse a query. A blank query parses to `None`.
    pub fn parse(query: &str) -> Result<Option<Expression>> {
        if parser::parse_blank(query).is_ok() {
            return Ok(None);
        }

        let (_, expr) = parser::parse_expr(query)
            .map_err(|_| TmsuError::InvalidQuery(query.to_owned()))?;
        Ok(Some(expr))
    }

    /// Build the intersection of several tag names, e.g. from a virtual
    /// filesystem path. Returns `None` for an empty list.
    pub fn intersection_of<S: AsRef<str>>(names: &[S]) -> Option<Expression> {
        let mut expr: Option<Expression> = None;
        for name in names {
            let tag = Expression::Tag(name.as_ref().to_owned());
            expr = Some(match expr {
                None => tag,
                Some(left) => Expression::And(Box::new(left), Box::new(tag)),
            });
        }
        expr
    }

    /// The tag names mentioned anywhere in the expression.
    pub fn tag_names(&self) -> Vec<&str> {
        let mut names = vec![];
        self.tag_names_rec(&mut names);
        names
    }

    fn tag_names_rec<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expression::Tag(name) => names.push(name),
            Expression::Not(operand) => operand.tag_names_rec(names),
            Expression::And(left, right) | Expression::Or(left, right) => {
                left.tag_names_rec(names);
                right.tag_names_rec(names);
            }
        }
    }
}

/// Resolve an expression to the matching file IDs, ascending.
///
/// Unknown tag names contribute the empty set rather than failing.
pub fn file_ids_matching(tx: &mut Transaction, expr: &Expression) -> Result<Vec<FileId>> {
    let mut names = expr.tag_names();
    names.sort_unstable();
    names.dedup();

    let tags = storage::tag::tags_by_names(tx, &names)?;
    let ids_by_name: HashMap<String, TagId> =
        tags.into_iter().map(|tag| (tag.name, tag.id)).collect();

    let mut sql = String::from("SELECT DISTINCT file_id FROM (");
    let mut params: Vec<i64> = Vec::new();
    push_sql(expr, &ids_by_name, &mut sql, &mut params);
    sql.push_str(") ORDER BY file_id");

    tx.query_vec(&sql, rusqlite::params_from_iter(params), |row| row.get(0))
}

/// Append the SELECT yielding the file IDs matching `expr`. Compound
/// operands are wrapped in sub-selects, so nesting stays valid SQLite.
fn push_sql(
    expr: &Expression,
    ids_by_name: &HashMap<String, TagId>,
    sql: &mut String,
    params: &mut Vec<i64>,
) {
    match expr {
        Expression::Tag(name) => match ids_by_name.get(name) {
            Some(tag_id) => {
                sql.push_str(
                    "SELECT file_id FROM file_tag WHERE tag_id = ? \
                     UNION SELECT file_id FROM implicit_file_tag WHERE tag_id = ?",
                );
                params.push(tag_id.0);
                params.push(tag_id.0);
            }
            // Unknown tag: the empty set
            None => sql.push_str("SELECT file_id FROM file_tag WHERE 0"),
        },
        Expression::Not(operand) => {
            sql.push_str("SELECT id AS file_id FROM file EXCEPT SELECT file_id FROM (");
            push_sql(operand, ids_by_name, sql, params);
            sql.push(')');
        }
        Expression::And(left, right) => {
            sql.push_str("SELECT file_id FROM (");
            push_sql(left, ids_by_name, sql, params);
            sql.push_str(") INTERSECT SELECT file_id FROM (");
            push_sql(right, ids_by_name, sql, params);
            sql.push(')');
        }
        Expression::Or(left, right) => {
            sql.push_str("SELECT file_id FROM (");
            push_sql(left, ids_by_name, sql, params);
            sql.push_str(") UNION SELECT file_id FROM (");
            push_sql(right, ids_by_name, sql, params);
            sql.push(')');
        }
    }
}
