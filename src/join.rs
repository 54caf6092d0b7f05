//! Join clause validation and SQL emission.
//!
//! Joins let column-mode filters reach columns of related tables. Ops and
//! comparison operators come from closed tables; every identifier passes
//! through [`quote_qualified`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{quote_ident, quote_qualified};

const ALLOWED_OPS: &[&str] = &[
    "JOIN",
    "LEFT JOIN",
    "RIGHT JOIN",
    "FULL JOIN",
    "CROSS JOIN",
    "INNER JOIN",
];

const ALLOWED_COMPARATORS: &[&str] = &["=", "<>", "<", "<=", ">", ">="];

/// One join against a related table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinClause {
    /// Join kind, validated against the allowed set at compile time.
    pub op: String,
    pub table: String,
    /// ON conditions, AND-joined. Empty only for `CROSS JOIN`.
    #[serde(default)]
    pub on: Vec<JoinCondition>,
}

/// A single `left <operator> right` condition; the operator defaults to `=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCondition {
    pub left: String,
    pub right: String,
    #[serde(default)]
    pub operator: Option<String>,
}

impl JoinClause {
    pub fn new(op: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            table: table.into(),
            on: Vec::new(),
        }
    }

    pub fn on(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.on.push(JoinCondition {
            left: left.into(),
            right: right.into(),
            operator: None,
        });
        self
    }

    /// Render this clause as a SQL fragment.
    pub fn compile(&self) -> Result<String> {
        let op = self.op.trim().to_uppercase();
        if !ALLOWED_OPS.contains(&op.as_str()) {
            return Err(Error::InvalidArgument(format!("unknown join op: {}", self.op)));
        }

        if op == "CROSS JOIN" {
            if !self.on.is_empty() {
                return Err(Error::InvalidArgument(
                    "CROSS JOIN takes no ON conditions".to_string(),
                ));
            }
            return Ok(format!("{} {}", op, quote_ident(&self.table)));
        }

        if self.on.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "{op} requires at least one ON condition"
            )));
        }

        let mut conditions = Vec::with_capacity(self.on.len());
        for cond in &self.on {
            let operator = cond.operator.as_deref().unwrap_or("=");
            if !ALLOWED_COMPARATORS.contains(&operator) {
                return Err(Error::InvalidArgument(format!(
                    "unknown join comparator: {operator}"
                )));
            }
            conditions.push(format!(
                "{} {} {}",
                quote_qualified(&cond.left),
                operator,
                quote_qualified(&cond.right)
            ));
        }

        Ok(format!(
            "{} {} ON {}",
            op,
            quote_ident(&self.table),
            conditions.join(" AND ")
        ))
    }
}

/// Render a list of join clauses in input order, space-separated.
pub fn compile_joins(joins: &[JoinClause]) -> Result<String> {
    let fragments: Vec<String> = joins
        .iter()
        .map(JoinClause::compile)
        .collect::<Result<_>>()?;
    Ok(fragments.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_join_with_quoted_identifiers() {
        let join = JoinClause::new("JOIN", "some_extra_stuff")
            .on("t.extra_stuff", "some_extra_stuff.id");
        assert_eq!(
            join.compile().unwrap(),
            "JOIN \"some_extra_stuff\" ON \"t\".\"extra_stuff\" = \"some_extra_stuff\".\"id\""
        );
    }

    #[test]
    fn multiple_conditions_are_and_joined() {
        let join = JoinClause::new("LEFT JOIN", "b").on("a.x", "b.x").on("a.y", "b.y");
        assert_eq!(
            join.compile().unwrap(),
            "LEFT JOIN \"b\" ON \"a\".\"x\" = \"b\".\"x\" AND \"a\".\"y\" = \"b\".\"y\""
        );
    }

    #[test]
    fn explicit_comparator_is_honoured() {
        let join = JoinClause {
            op: "INNER JOIN".to_string(),
            table: "b".to_string(),
            on: vec![JoinCondition {
                left: "a.x".to_string(),
                right: "b.x".to_string(),
                operator: Some("<>".to_string()),
            }],
        };
        assert_eq!(
            join.compile().unwrap(),
            "INNER JOIN \"b\" ON \"a\".\"x\" <> \"b\".\"x\""
        );
    }

    #[test]
    fn unknown_op_is_rejected() {
        let join = JoinClause::new("NATURAL JOIN", "b").on("a.x", "b.x");
        assert!(join.compile().is_err());
    }

    #[test]
    fn unknown_comparator_is_rejected() {
        let join = JoinClause {
            op: "JOIN".to_string(),
            table: "b".to_string(),
            on: vec![JoinCondition {
                left: "a.x".to_string(),
                right: "b.x".to_string(),
                operator: Some("; DROP TABLE t; --".to_string()),
            }],
        };
        assert!(join.compile().is_err());
    }

    #[test]
    fn cross_join_has_no_on_clause() {
        let join = JoinClause::new("CROSS JOIN", "b");
        assert_eq!(join.compile().unwrap(), "CROSS JOIN \"b\"");
        assert!(JoinClause::new("CROSS JOIN", "b").on("a.x", "b.x").compile().is_err());
        assert!(JoinClause::new("JOIN", "b").compile().is_err());
    }

    #[test]
    fn hostile_table_name_is_quoted() {
        let join = JoinClause::new("JOIN", "b\"; DROP TABLE t; --").on("a.x", "b.x");
        let sql = join.compile().unwrap();
        assert!(sql.contains("\"b\"\"; DROP TABLE t; --\""));
    }

    #[test]
    fn list_form_preserves_order() {
        let joins = vec![
            JoinClause::new("JOIN", "b").on("a.x", "b.x"),
            JoinClause::new("LEFT JOIN", "c").on("b.y", "c.y"),
        ];
        let sql = compile_joins(&joins).unwrap();
        assert!(sql.starts_with("JOIN \"b\""));
        assert!(sql.contains(" LEFT JOIN \"c\""));
    }
}
