//! pgvector adapter: `vector(dims)` columns, `[…]` literals, `<=>`/`<->`/`<#>`
//! operators, HNSW via `vector_*_ops` operator classes.

use super::{Metric, VectorExtension, check_metric, parse_float_list};
use crate::error::Result;
use crate::model::HnswOptions;
use crate::value::quote_ident;

const ALLOWED: &[Metric] = &[Metric::Cosine, Metric::L2, Metric::InnerProduct];

#[derive(Debug, Clone)]
pub struct PgVector {
    dims: u32,
    metric: Metric,
}

impl PgVector {
    pub fn new(dims: u32, metric: Metric) -> Result<Self> {
        check_metric(metric, ALLOWED, "pgvector")?;
        Ok(Self { dims, metric })
    }

    fn ops_class(&self) -> &'static str {
        match self.metric {
            Metric::Cosine => "vector_cosine_ops",
            Metric::L2 => "vector_l2_ops",
            Metric::InnerProduct => "vector_ip_ops",
            Metric::Manhattan => unreachable!("rejected at construction"),
        }
    }
}

impl VectorExtension for PgVector {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn dims(&self) -> u32 {
        self.dims
    }

    fn extension_ddl(&self) -> String {
        "CREATE EXTENSION IF NOT EXISTS vector".to_string()
    }

    fn column_type(&self) -> String {
        format!("vector({})", self.dims)
    }

    fn insert_literal(&self, vector: &[f32]) -> String {
        let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        format!("[{}]", parts.join(","))
    }

    fn insert_cast(&self) -> &'static str {
        "::vector"
    }

    fn parse_embedding(&self, raw: &str) -> Result<Vec<f32>> {
        parse_float_list(raw, '[', ']')
    }

    fn distance_expr(&self, column: &str, placeholder: &str) -> String {
        // <=> is cosine distance (1 - sim) and <#> negative inner product,
        // so all three are ascending-is-nearest as-is.
        let op = match self.metric {
            Metric::Cosine => "<=>",
            Metric::L2 => "<->",
            Metric::InnerProduct => "<#>",
            Metric::Manhattan => unreachable!("rejected at construction"),
        };
        format!("{column} {op} {placeholder}::vector")
    }

    fn hnsw_index_sql(
        &self,
        index: &str,
        table: &str,
        column: &str,
        opts: &HnswOptions,
    ) -> Vec<String> {
        let mut with = Vec::new();
        if let Some(m) = opts.m {
            with.push(format!("m = {m}"));
        }
        if let Some(ef) = opts.ef_construction {
            with.push(format!("ef_construction = {ef}"));
        }
        let with_clause = if with.is_empty() {
            String::new()
        } else {
            format!(" WITH ({})", with.join(", "))
        };

        let mut statements = vec![format!(
            "CREATE INDEX {} ON {} USING hnsw ({} {}){}",
            quote_ident(index),
            quote_ident(table),
            quote_ident(column),
            self.ops_class(),
            with_clause
        )];
        if let Some(ef_search) = opts.ef_search {
            statements.push(format!("SET hnsw.ef_search = {ef_search}"));
        }
        statements
    }
}
