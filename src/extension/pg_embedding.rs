//! pg_embedding adapter: `REAL[]` columns, `{…}` literals, `<=>`/`<->`/`<~>`
//! operators, HNSW via `ann_*_ops` with all parameters in the WITH clause.
//!
//! pg_embedding's planner prefers sequential scans unless told otherwise, so
//! HNSW-backed fetches must run with `SET LOCAL enable_seqscan = off` inside
//! the query's transaction.

use super::{Metric, VectorExtension, check_metric, parse_float_list};
use crate::error::Result;
use crate::model::HnswOptions;
use crate::value::quote_ident;

const ALLOWED: &[Metric] = &[Metric::Cosine, Metric::L2, Metric::Manhattan];

#[derive(Debug, Clone)]
pub struct PgEmbedding {
    dims: u32,
    metric: Metric,
}

impl PgEmbedding {
    pub fn new(dims: u32, metric: Metric) -> Result<Self> {
        check_metric(metric, ALLOWED, "pg_embedding")?;
        Ok(Self { dims, metric })
    }
}

impl VectorExtension for PgEmbedding {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn dims(&self) -> u32 {
        self.dims
    }

    fn extension_ddl(&self) -> String {
        "CREATE EXTENSION IF NOT EXISTS embedding".to_string()
    }

    fn column_type(&self) -> String {
        "REAL[]".to_string()
    }

    fn insert_literal(&self, vector: &[f32]) -> String {
        let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        format!("{{{}}}", parts.join(","))
    }

    fn insert_cast(&self) -> &'static str {
        "::real[]"
    }

    fn parse_embedding(&self, raw: &str) -> Result<Vec<f32>> {
        parse_float_list(raw, '{', '}')
    }

    fn distance_expr(&self, column: &str, placeholder: &str) -> String {
        let op = match self.metric {
            Metric::Cosine => "<=>",
            Metric::L2 => "<->",
            Metric::Manhattan => "<~>",
            Metric::InnerProduct => unreachable!("rejected at construction"),
        };
        format!("{column} {op} {placeholder}::real[]")
    }

    fn hnsw_index_sql(
        &self,
        index: &str,
        table: &str,
        column: &str,
        opts: &HnswOptions,
    ) -> Vec<String> {
        // dims is mandatory for pg_embedding's hnsw access method.
        let mut with = vec![format!("dims = {}", self.dims)];
        if let Some(m) = opts.m {
            with.push(format!("m = {m}"));
        }
        if let Some(ef) = opts.ef_construction {
            with.push(format!("efconstruction = {ef}"));
        }
        if let Some(ef) = opts.ef_search {
            with.push(format!("efsearch = {ef}"));
        }

        let ops_class = match self.metric {
            Metric::Cosine => " ann_cos_ops",
            Metric::Manhattan => " ann_manhattan_ops",
            Metric::L2 => "",
            Metric::InnerProduct => unreachable!("rejected at construction"),
        };

        vec![format!(
            "CREATE INDEX {} ON {} USING hnsw ({}{}) WITH ({})",
            quote_ident(index),
            quote_ident(table),
            quote_ident(column),
            ops_class,
            with.join(", ")
        )]
    }

    fn pre_query_sql(&self) -> Vec<String> {
        vec!["SET LOCAL enable_seqscan = off".to_string()]
    }
}
