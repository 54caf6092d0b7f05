//! Pluggable Postgres vector extension adapters.
//!
//! pgvector and pg_embedding disagree on nearly everything: distance
//! operators, column types, insertion literal format, index DDL, and whether
//! sequential scans must be disabled for HNSW to be used. The store talks to
//! a [`VectorExtension`] capability set and stays agnostic.
//!
//! Contract: every distance expression is a true distance — smaller is
//! nearer — so `ORDER BY "_distance"` ascending returns the nearest rows
//! first for every metric of both extensions.

pub mod pg_embedding;
pub mod pgvector;

pub use pg_embedding::PgEmbedding;
pub use pgvector::PgVector;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::HnswOptions;

/// Embedding width most hosted embedding models produce; the conventional
/// default when nothing else is configured.
pub const DEFAULT_DIMS: u32 = 1536;

/// Extension choice by name, the way configuration spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    PgVector,
    PgEmbedding,
}

/// Build an adapter from configuration options.
pub fn build_extension(
    kind: ExtensionKind,
    dims: u32,
    metric: Metric,
) -> Result<Arc<dyn VectorExtension>> {
    match kind {
        ExtensionKind::PgVector => Ok(Arc::new(PgVector::new(dims, metric)?)),
        ExtensionKind::PgEmbedding => Ok(Arc::new(PgEmbedding::new(dims, metric)?)),
    }
}

/// Distance metric between embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    L2,
    InnerProduct,
    Manhattan,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
            Metric::InnerProduct => "inner_product",
            Metric::Manhattan => "manhattan",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability set implemented by each extension adapter.
pub trait VectorExtension: Send + Sync {
    /// Extension name as known to Postgres catalogs.
    fn name(&self) -> &'static str;

    fn metric(&self) -> Metric;

    fn dims(&self) -> u32;

    /// `CREATE EXTENSION IF NOT EXISTS …` statement.
    fn extension_ddl(&self) -> String;

    /// SQL type of the embedding column.
    fn column_type(&self) -> String;

    /// Format a vector as the extension's insertion literal.
    fn insert_literal(&self, vector: &[f32]) -> String;

    /// Cast suffix applied to bound embedding parameters.
    fn insert_cast(&self) -> &'static str;

    /// Parse an embedding the driver returned as text back into a vector.
    fn parse_embedding(&self, raw: &str) -> Result<Vec<f32>>;

    /// Distance expression between the embedding column and a positional
    /// placeholder, honoring the smaller-is-nearer contract.
    fn distance_expr(&self, column: &str, placeholder: &str) -> String;

    /// Statements that build an HNSW index with the given options.
    fn hnsw_index_sql(
        &self,
        index: &str,
        table: &str,
        column: &str,
        opts: &HnswOptions,
    ) -> Vec<String>;

    /// Statements to run in the query's transaction before an HNSW-backed
    /// fetch. Empty for extensions whose planner needs no persuasion.
    fn pre_query_sql(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Validate a requested metric against an adapter's allowed set.
pub(crate) fn check_metric(metric: Metric, allowed: &[Metric], extension: &str) -> Result<()> {
    if allowed.contains(&metric) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "metric {metric} is not supported by {extension}"
        )))
    }
}

/// Parse a bracketed float list, e.g. `[0.1,0.2]` or `{0.1,0.2}`.
pub(crate) fn parse_float_list(raw: &str, open: char, close: char) -> Result<Vec<f32>> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix(open)
        .and_then(|s| s.strip_suffix(close))
        .ok_or_else(|| {
            Error::InvalidArgument(format!("malformed embedding literal: {raw}"))
        })?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|_| {
                Error::InvalidArgument(format!("malformed embedding component: {part}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_extension_dispatches_on_kind() {
        let pgvector = build_extension(ExtensionKind::PgVector, 8, Metric::Cosine).unwrap();
        assert_eq!(pgvector.name(), "vector");
        assert_eq!(pgvector.column_type(), "vector(8)");

        let pg_embedding =
            build_extension(ExtensionKind::PgEmbedding, 8, Metric::Manhattan).unwrap();
        assert_eq!(pg_embedding.name(), "embedding");
        assert_eq!(pg_embedding.column_type(), "REAL[]");

        assert!(build_extension(ExtensionKind::PgVector, 8, Metric::Manhattan).is_err());
        assert!(build_extension(ExtensionKind::PgEmbedding, 8, Metric::InnerProduct).is_err());
    }

    #[test]
    fn float_list_parsing_is_strict_about_brackets() {
        assert_eq!(parse_float_list("[1,2.5]", '[', ']').unwrap(), vec![1.0, 2.5]);
        assert_eq!(parse_float_list("{}", '{', '}').unwrap(), Vec::<f32>::new());
        assert!(parse_float_list("1,2", '[', ']').is_err());
        assert!(parse_float_list("[1,x]", '[', ']').is_err());
    }
}
