//! Candidate fetch assembly, similarity search, and MMR.
//!
//! One pipeline serves every retrieval API: build the select list (join-aware
//! qualification), let the extension render the distance expression against
//! `$1`, append join and filter fragments, then `ORDER BY "_distance"`
//! ascending — the extension contract guarantees ascending is nearest-first.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::filter::{FilterMode, compile_where};
use crate::join::compile_joins;
use crate::mmr::maximal_marginal_relevance;
use crate::model::{Document, MmrOptions, SearchFilter};
use crate::value::{SqlParam, quote_ident, quote_qualified};

use super::DocumentStore;

/// A fetched row, decoded. The embedding is only present for MMR fetches.
struct Candidate {
    document: Document,
    distance: f64,
    embedding: Option<Vec<f32>>,
}

impl DocumentStore {
    /// k-NN over a text query.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Document>> {
        let results = self.similarity_search_with_score(query, k, filter).await?;
        Ok(results.into_iter().map(|(doc, _)| doc).collect())
    }

    /// k-NN over a text query, with each document's distance.
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f64)>> {
        let vector = self.embedder().embed_query(query).await?;
        self.similarity_search_vector_with_score(&vector, k, filter)
            .await
    }

    /// k-NN over a pre-embedded query vector.
    ///
    /// Distances follow the extension's convention: smaller is nearer, for
    /// every metric.
    pub async fn similarity_search_vector_with_score(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f64)>> {
        let candidates = self.fetch_candidates(vector, k, filter, false).await?;
        Ok(candidates
            .into_iter()
            .map(|c| (c.document, c.distance))
            .collect())
    }

    /// Diversified top-k: fetch `fetch_k` candidates with their embeddings,
    /// rerank with maximal marginal relevance, return the winners in MMR
    /// order. Returns fewer than `k` documents when fewer candidates survive
    /// the filter; that is not an error.
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        opts: &MmrOptions,
    ) -> Result<Vec<Document>> {
        let vector = self.embedder().embed_query(query).await?;
        let candidates = self
            .fetch_candidates(&vector, opts.fetch_k, opts.filter.as_ref(), true)
            .await?;

        let embeddings: Vec<Vec<f32>> = candidates
            .iter()
            .map(|c| c.embedding.clone().unwrap_or_default())
            .collect();
        let picked = maximal_marginal_relevance(&vector, &embeddings, opts.lambda, opts.k);

        Ok(picked
            .into_iter()
            .filter(|&i| i >= 0)
            .map(|i| candidates[i as usize].document.clone())
            .collect())
    }

    async fn fetch_candidates(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        include_embeddings: bool,
    ) -> Result<Vec<Candidate>> {
        let (sql, params) = self.fetch_statement(vector, k, filter, include_embeddings)?;
        let rows = self.run_query(&sql, params).await?;
        debug!(rows = rows.len(), k, "candidate fetch");
        rows.iter()
            .map(|row| self.decode_candidate(row, filter, include_embeddings))
            .collect()
    }

    /// Assemble the fetch statement. `$1` is always the query vector; filter
    /// parameters follow; the limit is last.
    fn fetch_statement(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        include_embeddings: bool,
    ) -> Result<(String, Vec<SqlParam>)> {
        let config = self.config();
        let extension = self.extension();

        if vector.len() != extension.dims() as usize {
            return Err(Error::InvalidArgument(format!(
                "query vector width {} does not match configured dims {}",
                vector.len(),
                extension.dims()
            )));
        }
        if let Some(f) = filter
            && f.metadata_filter.is_some()
            && f.column_filter.is_some()
        {
            return Err(Error::InvalidArgument(
                "metadata_filter and column_filter are mutually exclusive".to_string(),
            ));
        }

        let has_join = filter.is_some_and(|f| !f.joins.is_empty());
        let table = quote_ident(&config.table_name);
        let base_col = |name: &str| {
            if has_join {
                format!("{table}.{0} AS {0}", quote_ident(name))
            } else {
                quote_ident(name)
            }
        };

        let mut select = vec![
            base_col("id"),
            base_col(&config.page_content_column),
            base_col("metadata"),
        ];
        for extra in config.extra_columns.iter().filter(|e| e.returned) {
            select.push(base_col(&extra.name));
        }
        if let Some(f) = filter {
            for column in &f.select_columns {
                if column.contains('.') {
                    select.push(quote_qualified(column));
                } else {
                    select.push(base_col(column));
                }
            }
        }
        if include_embeddings {
            let embedding = if has_join {
                format!("{table}.{}", quote_ident("embedding"))
            } else {
                quote_ident("embedding")
            };
            select.push(format!("{embedding}::text AS {}", quote_ident("embedding_text")));
        }

        let embedding_col = if has_join {
            format!("{table}.{}", quote_ident("embedding"))
        } else {
            quote_ident("embedding")
        };
        select.push(format!(
            "{} AS {}",
            extension.distance_expr(&embedding_col, "$1"),
            quote_ident("_distance")
        ));

        let mut params = vec![SqlParam::Text(extension.insert_literal(vector))];
        let mut sql = format!("SELECT {} FROM {}", select.join(", "), table);

        if let Some(f) = filter
            && !f.joins.is_empty()
        {
            sql.push(' ');
            sql.push_str(&compile_joins(&f.joins)?);
        }

        if let Some(f) = filter {
            let selected = f
                .metadata_filter
                .as_ref()
                .map(|dsl| (FilterMode::Metadata, dsl))
                .or_else(|| f.column_filter.as_ref().map(|dsl| (FilterMode::Column, dsl)));
            if let Some((mode, dsl)) = selected
                && let Some(compiled) =
                    compile_where(dsl, mode, &config.page_content_column, params.len() + 1)?
            {
                sql.push(' ');
                sql.push_str(&compiled.sql);
                params.extend(compiled.params);
            }
        }

        sql.push_str(&format!(
            " ORDER BY {} LIMIT ${}",
            quote_ident("_distance"),
            params.len() + 1
        ));
        params.push(SqlParam::Int(k as i64));

        Ok((sql, params))
    }

    fn decode_candidate(
        &self,
        row: &PgRow,
        filter: Option<&SearchFilter>,
        include_embeddings: bool,
    ) -> Result<Candidate> {
        let config = self.config();

        let id: Uuid = row.try_get("id")?;
        let page_content: String = row
            .try_get::<Option<String>, _>(config.page_content_column.as_str())?
            .unwrap_or_default();
        let mut metadata: Value = row
            .try_get::<Option<Value>, _>("metadata")?
            .unwrap_or_else(|| Value::Object(Default::default()));

        if let Some(fields) = metadata.as_object_mut() {
            for extra in config.extra_columns.iter().filter(|e| e.returned) {
                if let Some(value) = decode_dynamic(row, &extra.name) {
                    fields.insert(extra.name.clone(), value);
                }
            }
            if let Some(f) = filter {
                for column in &f.select_columns {
                    let key = column.rsplit('.').next().unwrap_or(column);
                    if let Some(value) = decode_dynamic(row, key) {
                        fields.insert(key.to_string(), value);
                    }
                }
            }
        }

        let distance: f64 = row
            .try_get::<f64, _>("_distance")
            .or_else(|_| row.try_get::<f32, _>("_distance").map(f64::from))?;

        let embedding = if include_embeddings {
            let raw: String = row.try_get("embedding_text")?;
            Some(self.extension().parse_embedding(&raw)?)
        } else {
            None
        };

        Ok(Candidate {
            document: Document {
                id: Some(id),
                page_content,
                metadata,
            },
            distance,
            embedding,
        })
    }
}

/// Decode a column whose Postgres type is only known at runtime by trying
/// the types extra columns are declared with. SQL NULL decodes to JSON null.
fn decode_dynamic(row: &PgRow, column: &str) -> Option<Value> {
    if let Ok(v) = row.try_get::<Option<bool>, _>(column) {
        return Some(v.map_or(Value::Null, Value::Bool));
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(column) {
        return Some(v.map_or(Value::Null, |n| Value::from(n as i64)));
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(column) {
        return Some(v.map_or(Value::Null, |n| Value::from(n as i64)));
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column) {
        return Some(v.map_or(Value::Null, Value::from));
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(column) {
        return Some(v.map_or(Value::Null, |n| Value::from(n as f64)));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column) {
        return Some(v.map_or(Value::Null, Value::from));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(column) {
        return Some(v.map_or(Value::Null, Value::String));
    }
    if let Ok(v) = row.try_get::<Option<Uuid>, _>(column) {
        return Some(v.map_or(Value::Null, |u| Value::String(u.to_string())));
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(column) {
        return Some(v.map_or(Value::Null, |t| Value::String(t.to_rfc3339())));
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(column) {
        return Some(v.unwrap_or(Value::Null));
    }
    None
}
