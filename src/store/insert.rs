//! Vector insertion: batched multi-row INSERT with optional upsert-by-id.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::extension::VectorExtension;
use crate::model::{AddOptions, Document};
use crate::value::{SqlParam, quote_ident};

use super::{DocumentStore, StoreConfig};

impl DocumentStore {
    /// Embed documents and insert them. Returns the row ids in input order.
    pub async fn add_documents(
        &self,
        documents: &[Document],
        opts: &AddOptions,
    ) -> Result<Vec<Uuid>> {
        let texts: Vec<String> = documents
            .iter()
            .map(|doc| doc.page_content.clone())
            .collect();
        let vectors = self.embedder().embed_documents(&texts).await?;
        self.add_vectors(&vectors, documents, opts).await
    }

    /// Insert pre-embedded documents through a single parameterized
    /// multi-row INSERT. With `opts.ids` the insert upserts on the primary
    /// key, overwriting every non-id column; last writer within a batch wins.
    pub async fn add_vectors(
        &self,
        vectors: &[Vec<f32>],
        documents: &[Document],
        opts: &AddOptions,
    ) -> Result<Vec<Uuid>> {
        if vectors.len() != documents.len() {
            return Err(Error::InvalidArgument(format!(
                "vector count {} does not match document count {}",
                vectors.len(),
                documents.len()
            )));
        }
        if let Some(ids) = &opts.ids
            && ids.len() != documents.len()
        {
            return Err(Error::InvalidArgument(format!(
                "id count {} does not match document count {}",
                ids.len(),
                documents.len()
            )));
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let dims = self.extension().dims() as usize;
        for vector in vectors {
            if vector.len() != dims {
                return Err(Error::InvalidArgument(format!(
                    "embedding width {} does not match configured dims {dims}",
                    vector.len()
                )));
            }
        }

        let (sql, params) = self.insert_statement(vectors, documents, opts.ids.as_deref())?;
        let rows = self.run_query(&sql, params).await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(Error::from))
            .collect()
    }

    /// Provision a store over an existing pool and load documents into it.
    pub async fn from_documents(
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
        extension: Arc<dyn VectorExtension>,
        pool: PgPool,
        config: StoreConfig,
    ) -> Result<Self> {
        let store = Self::with_pool(embedder, extension, pool, config);
        store.ensure_table().await?;
        store.add_documents(documents, &AddOptions::default()).await?;
        Ok(store)
    }

    /// Provision a store and load raw texts with their metadata.
    pub async fn from_texts(
        texts: &[String],
        metadatas: &[serde_json::Value],
        embedder: Arc<dyn Embedder>,
        extension: Arc<dyn VectorExtension>,
        pool: PgPool,
        config: StoreConfig,
    ) -> Result<Self> {
        if texts.len() != metadatas.len() {
            return Err(Error::InvalidArgument(format!(
                "text count {} does not match metadata count {}",
                texts.len(),
                metadatas.len()
            )));
        }
        let documents: Vec<Document> = texts
            .iter()
            .zip(metadatas)
            .map(|(text, metadata)| Document::new(text.clone()).with_metadata(metadata.clone()))
            .collect();
        Self::from_documents(documents.as_slice(), embedder, extension, pool, config).await
    }

    /// Delete rows by explicit id. Missing ids are not an error.
    pub async fn delete_documents_by_id(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {} WHERE {} = ANY($1)",
            quote_ident(&self.config().table_name),
            quote_ident("id")
        );
        self.run_query(&sql, vec![SqlParam::Uuids(ids.to_vec())])
            .await?;
        Ok(())
    }

    /// Assemble the multi-row INSERT and its parameters.
    ///
    /// Extra-column values are drawn from each document's metadata by column
    /// name; keys that match no declared extra simply stay metadata. A
    /// missing nullable extra becomes a literal NULL (no parameter), so the
    /// column keeps its declared type without a bind-side guess.
    fn insert_statement(
        &self,
        vectors: &[Vec<f32>],
        documents: &[Document],
        ids: Option<&[Uuid]>,
    ) -> Result<(String, Vec<SqlParam>)> {
        let config = self.config();
        let extension = self.extension();

        let mut columns = vec![
            quote_ident(&config.page_content_column),
            quote_ident("metadata"),
            quote_ident("embedding"),
        ];
        for extra in &config.extra_columns {
            columns.push(quote_ident(&extra.name));
        }
        if ids.is_some() {
            columns.push(quote_ident("id"));
        }

        let mut params = Vec::new();
        let mut rows = Vec::with_capacity(documents.len());
        let mut next = 1usize;
        let mut placeholder = |params: &mut Vec<SqlParam>, param: SqlParam| {
            let text = format!("${next}");
            next += 1;
            params.push(param);
            text
        };

        for (i, (doc, vector)) in documents.iter().zip(vectors).enumerate() {
            let mut cells = vec![
                placeholder(&mut params, SqlParam::Text(doc.page_content.clone())),
                placeholder(&mut params, SqlParam::Json(doc.metadata.clone())),
                format!(
                    "{}{}",
                    placeholder(
                        &mut params,
                        SqlParam::Text(extension.insert_literal(vector))
                    ),
                    extension.insert_cast()
                ),
            ];
            for extra in &config.extra_columns {
                match doc.metadata.get(&extra.name) {
                    Some(value) if !value.is_null() => {
                        cells.push(placeholder(
                            &mut params,
                            SqlParam::from_insert_value(value),
                        ));
                    }
                    _ if extra.not_null => {
                        return Err(Error::InvalidArgument(format!(
                            "extra column {} is NOT NULL but has no value",
                            extra.name
                        )));
                    }
                    _ => cells.push("NULL".to_string()),
                }
            }
            if let Some(ids) = ids {
                cells.push(placeholder(&mut params, SqlParam::Uuid(ids[i])));
            }
            rows.push(format!("({})", cells.join(", ")));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(&config.table_name),
            columns.join(", "),
            rows.join(", ")
        );
        if ids.is_some() {
            let assignments: Vec<String> = columns
                .iter()
                .filter(|column| *column != &quote_ident("id"))
                .map(|column| format!("{column} = EXCLUDED.{column}"))
                .collect();
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                quote_ident("id"),
                assignments.join(", ")
            ));
        }
        sql.push_str(&format!(" RETURNING {}", quote_ident("id")));

        Ok((sql, params))
    }
}
