//! Document store: table provisioning, the query-execution indirection, and
//! connection management.
//!
//! The store holds no mutable state beyond configuration fixed at
//! construction; concurrent calls are as safe as the pool underneath. Data
//! reads and writes all pass through [`DocumentStore::run_query`], which is
//! where the RLS session hook and the extension's pre-query statements are
//! applied, always transaction-locally.

pub mod index;
pub mod insert;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::{PgPoolOptions, PgRow};
use tracing::debug;

use crate::embedder::Embedder;
use crate::error::Result;
use crate::extension::VectorExtension;
use crate::model::ExtraColumn;
use crate::session::SessionSettings;
use crate::value::{SqlParam, quote_ident};

/// Store construction options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base table; quoted wherever it reaches SQL.
    pub table_name: String,
    /// Name of the text column.
    pub page_content_column: String,
    /// Caller-declared first-class columns, fixed for the store's lifetime.
    pub extra_columns: Vec<ExtraColumn>,
    /// Route fetches through the extension's query wrapper.
    pub use_hnsw_index: bool,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "documents".to_string(),
            page_content_column: "content".to_string(),
            extra_columns: Vec::new(),
            use_hnsw_index: false,
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Postgres-backed vector store.
pub struct DocumentStore {
    pool: PgPool,
    embedder: Arc<dyn Embedder>,
    extension: Arc<dyn VectorExtension>,
    config: StoreConfig,
    session: Option<Arc<dyn SessionSettings>>,
}

impl DocumentStore {
    /// Connect a new pool and build a store around it.
    pub async fn connect(
        embedder: Arc<dyn Embedder>,
        extension: Arc<dyn VectorExtension>,
        database_url: &SecretString,
        config: StoreConfig,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self::with_pool(embedder, extension, pool, config))
    }

    /// Build a store around an existing pool.
    pub fn with_pool(
        embedder: Arc<dyn Embedder>,
        extension: Arc<dyn VectorExtension>,
        pool: PgPool,
        config: StoreConfig,
    ) -> Self {
        Self {
            pool,
            embedder,
            extension,
            config,
            session: None,
        }
    }

    /// Install a per-query session hook (e.g. JWT claims for RLS).
    pub fn with_session_settings(mut self, hook: Arc<dyn SessionSettings>) -> Self {
        self.session = Some(hook);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn extension(&self) -> &Arc<dyn VectorExtension> {
        &self.extension
    }

    pub(crate) fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Idempotent provisioning: extensions, uuid generator, table with core
    /// columns and declared extras.
    pub async fn ensure_table(&self) -> Result<()> {
        let statements = self.table_ddl();
        for statement in &statements {
            debug!(sql = statement.as_str(), "ensure_table");
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn table_ddl(&self) -> Vec<String> {
        let mut columns = vec![
            format!(
                "{} uuid NOT NULL PRIMARY KEY DEFAULT uuid_generate_v4()",
                quote_ident("id")
            ),
            format!("{} text", quote_ident(&self.config.page_content_column)),
            format!("{} jsonb", quote_ident("metadata")),
            format!(
                "{} {}",
                quote_ident("embedding"),
                self.extension.column_type()
            ),
        ];
        for extra in &self.config.extra_columns {
            let mut column = format!("{} {}", quote_ident(&extra.name), extra.sql_type);
            if extra.not_null {
                column.push_str(" NOT NULL");
            }
            if let Some(target) = &extra.references {
                column.push_str(&format!(
                    " REFERENCES {} ({})",
                    quote_ident(&target.table),
                    quote_ident(&target.column)
                ));
            }
            columns.push(column);
        }

        vec![
            "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"".to_string(),
            self.extension.extension_ddl(),
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                quote_ident(&self.config.table_name),
                columns.join(", ")
            ),
        ]
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Execute a data-plane statement with its parameters.
    ///
    /// When a session hook is installed, or the extension wants pre-query
    /// statements under HNSW, the statement runs inside one transaction:
    /// `set_config(key, value, true)` for each hook pair first, then the
    /// extension's statements, then the query. Everything is
    /// transaction-local, so pooled connections come back clean.
    pub(crate) async fn run_query(
        &self,
        sql: &str,
        params: Vec<SqlParam>,
    ) -> Result<Vec<PgRow>> {
        let pre_query = if self.config.use_hnsw_index {
            self.extension.pre_query_sql()
        } else {
            Vec::new()
        };

        let mut query = sqlx::query(sql);
        for param in params {
            query = param.bind_to(query);
        }

        if self.session.is_none() && pre_query.is_empty() {
            return Ok(query.fetch_all(&self.pool).await?);
        }

        let mut tx = self.pool.begin().await?;
        if let Some(hook) = &self.session {
            for (key, value) in hook.settings().await? {
                sqlx::query("SELECT set_config($1, $2, true)")
                    .bind(key)
                    .bind(value)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        for statement in &pre_query {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        let rows = query.fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{Metric, PgVector};
    use crate::model::ColumnRef;

    struct NoopEmbedder;

    #[async_trait::async_trait]
    impl Embedder for NoopEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 3])
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    fn test_store(config: StoreConfig) -> DocumentStore {
        let extension = Arc::new(PgVector::new(3, Metric::Cosine).unwrap());
        let pool = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(async { PgPool::connect_lazy("postgres://localhost/unused") })
            .unwrap();
        DocumentStore::with_pool(Arc::new(NoopEmbedder), extension, pool, config)
    }

    #[test]
    fn table_ddl_covers_extensions_and_extras() {
        let config = StoreConfig {
            extra_columns: vec![
                ExtraColumn::new("extra_stuff", "integer")
                    .not_null()
                    .references(ColumnRef::table("some_extra_stuff")),
                ExtraColumn::new("note", "text").returned(),
            ],
            ..Default::default()
        };
        let ddl = test_store(config).table_ddl();
        assert_eq!(ddl[0], "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"");
        assert_eq!(ddl[1], "CREATE EXTENSION IF NOT EXISTS vector");
        assert_eq!(
            ddl[2],
            "CREATE TABLE IF NOT EXISTS \"documents\" (\
             \"id\" uuid NOT NULL PRIMARY KEY DEFAULT uuid_generate_v4(), \
             \"content\" text, \
             \"metadata\" jsonb, \
             \"embedding\" vector(3), \
             \"extra_stuff\" integer NOT NULL REFERENCES \"some_extra_stuff\" (\"id\"), \
             \"note\" text)"
        );
    }

    #[test]
    fn page_content_column_is_configurable() {
        let config = StoreConfig {
            page_content_column: "body".to_string(),
            ..Default::default()
        };
        let ddl = test_store(config).table_ddl();
        assert!(ddl[2].contains("\"body\" text"));
    }
}
