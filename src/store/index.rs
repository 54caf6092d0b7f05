//! HNSW index lifecycle.

use tracing::debug;

use crate::error::Result;
use crate::model::HnswOptions;
use crate::value::quote_ident;

use super::DocumentStore;

impl DocumentStore {
    /// Build an HNSW index over the embedding column, with the extension's
    /// DDL and the supplied parameters.
    pub async fn build_index(&self, name: &str, opts: &HnswOptions) -> Result<()> {
        let statements = self.extension().hnsw_index_sql(
            name,
            &self.config().table_name,
            "embedding",
            opts,
        );
        for statement in &statements {
            debug!(sql = statement.as_str(), "build_index");
            sqlx::query(statement).execute(self.pool()).await?;
        }
        Ok(())
    }

    /// Drop an index by name. Dropping a missing index is a no-op.
    pub async fn drop_index(&self, name: &str) -> Result<()> {
        let sql = format!("DROP INDEX IF EXISTS {}", quote_ident(name));
        debug!(sql = sql.as_str(), "drop_index");
        sqlx::query(&sql).execute(self.pool()).await?;
        Ok(())
    }
}
