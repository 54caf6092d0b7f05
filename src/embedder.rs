//! Embedding collaborator seam.
//!
//! The store never generates embeddings itself; it is handed something that
//! maps text to fixed-width vectors. Implementations wrap whatever provider
//! the application uses and must produce vectors of the store's configured
//! dimensionality.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of document texts, one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
