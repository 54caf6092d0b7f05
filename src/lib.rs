//! # pgdocstore
//!
//! Postgres-backed vector store built on sqlx.
//!
//! Stores document records (text + JSONB metadata + dense embedding +
//! caller-declared extra columns), runs k-NN and maximal-marginal-relevance
//! retrieval through one of two pluggable vector extensions (pgvector,
//! pg_embedding), and compiles a JSON-shaped filter/join DSL into
//! parameterized SQL over either the metadata column or first-class columns.

pub mod embedder;
pub mod error;
pub mod extension;
pub mod filter;
pub mod join;
pub mod mmr;
pub mod model;
pub mod session;
pub mod store;
pub mod value;

pub use embedder::Embedder;
pub use error::{Error, Result};
pub use extension::{
    DEFAULT_DIMS, ExtensionKind, Metric, PgEmbedding, PgVector, VectorExtension,
    build_extension,
};
pub use filter::{CompiledFilter, Filter, FilterMode, compile_where};
pub use join::{JoinClause, JoinCondition};
pub use model::{
    AddOptions, ColumnRef, Document, ExtraColumn, HnswOptions, MmrOptions, SearchFilter,
};
pub use session::{JwtClaims, SessionSettings};
pub use store::{DocumentStore, StoreConfig};
