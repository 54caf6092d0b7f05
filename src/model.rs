//! Core data model.
//!
//! A document is a unit of retrievable content: text, semi-structured
//! metadata, and a dense embedding stored in a caller-shaped table. Extra
//! columns are first-class table columns declared at store construction,
//! usable as filter targets and join anchors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::join::JoinClause;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document record. `id` is `None` until the row exists (the server
/// generates one on insert unless an explicit id is supplied).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub page_content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            id: None,
            page_content: page_content.into(),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ---------------------------------------------------------------------------
// Extra columns
// ---------------------------------------------------------------------------

/// A caller-declared first-class column on the storage table.
///
/// `sql_type` is trusted construction-time DDL input (it is interpolated
/// into `CREATE TABLE`); row values for the column are always parameterized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraColumn {
    /// Column name. Quoted wherever it reaches SQL.
    pub name: String,
    /// Postgres type, e.g. `integer`, `text`, `timestamptz`.
    pub sql_type: String,
    /// Included in SELECT result columns and merged into `Document.metadata`.
    #[serde(default)]
    pub returned: bool,
    /// Must be supplied on every insert.
    #[serde(default)]
    pub not_null: bool,
    /// Optional foreign key target.
    #[serde(default)]
    pub references: Option<ColumnRef>,
}

impl ExtraColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            returned: false,
            not_null: false,
            references: None,
        }
    }

    pub fn returned(mut self) -> Self {
        self.returned = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn references(mut self, target: ColumnRef) -> Self {
        self.references = Some(target);
        self
    }
}

/// A `table(.column)` reference; the column defaults to `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: "id".to_string(),
        }
    }

    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Search options
// ---------------------------------------------------------------------------

/// Filter argument accepted by the search APIs.
///
/// `metadata_filter` and `column_filter` are mutually exclusive; both carry
/// the JSON-shaped DSL (`$and`, `$or`, comparators, `$textSearch`). Joins are
/// emitted in order after the base FROM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    pub metadata_filter: Option<Value>,
    pub column_filter: Option<Value>,
    pub joins: Vec<JoinClause>,
    /// Additional column names to fetch and merge into `Document.metadata`,
    /// on top of the declared `returned` extras.
    pub select_columns: Vec<String>,
}

impl SearchFilter {
    pub fn metadata(filter: Value) -> Self {
        Self {
            metadata_filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn column(filter: Value) -> Self {
        Self {
            column_filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn with_join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }
}

/// Options for maximal-marginal-relevance search.
#[derive(Debug, Clone)]
pub struct MmrOptions {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda: f32,
    pub filter: Option<SearchFilter>,
}

impl MmrOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            fetch_k: 20,
            lambda: 0.7,
            filter: None,
        }
    }

    pub fn fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = fetch_k;
        self
    }

    pub fn lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn filter(mut self, filter: SearchFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Options for inserts. Supplying `ids` turns the insert into an upsert on
/// the primary key; last writer within a batch wins.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub ids: Option<Vec<Uuid>>,
}

/// User-supplied HNSW index parameters, passed through to the extension's
/// index DDL.
#[derive(Debug, Clone, Default)]
pub struct HnswOptions {
    pub m: Option<u32>,
    pub ef_construction: Option<u32>,
    pub ef_search: Option<u32>,
}
