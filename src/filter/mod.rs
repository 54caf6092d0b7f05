//! Filter DSL: parsing the JSON-shaped comparator/logical language.
//!
//! The DSL is a nested object language — `{$and: […]}`, `{$or: […]}`,
//! `{field: scalar}` (implicit `$eq`), `{field: {$gte: 3, $lt: 9}}`,
//! `{field: {$textSearch: {query, type?, config?}}}` — parsed in one pass
//! into a tagged AST, then compiled to SQL in a second pass
//! ([`compile`]). Only field names and scalar values ever cross into SQL,
//! and both go through the driver's escaping or parameter layer.

pub mod compile;

pub use compile::{CompiledFilter, FilterMode, compile_where};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Cmp {
        field: String,
        op: Comparator,
        value: Value,
    },
    TextSearch {
        field: String,
        query: String,
        kind: Option<TsQueryKind>,
        config: String,
    },
}

/// Comparison operator. The token table is closed; anything else is an
/// [`Error::InvalidArgument`] at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparator {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "$eq" => Some(Self::Eq),
            "$neq" | "$not" => Some(Self::Neq),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

/// Text-search query constructor variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsQueryKind {
    Plain,
    Phrase,
    Websearch,
}

impl TsQueryKind {
    fn parse(token: &str) -> Result<Self> {
        match token {
            "plain" => Ok(Self::Plain),
            "phrase" => Ok(Self::Phrase),
            "websearch" => Ok(Self::Websearch),
            other => Err(Error::InvalidArgument(format!(
                "unknown $textSearch type: {other}"
            ))),
        }
    }

    pub fn ts_function(kind: Option<Self>) -> &'static str {
        match kind {
            None => "to_tsquery",
            Some(Self::Plain) => "plainto_tsquery",
            Some(Self::Phrase) => "phraseto_tsquery",
            Some(Self::Websearch) => "websearch_to_tsquery",
        }
    }
}

impl Filter {
    /// Parse the DSL. Returns `None` when nothing survives (empty object,
    /// or every entry dropped as falsy).
    pub fn parse(dsl: &Value) -> Result<Option<Filter>> {
        let obj = dsl
            .as_object()
            .ok_or_else(|| Error::InvalidArgument("filter must be an object".to_string()))?;
        Ok(group(parse_entries(obj)?, false))
    }
}

fn group(mut children: Vec<Filter>, or: bool) -> Option<Filter> {
    match children.len() {
        0 => None,
        1 => Some(children.remove(0)),
        _ => Some(if or {
            Filter::Or(children)
        } else {
            Filter::And(children)
        }),
    }
}

fn parse_entries(obj: &Map<String, Value>) -> Result<Vec<Filter>> {
    let mut out = Vec::new();
    for (key, value) in obj {
        match key.as_str() {
            "$and" | "$or" => {
                let items = value.as_array().ok_or_else(|| {
                    Error::InvalidArgument(format!("{key} expects an array of filters"))
                })?;
                let mut children = Vec::new();
                for item in items {
                    if let Some(child) = Filter::parse(item)? {
                        children.push(child);
                    }
                }
                if let Some(node) = group(children, key == "$or") {
                    out.push(node);
                }
            }
            other if other.starts_with('$') => {
                return Err(Error::InvalidArgument(format!(
                    "unknown logical operator: {other}"
                )));
            }
            field => parse_field(field, value, &mut out)?,
        }
    }
    Ok(out)
}

fn parse_field(field: &str, value: &Value, out: &mut Vec<Filter>) -> Result<()> {
    match value {
        Value::Object(ops) => {
            // Operator map; multiple operators on one field AND-join.
            for (op_key, op_value) in ops {
                if op_key == "$textSearch" {
                    out.push(parse_text_search(field, op_value)?);
                    continue;
                }
                let op = Comparator::parse(op_key).ok_or_else(|| {
                    Error::InvalidArgument(format!("unknown comparator: {op_key}"))
                })?;
                if is_falsy(op_value) {
                    warn!(field, "dropping filter entry with falsy value");
                    continue;
                }
                out.push(Filter::Cmp {
                    field: field.to_string(),
                    op,
                    value: op_value.clone(),
                });
            }
        }
        scalar => {
            if is_falsy(scalar) {
                warn!(field, "dropping filter entry with falsy value");
                return Ok(());
            }
            out.push(Filter::Cmp {
                field: field.to_string(),
                op: Comparator::Eq,
                value: scalar.clone(),
            });
        }
    }
    Ok(())
}

fn parse_text_search(field: &str, input: &Value) -> Result<Filter> {
    let obj = input.as_object().ok_or_else(|| {
        Error::InvalidArgument("$textSearch expects an object".to_string())
    })?;
    let query = obj
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::InvalidArgument("$textSearch requires a string query".to_string())
        })?
        .to_string();
    let kind = match obj.get("type") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(TsQueryKind::parse(s)?),
        Some(_) => {
            return Err(Error::InvalidArgument(
                "$textSearch type must be a string".to_string(),
            ));
        }
    };
    let config = obj
        .get("config")
        .and_then(Value::as_str)
        .unwrap_or("simple")
        .to_string();
    Ok(Filter::TextSearch {
        field: field.to_string(),
        query,
        kind,
        config,
    })
}

/// Entries with falsy values (null, 0, "") are dropped from their group.
/// Long-standing behaviour of the DSL; kept, but loudly.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
