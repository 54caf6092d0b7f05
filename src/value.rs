//! Scalar classification and identifier quoting for SQL emission.
//!
//! Filter values arrive as `serde_json::Value` scalars. What kind of scalar
//! a value is decides the SQL cast (`::int`, `::float`, `::text`) and, for
//! metadata paths, the JSON accessor (`->` for numerics, `->>` for text).
//! A string counts as numeric only if it round-trips: parse, format, and
//! compare equal to the original.
//!
//! Identifiers derived from user input (filter keys in column mode, join
//! tables, extra column names) never reach SQL unquoted: [`quote_ident`]
//! always wraps in `"` and doubles embedded quotes.

use serde_json::Value;
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;

/// True if the value is an integer, or a string that round-trips to one.
pub fn is_int(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        Value::String(s) => s.parse::<i64>().is_ok_and(|n| n.to_string() == *s),
        _ => false,
    }
}

/// True if the value is a float with a fractional part, or a string that
/// round-trips to one.
pub fn is_float(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(|f| f.fract() != 0.0),
        Value::String(s) => {
            !is_int(value) && s.parse::<f64>().is_ok_and(|f| f.to_string() == *s)
        }
        _ => false,
    }
}

/// True if the value is a string that is not a numeric round-trip.
pub fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_)) && !is_int(value) && !is_float(value)
}

/// SQL cast suffix for a scalar, per its classification.
pub fn sql_cast(value: &Value) -> &'static str {
    if is_int(value) {
        "::int"
    } else if is_float(value) {
        "::float"
    } else {
        "::text"
    }
}

/// JSONB accessor for a metadata path: `->` keeps numerics typed, `->>`
/// extracts text.
pub fn json_arrow(value: &Value) -> &'static str {
    if is_int(value) || is_float(value) {
        "->"
    } else {
        "->>"
    }
}

/// Quote a single identifier. Always quotes, to cover reserved words, and
/// doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly dot-qualified identifier (`table.column`) part by part.
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// A typed positional parameter destined for a sqlx bind.
///
/// The filter compiler never concatenates user scalars into SQL text; it
/// collects them as `SqlParam`s and the store binds them in order. The store
/// uses the same carrier for its own dynamically assembled statements.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(Value),
    Uuid(uuid::Uuid),
    Uuids(Vec<uuid::Uuid>),
}

impl SqlParam {
    /// Classify a DSL scalar into its bind type. Numeric round-trip strings
    /// bind as numbers so the emitted cast matches the parameter type.
    pub fn from_scalar(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlParam::Int(i)
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        SqlParam::Int(f as i64)
                    } else {
                        SqlParam::Float(f)
                    }
                } else {
                    SqlParam::Text(n.to_string())
                }
            }
            Value::String(s) => {
                if is_int(value) {
                    SqlParam::Int(s.parse().unwrap_or_default())
                } else if is_float(value) {
                    SqlParam::Float(s.parse().unwrap_or_default())
                } else {
                    SqlParam::Text(s.clone())
                }
            }
            Value::Bool(b) => SqlParam::Text(b.to_string()),
            other => SqlParam::Text(other.to_string()),
        }
    }

    /// Classify a row value for insertion. Unlike [`SqlParam::from_scalar`],
    /// booleans bind natively (extra columns may be `boolean`) and compound
    /// values bind as JSONB.
    pub fn from_insert_value(value: &Value) -> Self {
        match value {
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlParam::Int(i)
                } else {
                    SqlParam::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => SqlParam::Text(s.clone()),
            other => SqlParam::Json(other.clone()),
        }
    }

    /// Push this parameter onto a dynamically built query.
    pub fn bind_to<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlParam::Text(s) => query.bind(s),
            SqlParam::Int(i) => query.bind(i),
            SqlParam::Float(f) => query.bind(f),
            SqlParam::Bool(b) => query.bind(b),
            SqlParam::Json(v) => query.bind(v),
            SqlParam::Uuid(u) => query.bind(u),
            SqlParam::Uuids(us) => query.bind(us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_classification() {
        assert!(is_int(&json!(7)));
        assert!(is_int(&json!(-3)));
        assert!(is_int(&json!(2.0)));
        assert!(is_int(&json!("42")));
        assert!(!is_int(&json!("42.5")));
        assert!(!is_int(&json!("042"))); // does not round-trip
        assert!(!is_int(&json!("hello")));
        assert!(!is_int(&json!(1.5)));
    }

    #[test]
    fn float_classification() {
        assert!(is_float(&json!(1.5)));
        assert!(is_float(&json!("1.5")));
        assert!(!is_float(&json!("1.50"))); // does not round-trip
        assert!(!is_float(&json!(2)));
        assert!(!is_float(&json!(2.0)));
        assert!(!is_float(&json!("7")));
        assert!(!is_float(&json!("abc")));
    }

    #[test]
    fn string_classification() {
        assert!(is_string(&json!("hello")));
        assert!(is_string(&json!("1.50")));
        assert!(!is_string(&json!("7")));
        assert!(!is_string(&json!("1.5")));
        assert!(!is_string(&json!(7)));
    }

    #[test]
    fn cast_and_arrow_follow_classification() {
        assert_eq!(sql_cast(&json!("hello")), "::text");
        assert_eq!(sql_cast(&json!(7)), "::int");
        assert_eq!(sql_cast(&json!(1.5)), "::float");
        assert_eq!(json_arrow(&json!("hello")), "->>");
        assert_eq!(json_arrow(&json!(7)), "->");
        assert_eq!(json_arrow(&json!(1.5)), "->");
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(
            quote_ident("x\"; DROP TABLE t; --"),
            "\"x\"\"; DROP TABLE t; --\""
        );
        assert_eq!(quote_qualified("t.extra_stuff"), "\"t\".\"extra_stuff\"");
    }

    #[test]
    fn scalar_params_carry_their_type() {
        assert_eq!(SqlParam::from_scalar(&json!("hi")), SqlParam::Text("hi".into()));
        assert_eq!(SqlParam::from_scalar(&json!(7)), SqlParam::Int(7));
        assert_eq!(SqlParam::from_scalar(&json!("7")), SqlParam::Int(7));
        assert_eq!(SqlParam::from_scalar(&json!(1.5)), SqlParam::Float(1.5));
    }
}
