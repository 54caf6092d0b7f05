//! Filter AST → parameterized SQL.
//!
//! Two modes share one compiler. Metadata mode targets JSONB paths: the key
//! itself binds as a positional parameter behind `metadata->>`/`metadata->`
//! and the clause is cast per the scalar's classification. Column mode binds
//! the field as a quoted identifier (dot-qualified fields split per part) and
//! applies no cast. Scalar values always bind as `$N` parameters.

use serde_json::Value;

use crate::error::Result;
use crate::filter::{Filter, TsQueryKind};
use crate::value::{SqlParam, json_arrow, quote_ident, quote_qualified, sql_cast};

/// Which side of the table the filter targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// JSONB paths under the `metadata` column.
    Metadata,
    /// First-class columns, optionally table-qualified.
    Column,
}

/// A rendered WHERE fragment and its bind parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Parse and compile a DSL value into a `WHERE `-prefixed fragment.
/// `first_param` is the number the first placeholder takes, letting the
/// caller reserve earlier positions (the query vector is `$1` in fetches).
pub fn compile_where(
    dsl: &Value,
    mode: FilterMode,
    page_content_column: &str,
    first_param: usize,
) -> Result<Option<CompiledFilter>> {
    let Some(filter) = Filter::parse(dsl)? else {
        return Ok(None);
    };
    Ok(filter
        .compile(mode, page_content_column, first_param)
        .map(|compiled| CompiledFilter {
            sql: format!("WHERE {}", compiled.sql),
            params: compiled.params,
        }))
}

impl Filter {
    /// Compile to a bare fragment (no `WHERE` prefix). `None` when the
    /// fragment would be empty.
    pub fn compile(
        &self,
        mode: FilterMode,
        page_content_column: &str,
        first_param: usize,
    ) -> Option<CompiledFilter> {
        let mut compiler = Compiler {
            mode,
            page_content_column,
            next: first_param,
            params: Vec::new(),
        };
        let sql = compiler.emit(self);
        if sql.is_empty() {
            None
        } else {
            Some(CompiledFilter {
                sql,
                params: compiler.params,
            })
        }
    }
}

struct Compiler<'a> {
    mode: FilterMode,
    page_content_column: &'a str,
    next: usize,
    params: Vec<SqlParam>,
}

impl Compiler<'_> {
    fn push(&mut self, param: SqlParam) -> String {
        let placeholder = format!("${}", self.next);
        self.next += 1;
        self.params.push(param);
        placeholder
    }

    fn emit(&mut self, filter: &Filter) -> String {
        match filter {
            Filter::And(children) => self.emit_group(children, " AND "),
            Filter::Or(children) => self.emit_group(children, " OR "),
            Filter::Cmp { field, op, value } => {
                let column = self.column_expr(field, value);
                let placeholder = self.push(SqlParam::from_scalar(value));
                format!("{column} {} {placeholder}", op.as_sql())
            }
            Filter::TextSearch {
                field,
                query,
                kind,
                config,
            } => {
                let vector_config = self.push(SqlParam::Text(config.clone()));
                let column = self.text_column_expr(field);
                let query_config = self.push(SqlParam::Text(config.clone()));
                let query_param = self.push(SqlParam::Text(query.clone()));
                format!(
                    "to_tsvector({vector_config}, {column}) @@ {}({query_config}, {query_param})",
                    TsQueryKind::ts_function(*kind)
                )
            }
        }
    }

    fn emit_group(&mut self, children: &[Filter], separator: &str) -> String {
        let parts: Vec<String> = children
            .iter()
            .map(|child| self.emit(child))
            .filter(|fragment| !fragment.is_empty())
            .collect();
        match parts.len() {
            0 => String::new(),
            1 => parts.into_iter().next().unwrap(),
            _ => format!("({})", parts.join(separator)),
        }
    }

    fn column_expr(&mut self, field: &str, value: &Value) -> String {
        match self.mode {
            FilterMode::Column => quote_qualified(field),
            FilterMode::Metadata if field == self.page_content_column => quote_ident(field),
            FilterMode::Metadata => {
                let arrow = json_arrow(value);
                let cast = sql_cast(value);
                let key = self.push(SqlParam::Text(field.to_string()));
                format!("(metadata{arrow}{key}){cast}")
            }
        }
    }

    fn text_column_expr(&mut self, field: &str) -> String {
        match self.mode {
            FilterMode::Column => quote_qualified(field),
            FilterMode::Metadata if field == self.page_content_column => quote_ident(field),
            FilterMode::Metadata => {
                let key = self.push(SqlParam::Text(field.to_string()));
                format!("(metadata->>{key})::text")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> SqlParam {
        SqlParam::Text(s.to_string())
    }

    fn mixed_operator_filter() -> Value {
        json!({
            "$or": [
                {"stuff": {"$eq": "hello"}},
                {"hello": "stuff"},
                {"$and": [
                    {"hello": "stuff"},
                    {"content": {"$textSearch": {
                        "query": "hello",
                        "config": "english",
                        "type": "plain"
                    }}}
                ]}
            ]
        })
    }

    #[test]
    fn metadata_mode_mixed_operators() {
        let compiled = compile_where(&mixed_operator_filter(), FilterMode::Metadata, "text", 1)
            .unwrap()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "WHERE ((metadata->>$1)::text = $2 OR (metadata->>$3)::text = $4 OR \
             ((metadata->>$5)::text = $6 AND \
             to_tsvector($7, (metadata->>$8)::text) @@ plainto_tsquery($9, $10)))"
        );
        assert_eq!(
            compiled.params,
            vec![
                text("stuff"),
                text("hello"),
                text("hello"),
                text("stuff"),
                text("hello"),
                text("stuff"),
                text("english"),
                text("content"),
                text("english"),
                text("hello"),
            ]
        );
    }

    #[test]
    fn column_mode_mixed_operators() {
        let compiled = compile_where(&mixed_operator_filter(), FilterMode::Column, "text", 1)
            .unwrap()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "WHERE (\"stuff\" = $1 OR \"hello\" = $2 OR \
             (\"hello\" = $3 AND to_tsvector($4, \"content\") @@ plainto_tsquery($5, $6)))"
        );
        assert_eq!(
            compiled.params,
            vec![
                text("hello"),
                text("stuff"),
                text("stuff"),
                text("english"),
                text("english"),
                text("hello"),
            ]
        );
    }

    #[test]
    fn numeric_values_use_arrow_and_cast() {
        let compiled = compile_where(
            &json!({"count": {"$gte": 3}}),
            FilterMode::Metadata,
            "content",
            1,
        )
        .unwrap()
        .unwrap();
        assert_eq!(compiled.sql, "WHERE (metadata->$1)::int >= $2");
        assert_eq!(compiled.params, vec![text("count"), SqlParam::Int(3)]);
    }

    #[test]
    fn float_values_cast_to_float() {
        let compiled = compile_where(
            &json!({"score": {"$lt": 0.5}}),
            FilterMode::Metadata,
            "content",
            1,
        )
        .unwrap()
        .unwrap();
        assert_eq!(compiled.sql, "WHERE (metadata->$1)::float < $2");
        assert_eq!(compiled.params, vec![text("score"), SqlParam::Float(0.5)]);
    }

    #[test]
    fn page_content_field_bypasses_metadata() {
        let compiled = compile_where(
            &json!({"content": {"$textSearch": {"query": "hi", "config": "english", "type": "phrase"}}}),
            FilterMode::Metadata,
            "content",
            1,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            compiled.sql,
            "WHERE to_tsvector($1, \"content\") @@ phraseto_tsquery($2, $3)"
        );
    }

    #[test]
    fn qualified_column_keys_split_and_quote() {
        let compiled = compile_where(
            &json!({"some_extra_stuff.type": {"$eq": "hello"}}),
            FilterMode::Column,
            "content",
            2,
        )
        .unwrap()
        .unwrap();
        assert_eq!(compiled.sql, "WHERE \"some_extra_stuff\".\"type\" = $2");
        assert_eq!(compiled.params, vec![text("hello")]);
    }

    #[test]
    fn first_param_offsets_placeholders() {
        let compiled = compile_where(
            &json!({"hello": "stuff"}),
            FilterMode::Metadata,
            "content",
            2,
        )
        .unwrap()
        .unwrap();
        assert_eq!(compiled.sql, "WHERE (metadata->>$2)::text = $3");
    }

    #[test]
    fn hostile_column_key_stays_inside_quotes() {
        let key = "extra_stuff = 'x'); DROP TABLE documents; --";
        let compiled = compile_where(
            &json!({key: {"$eq": "hi"}}),
            FilterMode::Column,
            "content",
            1,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            compiled.sql,
            "WHERE \"extra_stuff = 'x'); DROP TABLE documents; --\" = $1"
        );
        assert_eq!(compiled.params, vec![text("hi")]);
    }

    #[test]
    fn empty_filter_compiles_to_none() {
        assert_eq!(
            compile_where(&json!({}), FilterMode::Metadata, "content", 1).unwrap(),
            None
        );
        assert_eq!(
            compile_where(&json!({"a": 0}), FilterMode::Column, "content", 1).unwrap(),
            None
        );
    }

    #[test]
    fn default_text_search_kind_is_to_tsquery() {
        let compiled = compile_where(
            &json!({"body": {"$textSearch": {"query": "x & y", "config": "english"}}}),
            FilterMode::Column,
            "content",
            1,
        )
        .unwrap()
        .unwrap();
        assert!(compiled.sql.contains("@@ to_tsquery($2, $3)"));
    }
}
