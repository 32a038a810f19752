//! Read and delete statements built around a compiled predicate.

use crate::predicate::{validate_key, Column, Predicate};
use crate::serializer::{Bind, Comma, Formatter, Ident, Params, ToSql};
use crate::Compiled;

use docsql_core::{schema::FieldType, Document, Result, Schema};
use indexmap::IndexMap;

/// Options of a `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub skip: Option<i64>,
    pub limit: Option<i64>,

    /// Field to direction; `1` sorts ascending, anything else descending.
    /// Dotted fields sort by the nested JSON value.
    pub sort: IndexMap<String, i64>,

    /// Columns to return. `ACL` selects both permission lists and `$score`
    /// the full-text rank; unknown and Relation keys are ignored.
    pub keys: Option<Vec<String>>,

    pub case_insensitive: bool,

    /// Return the query plan instead of rows.
    pub explain: bool,
}

const ALWAYS_SELECTABLE: [&str; 3] = ["objectId", "createdAt", "updatedAt"];

impl FindOptions {
    pub fn skip(mut self, skip: i64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: i64) -> FindOptions {
        self.sort.insert(field.into(), direction);
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> FindOptions
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}

/// `SELECT` for a `find`. Orderings the query requires (`$nearSphere`)
/// replace the requested sort.
pub fn compile_find(schema: &Schema, query: &Document, options: &FindOptions) -> Result<Compiled> {
    let mut params = Params::new();
    let predicate = Predicate::compile(schema, query, &mut params, options.case_insensitive)?;

    let mut columns = vec![];
    for key in options.keys.iter().flatten() {
        match key.as_str() {
            "ACL" => {
                columns.push(select(&mut params, |f| fmt!(f, Ident("_rperm"))));
                columns.push(select(&mut params, |f| fmt!(f, Ident("_wperm"))));
            }
            "$score" => {
                if let Some(search) = &predicate.text_search {
                    let column = Column::Text(search.field.as_str());
                    let language = search.language.clone();
                    let term = search.term.clone();
                    columns.push(select(&mut params, |f| {
                        fmt!(f,
                            "ts_rank_cd(to_tsvector(" Bind(language.clone()) "::text::regconfig, " column
                            "), to_tsquery(" Bind(language) "::text::regconfig, " Bind(term) "), 32) AS \"score\"")
                    }));
                }
            }
            "" => {}
            key => {
                let selectable = ALWAYS_SELECTABLE.contains(&key)
                    || schema
                        .field_type(key)
                        .is_some_and(|ty| !ty.is_relation());
                if selectable {
                    validate_key(key)?;
                    columns.push(select(&mut params, |f| fmt!(f, Ident(key))));
                }
            }
        }
    }
    if columns.is_empty() {
        columns.push("*".to_string());
    }

    let mut order_by = vec![];
    if !predicate.sorts.is_empty() {
        order_by = predicate.sorts.clone();
    } else {
        for (field, direction) in &options.sort {
            validate_key(field)?;
            let column = Column::Json(field.as_str());
            let direction = if *direction == 1 { " ASC" } else { " DESC" };
            order_by.push(select(&mut params, |f| fmt!(f, column direction)));
        }
    }

    let limit = options
        .limit
        .map(|limit| select(&mut params, |f| fmt!(f, " LIMIT " Bind(limit))));
    let offset = options
        .skip
        .map(|skip| select(&mut params, |f| fmt!(f, " OFFSET " Bind(skip))));

    let mut scratch = Params::new();
    let mut f = Formatter::new(&mut scratch);
    if options.explain {
        fmt!(&mut f, "EXPLAIN (ANALYZE, FORMAT JSON) ");
    }
    fmt!(&mut f, "SELECT " Comma(columns) " FROM " Ident(schema.class_name.as_str()) predicate.where_clause());
    if !order_by.is_empty() {
        fmt!(&mut f, " ORDER BY " Comma(order_by));
    }
    fmt!(&mut f, limit offset);

    Ok(Compiled {
        sql: f.finish(),
        params: params.into_values(),
    })
}

/// Exact row count of the rows matching `query`.
pub fn compile_count(schema: &Schema, query: &Document) -> Result<Compiled> {
    let mut params = Params::new();
    let predicate = Predicate::compile(schema, query, &mut params, false)?;

    let sql = select(&mut params, |f| {
        fmt!(f, "SELECT count(*) FROM " Ident(schema.class_name.as_str()) predicate.where_clause())
    });
    Ok(Compiled {
        sql,
        params: params.into_values(),
    })
}

/// The planner's row estimate for a table. The estimate is `-1` or null
/// for a table that was never analyzed.
pub fn compile_count_estimate(class_name: &str) -> Compiled {
    let mut params = Params::new();
    let sql = select(&mut params, |f| {
        fmt!(f, "SELECT reltuples AS approximate_row_count FROM pg_class WHERE relname = " Bind(class_name))
    });
    Compiled {
        sql,
        params: params.into_values(),
    }
}

/// Distinct values of `field` among the rows matching `query`, returned
/// in a `value` column. Array fields are unwound to their elements.
pub fn compile_distinct(schema: &Schema, field: &str, query: &Document) -> Result<Compiled> {
    validate_key(field)?;

    let mut params = Params::new();
    let predicate = Predicate::compile(schema, query, &mut params, false)?;

    let ty = schema.field_type(field);
    let column = Ident(field);
    let sql = select(&mut params, |f| {
        fmt!(f, "SELECT DISTINCT ");
        match ty {
            _ if field.contains('.') => fmt!(f, Column::Json(field)),
            Some(ty) if ty.is_string_array() => fmt!(f, "unnest(" column ")"),
            Some(FieldType::Array { .. }) => fmt!(f, "jsonb_array_elements(" column ")"),
            _ => fmt!(f, column),
        }
        fmt!(f, " AS \"value\" FROM " Ident(schema.class_name.as_str()) predicate.where_clause());
    });

    Ok(Compiled {
        sql,
        params: params.into_values(),
    })
}

/// Deletes the rows matching `query`, returning how many were deleted. An
/// empty query deletes every row.
pub fn compile_delete(schema: &Schema, query: &Document) -> Result<Compiled> {
    let mut params = Params::new();
    let predicate = Predicate::compile(schema, query, &mut params, false)?;

    let sql = select(&mut params, |f| {
        fmt!(f,
            "WITH deleted AS (DELETE FROM " Ident(schema.class_name.as_str()) predicate.where_clause()
            " RETURNING *) SELECT count(*) FROM deleted")
    });
    Ok(Compiled {
        sql,
        params: params.into_values(),
    })
}

fn select(params: &mut Params, build: impl FnOnce(&mut Formatter<'_>)) -> String {
    let mut f = Formatter::new(params);
    build(&mut f);
    f.finish()
}
