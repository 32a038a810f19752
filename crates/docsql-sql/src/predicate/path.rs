use crate::serializer::{Formatter, Ident, Literal, ToSql};

use docsql_core::{Document, Error, Result};
use serde_json::Value as Json;

/// A reference to a field in a compiled predicate.
///
/// A plain field name renders as a quoted column. A dotted name is a path
/// into a semi-structured column: `a.b.c` renders as `"a"->'b'->>'c'` when
/// compared as text or `"a"->'b'->'c'` when compared as JSON. Numeric
/// components are array indexes and stay unquoted.
#[derive(Clone, Copy)]
pub(crate) enum Column<'a> {
    Plain(&'a str),
    Text(&'a str),
    Json(&'a str),
    Cast(&'a str, &'static str),

    /// An array column as `jsonb`; native text arrays are converted.
    Array(&'a str, bool),
}

impl ToSql for Column<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        match self {
            Column::Plain(field) => fmt!(f, Ident(field)),
            Column::Text(field) => path(f, field, "->>"),
            Column::Json(field) => path(f, field, "->"),
            Column::Cast(field, ty) => {
                fmt!(f, "CAST ((");
                path(f, field, "->>");
                fmt!(f, ") AS " ty ")");
            }
            Column::Array(field, true) => fmt!(f, "to_jsonb(" Ident(field) ")"),
            Column::Array(field, false) => fmt!(f, Ident(field)),
        }
    }
}

fn path(f: &mut Formatter<'_>, field: &str, last: &'static str) {
    let mut components = field.split('.');
    let root = components.next().unwrap_or(field);
    fmt!(f, Ident(root));

    let rest: Vec<&str> = components.collect();
    for (i, component) in rest.iter().enumerate() {
        let arrow = if i + 1 == rest.len() { last } else { "->" };
        fmt!(f, arrow);
        if is_array_index(component) {
            fmt!(f, *component);
        } else {
            fmt!(f, Literal(component));
        }
    }
}

fn is_array_index(component: &str) -> bool {
    !component.is_empty() && component.chars().all(|c| c.is_ascii_digit())
}

/// Rejects field names that could escape their quoting or that name no
/// column: empty names or components, quotes, backslashes, control
/// characters and `$`.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.split('.').all(|component| !component.is_empty())
        && !key
            .chars()
            .any(|c| matches!(c, '"' | '\'' | '\\' | '$') || c.is_control());

    if valid {
        Ok(())
    } else {
        Err(Error::invalid_query(format!("Invalid key name: {key}")))
    }
}

/// Validates every field name of a constraint tree before compiling it.
pub(crate) fn validate_query(query: &Document) -> Result<()> {
    for (key, value) in query {
        match key.as_str() {
            "$or" | "$and" | "$nor" => {
                let Json::Array(subqueries) = value else {
                    return Err(Error::invalid_query(format!(
                        "{key} expects an array of queries"
                    )));
                };
                for subquery in subqueries {
                    let Json::Object(subquery) = subquery else {
                        return Err(Error::invalid_query(format!(
                            "{key} expects an array of queries"
                        )));
                    };
                    validate_query(subquery)?;
                }
            }
            _ => validate_key(key)?,
        }
    }
    Ok(())
}
