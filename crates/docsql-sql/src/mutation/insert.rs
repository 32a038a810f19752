use super::{fold_auth_data, handle_dot_fields, validate_nested_keys};
use crate::serializer::{Bind, Comma, Formatter, Ident, Params, ToSql};
use crate::Compiled;

use docsql_core::{
    mapper::{self, geo, type_tag},
    schema::{user_hidden_fields, FieldType},
    Document, Error, Point, Result, Schema,
};
use serde_json::Value as Json;

/// A compiled insert: column names, the SQL expression written for each
/// column and the values those expressions bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub columns: Vec<String>,
    pub placeholders: Vec<String>,
    pub params: Params,
}

/// Compiles `object` into an insert against the storage form of `schema`.
///
/// Dotted keys are nested first and `_auth_data_<provider>` keys folded
/// into `authData`. GeoPoint columns compile to `POINT(..)` calls and are
/// written after every other column.
pub fn compile_insert(schema: &Schema, object: &Document) -> Result<Insert> {
    let mut object = handle_dot_fields(object);
    validate_nested_keys(&Json::Object(object.clone()))?;
    fold_auth_data(&mut object);

    let mut params = Params::new();
    let mut columns = vec![];
    let mut placeholders = vec![];
    let mut points: Vec<(String, Point)> = vec![];

    for (name, value) in &object {
        if value.is_null() {
            continue;
        }

        let ty = field_type(schema, name)?;
        match ty {
            FieldType::Relation { .. } if type_tag(value) == Some("Relation") => continue,
            FieldType::GeoPoint => {
                points.push((name.clone(), geo::point(value)?));
                continue;
            }
            _ => {}
        }

        let cast = if ty.is_string_array() {
            "::text[]"
        } else if ty.is_array() {
            "::jsonb"
        } else {
            ""
        };
        let encoded = mapper::encode(&ty, value)?;

        columns.push(name.clone());
        placeholders.push(write(&mut params, |f| fmt!(f, Bind(encoded) cast)));
    }

    for (name, point) in points {
        columns.push(name);
        placeholders.push(write(&mut params, |f| {
            fmt!(f, "POINT(" Bind(point.x) ", " Bind(point.y) ")")
        }));
    }

    Ok(Insert {
        columns,
        placeholders,
        params,
    })
}

fn field_type(schema: &Schema, name: &str) -> Result<FieldType> {
    if let Some(ty) = schema.field_type(name) {
        return Ok(ty.clone());
    }
    if name == "authData" {
        return Ok(FieldType::Object);
    }
    if schema.is_user_class() {
        if let Some((_, ty)) = user_hidden_fields()
            .into_iter()
            .find(|(hidden, _)| *hidden == name)
        {
            return Ok(ty);
        }
    }
    Err(Error::operation_forbidden(format!(
        "field `{name}` does not exist in class `{}`",
        schema.class_name
    )))
}

fn write(params: &mut Params, build: impl FnOnce(&mut Formatter<'_>)) -> String {
    let mut f = Formatter::new(params);
    build(&mut f);
    f.finish()
}

impl Insert {
    /// `INSERT INTO "<class>" (..) VALUES (..)`, optionally ignoring a
    /// conflicting row instead of failing.
    pub fn into_statement(self, class_name: &str, on_conflict_do_nothing: bool) -> Compiled {
        let mut scratch = Params::new();
        let mut f = Formatter::new(&mut scratch);

        if self.columns.is_empty() {
            fmt!(&mut f, "INSERT INTO " Ident(class_name) " DEFAULT VALUES");
        } else {
            let columns = Comma(self.columns.iter().map(Ident));
            let values = Comma(self.placeholders);
            fmt!(&mut f, "INSERT INTO " Ident(class_name) " (" columns ") VALUES (" values ")");
        }
        if on_conflict_do_nothing {
            fmt!(&mut f, " ON CONFLICT DO NOTHING");
        }

        Compiled {
            sql: f.finish(),
            params: self.params.into_values(),
        }
    }
}
