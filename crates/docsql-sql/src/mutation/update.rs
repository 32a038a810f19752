use super::{auth_data_provider, handle_dot_fields, op};
use crate::predicate::Predicate;
use crate::serializer::{Bind, Comma, Formatter, Ident, Params, ToSql};
use crate::Compiled;

use docsql_core::{
    mapper::{self, geo, type_tag},
    schema::FieldType,
    Document, Error, Result, Schema, Value,
};
use serde_json::{Map, Value as Json};

/// Compiled `SET` assignments and the values they bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub sets: Vec<String>,
    pub params: Params,
}

/// Compiles an update document into `SET` assignments.
///
/// Dotted keys on Object fields merge into the stored object: listed keys
/// are deleted, nested increments are applied and the remaining literal
/// keys are merged over the result.
pub fn compile_update(schema: &Schema, update: &Document) -> Result<Update> {
    let mut params = Params::new();
    let mut sets = vec![];

    let dotted_roots: Vec<&str> = update
        .keys()
        .filter_map(|key| key.split_once('.').map(|(root, _)| root))
        .collect();

    let mut nested = handle_dot_fields(update);
    fold_auth_data_first(&mut nested);

    for (name, value) in &nested {
        let column = Ident(name.as_str());
        let ty = schema.field_type(name);

        if value.is_null() {
            sets.push(write(&mut params, |f| fmt!(f, column " = NULL")));
            continue;
        }

        if name == "authData" {
            if let Json::Object(providers) = value {
                sets.push(auth_data(providers, &mut params));
            }
            continue;
        }

        let is_text_array = ty.is_some_and(FieldType::is_string_array);

        match op(value) {
            Some("Increment") => {
                let amount = value.get("amount").and_then(Json::as_f64).unwrap_or(0.0);
                sets.push(write(&mut params, |f| {
                    fmt!(f, column " = COALESCE(" column ", 0) + " Bind(amount))
                }));
                continue;
            }
            Some(op @ ("Add" | "AddUnique" | "Remove")) => {
                let objects = value.get("objects").cloned().unwrap_or(Json::Array(vec![]));
                let assignment = if is_text_array {
                    text_array_op(name, op, &objects, &mut params)?
                } else {
                    let function = match op {
                        "Add" => "array_add",
                        "AddUnique" => "array_add_unique",
                        _ => "array_remove",
                    };
                    write(&mut params, |f| {
                        fmt!(f, column " = " function "(COALESCE(" column ", '[]'::jsonb), " Bind(Value::Json(objects)) "::jsonb)")
                    })
                };
                sets.push(assignment);
                continue;
            }
            Some("Delete") => {
                sets.push(write(&mut params, |f| fmt!(f, column " = NULL")));
                continue;
            }
            Some("AddRelation" | "RemoveRelation" | "Batch") => continue,
            Some(other) => {
                return Err(Error::operation_forbidden(format!(
                    "Postgres doesn't support update {other} yet"
                )))
            }
            None => {}
        }

        let assignment = match (value, type_tag(value)) {
            (Json::String(_) | Json::Bool(_) | Json::Number(_), _) => {
                let encoded = match ty {
                    Some(ty @ (FieldType::Date | FieldType::Number)) => mapper::encode(ty, value)?,
                    _ => mapper::encode_untyped(value),
                };
                write(&mut params, |f| fmt!(f, column " = " Bind(encoded)))
            }
            (_, Some("Pointer" | "File")) => {
                write(&mut params, |f| fmt!(f, column " = " Bind(mapper::encode_untyped(value))))
            }
            (_, Some("Date")) => {
                let at = mapper::parse_date(value)?;
                write(&mut params, |f| fmt!(f, column " = " Bind(at)))
            }
            (_, Some("GeoPoint")) => {
                let point = geo::point(value)?;
                write(&mut params, |f| {
                    fmt!(f, column " = POINT(" Bind(point.x) ", " Bind(point.y) ")")
                })
            }
            (_, Some("Polygon")) => {
                let coordinates = value.get("coordinates").unwrap_or(&Json::Null);
                let points = geo::polygon(coordinates)?;
                write(&mut params, |f| fmt!(f, column " = " Bind(Value::Polygon(points))))
            }
            (_, Some("Relation")) => continue,
            (_, Some("Bytes")) if ty == Some(&FieldType::Bytes) => {
                write(&mut params, |f| {
                    fmt!(f, column " = " Bind(Value::Json(value.clone())) "::jsonb")
                })
            }
            (Json::Object(fields), _) if ty == Some(&FieldType::Object) => {
                let merge = dotted_roots.contains(&name.as_str());
                merge_object(name, fields, update, merge, &mut params)
            }
            (Json::Array(items), _) if ty.is_some_and(FieldType::is_array) => {
                if is_text_array {
                    let encoded = mapper::encode(&FieldType::string_array(), value)?;
                    write(&mut params, |f| fmt!(f, column " = " Bind(encoded) "::text[]"))
                } else {
                    let items = Value::Json(Json::Array(items.clone()));
                    write(&mut params, |f| fmt!(f, column " = " Bind(items) "::jsonb"))
                }
            }
            _ => {
                return Err(Error::operation_forbidden(format!(
                    "Postgres doesn't support update {value} yet"
                )))
            }
        };
        sets.push(assignment);
    }

    Ok(Update { sets, params })
}

/// Moves `_auth_data_<provider>` keys into `authData`, placed first so the
/// column is assigned once.
fn fold_auth_data_first(update: &mut Document) {
    let mut providers = Map::new();
    let keys: Vec<String> = update
        .keys()
        .filter(|key| auth_data_provider(key).is_some())
        .cloned()
        .collect();

    for key in keys {
        if let (Some(provider), Some(value)) = (auth_data_provider(&key), update.get(&key)) {
            providers.insert(provider.to_string(), value.clone());
        }
        update.shift_remove(&key);
    }

    if providers.is_empty() {
        return;
    }

    if let Some(Json::Object(existing)) = update.shift_remove("authData") {
        for (provider, value) in existing {
            providers.entry(provider).or_insert(value);
        }
    }

    let mut reordered = Document::new();
    reordered.insert("authData".to_string(), Json::Object(providers));
    reordered.extend(std::mem::take(update));
    *update = reordered;
}

/// `json_object_set_key` applied once per provider; a deleted provider is
/// set to null.
fn auth_data(providers: &Map<String, Json>, params: &mut Params) -> String {
    let column = Ident("authData");
    let mut expr = write(params, |f| fmt!(f, column));

    for (provider, value) in providers {
        let value = if op(value) == Some("Delete") {
            Value::Null
        } else {
            Value::Json(value.clone())
        };
        let inner = expr;
        expr = write(params, |f| {
            fmt!(f, "json_object_set_key(COALESCE(" inner ", '{}'::jsonb), " Bind(provider.as_str()) "::text, " Bind(value) "::jsonb)::jsonb")
        });
    }

    write(params, |f| fmt!(f, column " = " expr))
}

/// Array operations on a `text[]` column. Every object must be a string.
fn text_array_op(name: &str, op: &str, objects: &Json, params: &mut Params) -> Result<String> {
    let column = Ident(name);
    let items = match objects {
        Json::Array(objects) => objects
            .iter()
            .map(|object| match object {
                Json::String(item) => Ok(item.clone()),
                other => Err(Error::invalid_json(format!(
                    "{op} on {name} expects strings, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(Error::invalid_json(format!(
                "{op} on {name} expects an array of objects, got {other}"
            )))
        }
    };
    let items = Value::StringArray(items);

    Ok(write(params, |f| match op {
        "Add" => fmt!(f, column " = array_cat(COALESCE(" column ", '{}'::text[]), " Bind(items) "::text[])"),
        "AddUnique" => fmt!(f,
            column " = array_cat(COALESCE(" column ", '{}'::text[]), ARRAY(SELECT DISTINCT e FROM unnest("
            Bind(items) "::text[]) AS e WHERE e <> ALL (COALESCE(" column ", '{}'::text[]))))"),
        _ => fmt!(f,
            column " = ARRAY(SELECT e FROM unnest(COALESCE(" column ", '{}'::text[])) AS e WHERE e <> ALL ("
            Bind(items) "::text[]))"),
    }))
}

/// Assignment for a nested write to an Object column. The stored value is
/// kept when the update used dot notation and replaced otherwise.
fn merge_object(
    name: &str,
    fields: &Map<String, Json>,
    original: &Document,
    merge: bool,
    params: &mut Params,
) -> String {
    let column = Ident(name);
    let mut literal = fields.clone();

    let mut deletes = vec![];
    let mut increments = vec![];
    for (key, value) in original {
        let Some((root, sub)) = key.split_once('.') else {
            continue;
        };
        if root != name || sub.contains('.') {
            continue;
        }
        match op(value) {
            Some("Delete") => deletes.push(sub.to_string()),
            Some("Increment") => {
                let amount = value.get("amount").and_then(Json::as_f64).unwrap_or(0.0);
                increments.push((sub.to_string(), amount));
                literal.shift_remove(sub);
            }
            _ => {}
        }
    }

    write(params, |f| {
        fmt!(f, column " = (");
        if merge {
            fmt!(f, "COALESCE(" column ", '{}'::jsonb)");
        } else {
            fmt!(f, "'{}'::jsonb");
        }
        for key in deletes {
            fmt!(f, " - " Bind(key) "::text");
        }
        for (key, amount) in increments {
            let key = f.push(key);
            fmt!(f,
                " || jsonb_build_object(" key "::text, COALESCE((" column "->>" key
                "::text)::double precision, 0) + " Bind(amount) ")");
        }
        fmt!(f, " || " Bind(Value::Json(Json::Object(literal))) "::jsonb)");
    })
}

fn write(params: &mut Params, build: impl FnOnce(&mut Formatter<'_>)) -> String {
    let mut f = Formatter::new(params);
    build(&mut f);
    f.finish()
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// `UPDATE "<class>" SET .. WHERE .. RETURNING *`, with the predicate's
    /// placeholders numbered after the assignments'.
    pub fn into_statement(mut self, schema: &Schema, query: &Document) -> Result<Compiled> {
        let predicate = Predicate::compile(schema, query, &mut self.params, false)?;

        let mut scratch = Params::new();
        let mut f = Formatter::new(&mut scratch);
        let sets = Comma(self.sets);
        fmt!(&mut f, "UPDATE " Ident(&schema.class_name) " SET " sets);
        fmt!(&mut f, predicate.where_clause() " RETURNING *");

        Ok(Compiled {
            sql: f.finish(),
            params: self.params.into_values(),
        })
    }
}
