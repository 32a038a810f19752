//! Compiles an aggregation pipeline into one `SELECT`.
//!
//! Stages are read in order but the clauses they produce are always
//! emitted as `SELECT .. FROM .. WHERE .. GROUP BY .. ORDER BY .. LIMIT ..
//! OFFSET ..`, whatever the stage order.

use crate::predicate::validate_key;
use crate::serializer::{Bind, Comma, Formatter, Ident, Params, ToSql};

use docsql_core::{mapper, Document, Error, Result, Schema, Value};
use serde_json::Value as Json;

/// A compiled pipeline and what is needed to shape its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub sql: String,
    pub params: Vec<Value>,

    /// Output column holding a `$sum` of a constant, returned as a count.
    pub count_field: Option<String>,

    /// Aliases of a composite `_id`, reassembled into `objectId`.
    pub group_keys: Vec<String>,
}

const DATE_PARTS: [(&str, &str); 12] = [
    ("$dayOfMonth", "DAY"),
    ("$dayOfWeek", "DOW"),
    ("$dayOfYear", "DOY"),
    ("$isoDayOfWeek", "ISODOW"),
    ("$isoWeekYear", "ISOYEAR"),
    ("$hour", "HOUR"),
    ("$minute", "MINUTE"),
    ("$second", "SECOND"),
    ("$millisecond", "MILLISECONDS"),
    ("$month", "MONTH"),
    ("$week", "WEEK"),
    ("$year", "YEAR"),
];

const COMPARATORS: [(&str, &str); 4] = [("$gt", " > "), ("$lt", " < "), ("$gte", " >= "), ("$lte", " <= ")];

const ACCUMULATORS: [(&str, &str); 4] = [("$sum", "SUM"), ("$max", "MAX"), ("$min", "MIN"), ("$avg", "AVG")];

/// Maps a `$field` reference to its column.
pub fn transform_aggregate_field(reference: &str) -> &str {
    match reference {
        "$_created_at" => "createdAt",
        "$_updated_at" => "updatedAt",
        _ => reference.strip_prefix('$').unwrap_or(reference),
    }
}

fn source(reference: &str) -> Result<&str> {
    let column = transform_aggregate_field(reference);
    validate_key(column)?;
    Ok(column)
}

#[derive(Default)]
struct Clauses {
    columns: Vec<String>,
    group_by: Vec<String>,
    filter: Option<String>,
    order_by: Vec<String>,
    limit: Option<String>,
    offset: Option<String>,
}

pub fn compile_aggregate(schema: &Schema, pipeline: &[Json]) -> Result<Aggregate> {
    let mut params = Params::new();
    let mut clauses = Clauses::default();
    let mut count_field = None;
    let mut group_keys = vec![];

    for stage in pipeline {
        if let Some(group) = stage.get("$group") {
            let Json::Object(group) = group else {
                return Err(Error::invalid_query("$group expects an object"));
            };
            compile_group(group, &mut params, &mut clauses, &mut count_field, &mut group_keys)?;
        }

        if let Some(Json::Object(project)) = stage.get("$project") {
            for (field, value) in project {
                if matches!(value, Json::Bool(true)) || value.as_i64() == Some(1) {
                    validate_key(field)?;
                    clauses.columns.push(render(&mut params, |f| fmt!(f, Ident(field.as_str()))));
                }
            }
        }

        if let Some(Json::Object(filter)) = stage.get("$match") {
            clauses.filter = compile_match(schema, filter, &mut params)?;
        }

        if let Some(limit) = stage.get("$limit") {
            let limit = row_count("$limit", limit)?;
            clauses.limit = Some(render(&mut params, |f| fmt!(f, " LIMIT " Bind(limit))));
        }

        if let Some(skip) = stage.get("$skip") {
            let skip = row_count("$skip", skip)?;
            clauses.offset = Some(render(&mut params, |f| fmt!(f, " OFFSET " Bind(skip))));
        }

        if let Some(Json::Object(sort)) = stage.get("$sort") {
            clauses.order_by.clear();
            for (field, direction) in sort {
                let field = if field == "_id" { "objectId" } else { field.as_str() };
                validate_key(field)?;
                let direction = if direction.as_i64() == Some(1) { " ASC" } else { " DESC" };
                clauses
                    .order_by
                    .push(render(&mut params, |f| fmt!(f, Ident(field) direction)));
            }
        }
    }

    let mut scratch = Params::new();
    let mut f = Formatter::new(&mut scratch);

    let mut columns = clauses.columns;
    if columns.is_empty() {
        columns.push("*".to_string());
    }

    let table = Ident(schema.class_name.as_str());
    fmt!(&mut f, "SELECT " Comma(columns) " FROM " table);
    if let Some(filter) = clauses.filter {
        fmt!(&mut f, " WHERE " filter);
    }
    if !clauses.group_by.is_empty() {
        fmt!(&mut f, " GROUP BY " Comma(clauses.group_by));
    }
    if !clauses.order_by.is_empty() {
        fmt!(&mut f, " ORDER BY " Comma(clauses.order_by));
    }
    fmt!(&mut f, clauses.limit clauses.offset);

    Ok(Aggregate {
        sql: f.finish(),
        params: params.into_values(),
        count_field,
        group_keys,
    })
}

fn compile_group(
    group: &Document,
    params: &mut Params,
    clauses: &mut Clauses,
    count_field: &mut Option<String>,
    group_keys: &mut Vec<String>,
) -> Result<()> {
    for (field, value) in group {
        match (field.as_str(), value) {
            (_, Json::Null) => {}
            ("_id", Json::String(reference)) if !reference.is_empty() => {
                let column = Ident(source(reference)?);
                clauses
                    .columns
                    .push(render(params, |f| fmt!(f, column " AS \"objectId\"")));
                clauses.group_by = vec![render(params, |f| fmt!(f, column))];
            }
            ("_id", Json::Object(keys)) if !keys.is_empty() => {
                let mut group_by: Vec<String> = vec![];
                for (alias, key) in keys {
                    validate_key(alias)?;
                    let expr = match key {
                        Json::String(reference) if !reference.is_empty() => {
                            let column = Ident(source(reference)?);
                            render(params, |f| fmt!(f, column))
                        }
                        Json::Object(op) => {
                            let Some((operator, reference)) = op.iter().next() else {
                                continue;
                            };
                            let Some((_, part)) =
                                DATE_PARTS.iter().find(|(name, _)| *name == operator.as_str())
                            else {
                                continue;
                            };
                            let Some(reference) = reference.as_str() else {
                                continue;
                            };
                            let column = Ident(source(reference)?);
                            let part = *part;
                            render(params, |f| {
                                fmt!(f, "EXTRACT(" part " FROM " column " AT TIME ZONE 'UTC')::integer")
                            })
                        }
                        _ => continue,
                    };

                    let alias_ident = Ident(alias.as_str());
                    let column = render(params, |f| fmt!(f, expr.as_str() " AS " alias_ident));
                    clauses.columns.push(column);
                    if !group_by.contains(&expr) {
                        group_by.push(expr);
                    }
                    group_keys.push(alias.clone());
                }
                clauses.group_by = group_by;
            }
            (_, Json::Object(accumulator)) => {
                validate_key(field)?;
                let alias = Ident(field.as_str());
                for (op, function) in ACCUMULATORS {
                    let Some(operand) = accumulator.get(op) else {
                        continue;
                    };
                    match operand {
                        Json::String(reference) => {
                            let column = Ident(source(reference)?);
                            clauses.columns.push(render(params, |f| {
                                fmt!(f, function "(" column ") AS " alias)
                            }));
                        }
                        _ if op == "$sum" => {
                            *count_field = Some(field.clone());
                            clauses
                                .columns
                                .push(render(params, |f| fmt!(f, "COUNT(*) AS " alias)));
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// The `$match` filter. Top-level `$or` members are collapsed into one set
/// of constraints joined with `OR`.
fn row_count(stage: &str, value: &Json) -> Result<i64> {
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n),
        _ => Err(Error::invalid_query(format!(
            "{stage} must be a non-negative integer, got {value}"
        ))),
    }
}

fn compile_match(schema: &Schema, filter: &Document, params: &mut Params) -> Result<Option<String>> {
    let (constraints, joiner) = match filter.get("$or") {
        Some(Json::Array(members)) => {
            // A key repeated across members keeps its last constraint.
            let mut collapsed = Document::new();
            for member in members {
                if let Json::Object(member) = member {
                    for (key, value) in member {
                        collapsed.insert(key.clone(), value.clone());
                    }
                }
            }
            (collapsed, " OR ")
        }
        _ => (filter.clone(), " AND "),
    };

    let mut patterns = vec![];
    for (field, value) in &constraints {
        let field = if field == "_id" { "objectId" } else { field.as_str() };
        validate_key(field)?;
        let column = Ident(field);

        let mut comparisons = vec![];
        for (op, cmp) in COMPARATORS {
            if let Some(operand) = value.get(op) {
                let operand = mapper::encode_untyped(operand);
                comparisons.push(render(params, |f| fmt!(f, column cmp Bind(operand))));
            }
        }

        if !comparisons.is_empty() {
            patterns.push(format!("({})", comparisons.join(" AND ")));
        } else if let Some(ty) = schema.field_type(field) {
            let value = match ty.column_type() {
                Some(_) => mapper::encode(ty, value)?,
                None => mapper::encode_untyped(value),
            };
            patterns.push(render(params, |f| fmt!(f, column " = " Bind(value))));
        }
    }

    Ok((!patterns.is_empty()).then(|| patterns.join(joiner)))
}

fn render(params: &mut Params, build: impl FnOnce(&mut Formatter<'_>)) -> String {
    let mut f = Formatter::new(params);
    build(&mut f);
    f.finish()
}

impl Aggregate {
    /// Shapes a result row: a missing `objectId` becomes null, composite
    /// group keys are gathered into `objectId` and counts become integers.
    pub fn shape_row(&self, mut row: Document) -> Document {
        if !self.group_keys.is_empty() {
            let mut id = Document::new();
            for key in &self.group_keys {
                let value = row.shift_remove(key).unwrap_or(Json::Null);
                id.insert(key.clone(), value);
            }
            row.insert("objectId".to_string(), Json::Object(id));
        } else if !row.contains_key("objectId") {
            row.insert("objectId".to_string(), Json::Null);
        }

        if let Some(field) = &self.count_field {
            if let Some(count) = row.get_mut(field) {
                if let Some(n) = count.as_f64() {
                    *count = Json::from(n as i64);
                } else if let Some(n) = count.as_str().and_then(|s| s.parse::<i64>().ok()) {
                    *count = Json::from(n);
                }
            }
        }

        row
    }
}
