mod geo;

mod path;
pub(crate) use path::Column;
pub use path::validate_key;
pub(crate) use path::validate_query;

pub mod regex;

pub mod relative_time;
pub use relative_time::relative_time_to_date;

use crate::serializer::{Bind, Comma, Formatter, Params, ToSql};

use chrono::Utc;
use docsql_core::{
    mapper::{self, type_tag},
    schema::FieldType,
    Document, Error, Result, Schema, Value,
};
use serde_json::{json, Value as Json};

/// Compares a boolean against a Number column. No stored double equals it,
/// so the comparison never matches instead of failing the cast.
const UNMATCHABLE_NUMBER: f64 = 9_223_372_036_854_775_808.0;

/// A compiled constraint tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// The boolean expression; empty when the query has no constraints.
    pub sql: String,

    /// Orderings required by the query itself (`$nearSphere`), each a full
    /// `ORDER BY` item.
    pub sorts: Vec<String>,

    /// The full-text search the query used, if any.
    pub text_search: Option<TextSearch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSearch {
    pub field: String,
    pub language: String,
    pub term: String,
}

struct Compiler<'a> {
    schema: &'a Schema,
    case_insensitive: bool,
    sorts: Vec<String>,
    text_search: Option<TextSearch>,
}

/// Compiles `query` to a predicate whose placeholders start at
/// `start_index`, returning the SQL, the bound values and any orderings
/// the query requires.
pub fn compile_where(
    schema: &Schema,
    query: &Document,
    start_index: usize,
    case_insensitive: bool,
) -> Result<(String, Vec<Value>, Vec<String>)> {
    let mut params = Params::starting_at(start_index);
    let predicate = Predicate::compile(schema, query, &mut params, case_insensitive)?;
    Ok((predicate.sql, params.into_values(), predicate.sorts))
}

impl Predicate {
    /// Compiles `query` against the storage form of `schema`, pushing every
    /// bound value to `params`.
    pub fn compile(
        schema: &Schema,
        query: &Document,
        params: &mut Params,
        case_insensitive: bool,
    ) -> Result<Predicate> {
        validate_query(query)?;

        let mut compiler = Compiler {
            schema,
            case_insensitive,
            sorts: vec![],
            text_search: None,
        };
        let sql = compiler.compile(query, params)?;

        Ok(Predicate {
            sql,
            sorts: compiler.sorts,
            text_search: compiler.text_search,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// ` WHERE <sql>`, or nothing for an unconstrained query.
    pub fn where_clause(&self) -> String {
        if self.sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.sql)
        }
    }
}

/// Writes one clause, pushing whatever it binds.
fn clause(params: &mut Params, build: impl FnOnce(&mut Formatter<'_>)) -> String {
    let mut f = Formatter::new(params);
    build(&mut f);
    f.finish()
}

fn bind(value: &Json) -> Value {
    mapper::encode_untyped(value)
}

/// The cast a dotted path needs to compare against `value`.
fn cast_for(value: &Json) -> Option<&'static str> {
    match value {
        Json::Number(_) => Some("double precision"),
        Json::Bool(_) => Some("boolean"),
        _ => None,
    }
}

/// `$in` lists may nest one level of arrays.
fn flatten(list: &[Json]) -> Vec<&Json> {
    list.iter()
        .flat_map(|item| match item {
            Json::Array(inner) => inner.iter().collect(),
            other => vec![other],
        })
        .collect()
}

fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

fn is_relative_time(value: &Json) -> bool {
    value.get("$relativeTime").is_some()
}

fn is_auth_data_key(field: &str) -> bool {
    field
        .strip_prefix("_auth_data_")
        .is_some_and(|provider| !provider.is_empty())
}

impl Compiler<'_> {
    fn compile(&mut self, query: &Document, params: &mut Params) -> Result<String> {
        let mut patterns = vec![];

        for (field, value) in query {
            if is_auth_data_key(field) {
                continue;
            }
            if self.schema.field_type(field).is_none()
                && value.get("$exists") == Some(&Json::Bool(false))
            {
                continue;
            }

            let before = patterns.len();
            self.compile_field(field, value, params, &mut patterns)?;

            if patterns.len() == before {
                return Err(Error::operation_forbidden(format!(
                    "this query type is not supported yet: {field}: {value}"
                )));
            }
        }

        Ok(patterns.join(" AND "))
    }

    fn compile_field(
        &mut self,
        field: &str,
        value: &Json,
        params: &mut Params,
        patterns: &mut Vec<String>,
    ) -> Result<()> {
        if let "$or" | "$and" | "$nor" = field {
            patterns.push(self.logical(field, value, params)?);
            return Ok(());
        }

        let ty = self.schema.field_type(field);
        let is_array = ty.is_some_and(FieldType::is_array);
        let is_string_array = ty.is_some_and(FieldType::is_string_array);
        let dotted = field.contains('.');
        let column = Column::Text(field);

        if self.case_insensitive && matches!(field, "username" | "email") && value.is_string() {
            patterns.push(clause(params, |f| {
                fmt!(f, "LOWER(" column ") = LOWER(" Bind(bind(value)) ")")
            }));
            return Ok(());
        }

        let ops = match value {
            Json::Null => {
                patterns.push(clause(params, |f| fmt!(f, column " IS NULL")));
                return Ok(());
            }
            Json::String(_) | Json::Number(_) if dotted => {
                patterns.push(clause(params, |f| {
                    fmt!(f, column " = " Bind(bind(value)) "::text")
                }));
                return Ok(());
            }
            Json::Bool(_) if dotted => {
                let cast = Column::Cast(field, "boolean");
                patterns.push(clause(params, |f| fmt!(f, cast " = " Bind(bind(value)))));
                return Ok(());
            }
            Json::Bool(_) if ty == Some(&FieldType::Number) => {
                patterns.push(clause(params, |f| {
                    fmt!(f, column " = " Bind(UNMATCHABLE_NUMBER))
                }));
                return Ok(());
            }
            Json::String(_) | Json::Number(_) | Json::Bool(_) => {
                patterns.push(clause(params, |f| fmt!(f, column " = " Bind(bind(value)))));
                return Ok(());
            }
            Json::Array(_) => return Ok(()),
            Json::Object(ops) => ops,
        };

        if type_tag(value).is_some() {
            return self.typed_literal(field, value, is_array, is_string_array, params, patterns);
        }

        if dotted {
            let json = Column::Json(field);
            if let Some(list @ Json::Array(_)) = ops.get("$in") {
                patterns.push(clause(params, |f| {
                    fmt!(f, "(" json ")::jsonb @> " Bind(Value::Json(list.clone())) "::jsonb")
                }));
            }
            // A missing path is null and matches `$nin`.
            if let Some(list @ Json::Array(_)) = ops.get("$nin") {
                let list = Value::Json(list.clone());
                patterns.push(clause(params, |f| {
                    fmt!(f, "(" json " IS NULL OR NOT ((" json ")::jsonb @> " Bind(list) "::jsonb))")
                }));
            }
        }

        if let Some(ne) = ops.get("$ne") {
            if is_array {
                let array = Column::Array(field, is_string_array);
                let members = Value::Json(json!([ne]));
                patterns.push(clause(params, |f| {
                    fmt!(f, "NOT array_contains(" array ", " Bind(members) ")")
                }));
            } else if ne.is_null() {
                patterns.push(clause(params, |f| fmt!(f, column " IS NOT NULL")));
                return Ok(());
            } else if type_tag(ne) == Some("GeoPoint") {
                let point = mapper::geo::point(ne)?;
                patterns.push(clause(params, |f| {
                    fmt!(f, "(NOT (" column " ~= POINT(" Bind(point.x) ", " Bind(point.y) ")) OR " column " IS NULL)")
                }));
            } else if is_relative_time(ne) {
                return Err(relative_time_misuse());
            } else {
                let lhs = match cast_for(ne) {
                    Some(cast) if dotted => Column::Cast(field, cast),
                    _ => column,
                };
                patterns.push(clause(params, |f| {
                    fmt!(f, "(" lhs " <> " Bind(bind(ne)) " OR " lhs " IS NULL)")
                }));
            }
        }

        if let Some(eq) = ops.get("$eq") {
            if eq.is_null() {
                patterns.push(clause(params, |f| fmt!(f, column " IS NULL")));
            } else if is_relative_time(eq) {
                return Err(relative_time_misuse());
            } else {
                let lhs = match cast_for(eq) {
                    Some(cast) if dotted => Column::Cast(field, cast),
                    _ => column,
                };
                patterns.push(clause(params, |f| fmt!(f, lhs " = " Bind(bind(eq)))));
            }
        }

        for (op, negated) in [("$in", false), ("$nin", true)] {
            let Some(list) = ops.get(op) else {
                continue;
            };
            let Json::Array(list) = list else {
                return Err(Error::invalid_json(format!("bad {op} value")));
            };
            if !dotted {
                patterns.push(self.membership(Column::Plain(field), ty, list, negated, params));
            }
        }

        if let Some(Json::Array(all)) = ops.get("$all") {
            if is_array {
                let array = Column::Array(field, is_string_array);
                if all
                    .iter()
                    .any(|member| regex::is_starts_with_regex(member.get("$regex")))
                {
                    if !regex::is_all_regex_or_none(all) {
                        return Err(Error::invalid_json(format!(
                            "All $all values must be of regex type or none: {}",
                            Json::Array(all.clone())
                        )));
                    }
                    let likes: Vec<Json> = all
                        .iter()
                        .filter_map(|member| member.get("$regex").and_then(Json::as_str))
                        .map(|pattern| {
                            let pattern = regex::process_regex_pattern(pattern);
                            Json::String(format!("{}%", &pattern[1..]))
                        })
                        .collect();
                    patterns.push(clause(params, |f| {
                        fmt!(f, "array_contains_all_regex(" array ", " Bind(Value::Json(Json::Array(likes))) "::jsonb)")
                    }));
                } else {
                    let members = Value::Json(Json::Array(all.clone()));
                    patterns.push(clause(params, |f| {
                        fmt!(f, "array_contains_all(" array ", " Bind(members) "::jsonb)")
                    }));
                }
            } else if let [member] = &all[..] {
                let id = member.get("objectId").unwrap_or(member);
                patterns.push(clause(params, |f| fmt!(f, column " = " Bind(bind(id)))));
            }
        }

        if let Some(exists) = ops.get("$exists") {
            if is_relative_time(exists) {
                return Err(Error::invalid_json(
                    "$relativeTime can only be used with the $lt, $lte, $gt, and $gte operators",
                ));
            }
            let test = if truthy(exists) { " IS NOT NULL" } else { " IS NULL" };
            patterns.push(clause(params, |f| fmt!(f, column test)));
        }

        if let Some(contained) = ops.get("$containedBy") {
            if !contained.is_array() {
                return Err(Error::invalid_json("bad $containedBy: should be an array"));
            }
            let array = Column::Array(field, is_string_array);
            let members = Value::Json(contained.clone());
            patterns.push(clause(params, |f| {
                fmt!(f, array " <@ " Bind(members) "::jsonb")
            }));
        }

        if let Some(text) = ops.get("$text") {
            patterns.push(self.text(field, text, params)?);
        }

        if let Some(point) = ops.get("$nearSphere") {
            let point = mapper::geo::point(point)?;
            let distance = geo::distance(field, point, params);
            let bound = match ops.get("$maxDistance") {
                Some(max) => {
                    let Some(max) = max.as_f64() else {
                        return Err(Error::invalid_json("bad $maxDistance"));
                    };
                    let meters = mapper::geo::radians_to_meters(max);
                    clause(params, |f| fmt!(f, distance.as_str() " <= " Bind(meters)))
                }
                None => format!("{distance} IS NOT NULL"),
            };
            patterns.push(bound);
            self.sorts.push(format!("{distance} ASC"));
        }

        if let Some(box_) = ops.get("$within").and_then(|within| within.get("$box")) {
            patterns.push(geo::within_box(field, box_, params)?);
        }

        if let Some(within) = ops.get("$geoWithin") {
            if let Some(sphere) = within.get("$centerSphere") {
                patterns.push(geo::center_sphere(field, sphere, params)?);
            }
            if let Some(polygon) = within.get("$polygon") {
                patterns.push(geo::within_polygon(field, polygon, params)?);
            }
        }

        if let Some(point) = ops.get("$geoIntersects").and_then(|gi| gi.get("$point")) {
            patterns.push(geo::intersects_point(field, point, params)?);
        }

        match ops.get("$regex") {
            Some(Json::String(pattern)) if !pattern.is_empty() => {
                let options = ops.get("$options").and_then(Json::as_str).unwrap_or("");
                let operator = if options.contains('i') { " ~* " } else { " ~ " };
                let pattern = if options.contains('x') {
                    regex::remove_white_space(pattern)
                } else {
                    pattern.clone()
                };
                let pattern = regex::process_regex_pattern(&pattern);
                patterns.push(clause(params, |f| fmt!(f, column operator Bind(pattern))));
            }
            Some(Json::String(_)) | None => {}
            Some(other) => {
                return Err(Error::invalid_query(format!("bad $regex value: {other}")));
            }
        }

        for (op, cmp) in [("$gt", " > "), ("$lt", " < "), ("$gte", " >= "), ("$lte", " <= ")] {
            let Some(operand) = ops.get(op) else {
                continue;
            };
            if !truthy(operand) && operand.as_f64() != Some(0.0) {
                continue;
            }

            let (lhs, value) = if is_relative_time(operand) {
                if dotted || ty != Some(&FieldType::Date) {
                    return Err(Error::invalid_json(
                        "$relativeTime can only be used with Date field",
                    ));
                }
                (column, Value::Timestamp(resolve_relative_time(operand)?))
            } else if dotted {
                let lhs = match cast_for(operand) {
                    Some(cast) => Column::Cast(field, cast),
                    None => column,
                };
                (lhs, bind(operand))
            } else {
                (column, bind(operand))
            };
            patterns.push(clause(params, |f| fmt!(f, lhs cmp Bind(value))));
        }

        Ok(())
    }

    fn logical(&mut self, op: &str, value: &Json, params: &mut Params) -> Result<String> {
        let Json::Array(subqueries) = value else {
            return Err(Error::invalid_query(format!("{op} expects an array of queries")));
        };

        let mut clauses = vec![];
        for subquery in subqueries {
            let Json::Object(subquery) = subquery else {
                return Err(Error::invalid_query(format!("{op} expects an array of queries")));
            };
            let pattern = self.compile(subquery, params)?;
            clauses.push(if pattern.is_empty() {
                "TRUE".to_string()
            } else {
                pattern
            });
        }

        if clauses.is_empty() {
            return Ok(if op == "$or" { "FALSE" } else { "TRUE" }.to_string());
        }

        let joined = clauses.join(if op == "$and" { " AND " } else { " OR " });
        Ok(if op == "$nor" {
            format!("NOT ({joined})")
        } else {
            format!("({joined})")
        })
    }

    /// `$in` (or `$nin` when `negated`) against a plain, text-array or
    /// JSON-array column.
    fn membership(
        &self,
        column: Column<'_>,
        ty: Option<&FieldType>,
        list: &[Json],
        negated: bool,
        params: &mut Params,
    ) -> String {
        let items = flatten(list);

        if items.is_empty() {
            return if negated { "1 = 1" } else { "1 = 2" }.to_string();
        }

        let allow_null = items.iter().any(|item| item.is_null());
        let members: Vec<Value> = items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| bind(item))
            .collect();

        if ty.is_some_and(FieldType::is_array) && !ty.is_some_and(FieldType::is_string_array) {
            let all = Value::Json(Json::Array(items.into_iter().cloned().collect()));
            return if negated {
                clause(params, |f| {
                    fmt!(f, "(" column " IS NULL OR NOT array_contains(" column ", " Bind(all) "))")
                })
            } else {
                clause(params, |f| fmt!(f, "array_contains(" column ", " Bind(all) ")"))
            };
        }

        if members.is_empty() {
            let test = if negated { " IS NOT NULL" } else { " IS NULL" };
            return clause(params, |f| fmt!(f, column test));
        }

        let (null_test, joiner) = match (negated, allow_null) {
            (false, true) => (Some(" IS NULL"), " OR "),
            (true, true) => (Some(" IS NOT NULL"), " AND "),
            (true, false) => (Some(" IS NULL"), " OR "),
            (false, false) => (None, ""),
        };

        let string_array = ty.is_some_and(FieldType::is_string_array);
        clause(params, |f| {
            if let Some(test) = null_test {
                fmt!(f, "(" column test joiner);
            }
            let members = Comma(members.into_iter().map(Bind));
            match (string_array, negated) {
                (true, false) => fmt!(f, column " && ARRAY[" members "]::text[]"),
                (true, true) => fmt!(f, "NOT (" column " && ARRAY[" members "]::text[])"),
                (false, false) => fmt!(f, column " IN (" members ")"),
                (false, true) => fmt!(f, column " NOT IN (" members ")"),
            }
            if null_test.is_some() {
                fmt!(f, ")");
            }
        })
    }

    fn text(&mut self, field: &str, text: &Json, params: &mut Params) -> Result<String> {
        let Some(search @ Json::Object(_)) = text.get("$search") else {
            return Err(Error::invalid_json("bad $text: $search, should be object"));
        };

        let term = match search.get("$term") {
            Some(Json::String(term)) if !term.is_empty() => term.clone(),
            _ => return Err(Error::invalid_json("bad $text: $term, should be string")),
        };

        let language = match search.get("$language") {
            None => "english".to_string(),
            Some(Json::String(language)) => language.clone(),
            Some(_) => return Err(Error::invalid_json("bad $text: $language, should be string")),
        };

        match search.get("$caseSensitive") {
            Some(Json::Bool(true)) => {
                return Err(Error::invalid_json(
                    "bad $text: $caseSensitive not supported, please use $regex or create a separate lower case column.",
                ))
            }
            Some(value) if !value.is_boolean() && truthy(value) => {
                return Err(Error::invalid_json(
                    "bad $text: $caseSensitive, should be boolean",
                ))
            }
            _ => {}
        }

        match search.get("$diacriticSensitive") {
            Some(Json::Bool(false)) => {
                return Err(Error::invalid_json(
                    "bad $text: $diacriticSensitive - false not supported, install Postgres Unaccent Extension",
                ))
            }
            Some(value) if !value.is_boolean() && truthy(value) => {
                return Err(Error::invalid_json(
                    "bad $text: $diacriticSensitive, should be boolean",
                ))
            }
            _ => {}
        }

        let column = Column::Text(field);
        let sql = clause(params, |f| {
            fmt!(f,
                "to_tsvector(" Bind(language.clone()) "::text::regconfig, " column ") @@ to_tsquery("
                Bind(language.clone()) "::text::regconfig, " Bind(term.clone()) ")")
        });

        self.text_search = Some(TextSearch {
            field: field.to_string(),
            language,
            term,
        });
        Ok(sql)
    }

    fn typed_literal(
        &mut self,
        field: &str,
        value: &Json,
        is_array: bool,
        is_string_array: bool,
        params: &mut Params,
        patterns: &mut Vec<String>,
    ) -> Result<()> {
        let column = Column::Text(field);

        match type_tag(value) {
            Some("Pointer") if is_array => {
                let array = Column::Array(field, is_string_array);
                let members = Value::Json(json!([value]));
                patterns.push(clause(params, |f| {
                    fmt!(f, "array_contains(" array ", " Bind(members) ")")
                }));
            }
            Some("Pointer") => {
                patterns.push(clause(params, |f| fmt!(f, column " = " Bind(bind(value)))));
            }
            Some("Date") => {
                let at = mapper::parse_date(value)?;
                patterns.push(clause(params, |f| fmt!(f, column " = " Bind(at))));
            }
            Some("GeoPoint") => {
                let point = mapper::geo::point(value)?;
                patterns.push(clause(params, |f| {
                    fmt!(f, column " ~= POINT(" Bind(point.x) ", " Bind(point.y) ")")
                }));
            }
            Some("Polygon") => {
                let coordinates = value.get("coordinates").unwrap_or(&Json::Null);
                let points = mapper::geo::polygon(coordinates)?;
                let polygon = geo::polygon_literal(&points);
                patterns.push(clause(params, |f| {
                    fmt!(f, column " ~= " Bind(polygon) "::text::polygon")
                }));
            }
            _ => {}
        }

        Ok(())
    }
}

fn relative_time_misuse() -> Error {
    Error::invalid_json(
        "$relativeTime can only be used with the $lt, $lte, $gt, and $gte operators",
    )
}

fn resolve_relative_time(operand: &Json) -> Result<chrono::DateTime<Utc>> {
    let Some(text) = operand.get("$relativeTime").and_then(Json::as_str) else {
        return Err(Error::invalid_json("bad $relativeTime value, should be string"));
    };
    relative_time_to_date(text, Utc::now())
        .map_err(|info| Error::invalid_json(format!("bad $relativeTime ({text}) value. {info}")))
}
