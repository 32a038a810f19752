#![allow(dead_code)]

use docsql_core::{
    schema::{FieldType, Schema},
    Document,
};
use serde_json::Value as Json;

pub fn doc(value: Json) -> Document {
    match value {
        Json::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Storage schema used across the compiler suites.
pub fn post_schema() -> Schema {
    Schema::new("Post")
        .field("objectId", FieldType::String)
        .field("createdAt", FieldType::Date)
        .field("updatedAt", FieldType::Date)
        .field("title", FieldType::String)
        .field("score", FieldType::Number)
        .field("published", FieldType::Boolean)
        .field("tags", FieldType::string_array())
        .field("items", FieldType::array())
        .field("meta", FieldType::Object)
        .field("location", FieldType::GeoPoint)
        .field("area", FieldType::Polygon)
        .field("author", FieldType::pointer("_User"))
        .field("likes", FieldType::relation("_User"))
        .field("username", FieldType::String)
        .field("email", FieldType::String)
        .to_storage()
}

/// Placeholder indexes in SQL text, in order of appearance.
pub fn placeholders(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut out = vec![];
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > start {
            out.push(sql[start..end].parse().unwrap());
        }
        i = end.max(i + 1);
    }
    out
}
