//! Shapes rows into documents.

use crate::value;

use docsql_core::{mapper, Document, Result, Schema, Value};
use serde_json::{json, Value as Json};
use tokio_postgres::Row;

/// Column names and decoded values of a row, in column order.
pub(crate) fn columns(row: &Row) -> Result<Vec<(String, Value)>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| Ok((column.name().to_string(), value::decode(row, index)?)))
        .collect()
}

pub(crate) fn to_document(row: &Row, schema: &Schema) -> Result<Document> {
    Ok(shape(columns(row)?, schema))
}

/// Decodes columns into a document using the class schema.
///
/// Null columns are dropped, `createdAt`/`updatedAt` become bare ISO
/// strings and every Relation field gets its descriptor.
pub(crate) fn shape(columns: impl IntoIterator<Item = (String, Value)>, schema: &Schema) -> Document {
    let mut document = Document::new();

    for (name, value) in columns {
        let json = match (name.as_str(), value) {
            (_, Value::Null) => continue,
            ("createdAt" | "updatedAt", Value::Timestamp(at)) => Json::String(mapper::to_iso(&at)),
            (_, value) => mapper::decode(schema.field_type(&name), value),
        };
        document.insert(name, json);
    }

    for (name, field) in schema.relations() {
        if let Some(target) = field.ty.target_class() {
            document.insert(
                name.to_string(),
                json!({"__type": "Relation", "className": target}),
            );
        }
    }

    document
}
