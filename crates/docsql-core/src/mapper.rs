//! Conversion between document-model values and column encodings.

pub mod geo;

use crate::{schema::FieldType, Error, Result, Value};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value as Json};

/// Returns the `__type` tag of a typed document value.
pub fn type_tag(value: &Json) -> Option<&str> {
    value.get("__type")?.as_str()
}

/// Encodes a document value for a column of the given field type.
pub fn encode(ty: &FieldType, value: &Json) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    Ok(match ty {
        FieldType::Date => Value::Timestamp(parse_date(value)?),
        FieldType::Pointer { .. } => match value.get("objectId") {
            Some(Json::String(id)) => Value::String(id.clone()),
            _ => encode_untyped(value),
        },
        FieldType::File => match value.get("name") {
            Some(Json::String(name)) => Value::String(name.clone()),
            _ => encode_untyped(value),
        },
        FieldType::Array { .. } if ty.is_string_array() => match value {
            Json::Array(items) => Value::StringArray(
                items
                    .iter()
                    .map(|item| match item {
                        Json::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            _ => return Err(Error::invalid_json(format!("expected an array, got {value}"))),
        },
        FieldType::Array { .. } | FieldType::Object | FieldType::Bytes => {
            Value::Json(value.clone())
        }
        FieldType::Number => match value.as_f64() {
            Some(n) => Value::Number(n),
            None => encode_untyped(value),
        },
        FieldType::String | FieldType::Boolean => encode_untyped(value),
        FieldType::GeoPoint => Value::Point(geo::point(value)?),
        FieldType::Polygon => {
            let coordinates = value.get("coordinates").unwrap_or(value);
            Value::Polygon(geo::polygon(coordinates)?)
        }
        FieldType::Relation { .. } => {
            return Err(Error::operation_forbidden(
                "Relation fields are stored in join tables",
            ))
        }
    })
}

/// Encodes a value whose field type is unknown, unwrapping typed values to
/// their comparable scalar (a Date to its ISO string, a Pointer to its id).
pub fn encode_untyped(value: &Json) -> Value {
    match type_tag(value) {
        Some("Date") => {
            if let Some(Json::String(iso)) = value.get("iso") {
                return Value::String(iso.clone());
            }
        }
        Some("File") => {
            if let Some(Json::String(name)) = value.get("name") {
                return Value::String(name.clone());
            }
        }
        Some("Pointer") => {
            if let Some(Json::String(id)) = value.get("objectId") {
                return Value::String(id.clone());
            }
        }
        _ => {}
    }

    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Number(n.as_f64().unwrap_or_default()),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(_) | Json::Object(_) => Value::Json(value.clone()),
    }
}

/// Decodes a column value back into the document model.
///
/// Without a field type the value is decoded by its column encoding alone.
pub fn decode(ty: Option<&FieldType>, value: Value) -> Json {
    match (ty, value) {
        (_, Value::Null) => Json::Null,
        (Some(FieldType::Pointer { target_class }), Value::String(id)) => json!({
            "__type": "Pointer",
            "className": target_class,
            "objectId": id,
        }),
        (Some(FieldType::File), Value::String(name)) => json!({
            "__type": "File",
            "name": name,
        }),
        (_, Value::Timestamp(at)) => json!({
            "__type": "Date",
            "iso": to_iso(&at),
        }),
        (_, Value::Point(point)) => json!({
            "__type": "GeoPoint",
            "latitude": number(point.y),
            "longitude": number(point.x),
        }),
        (_, Value::Polygon(points)) => json!({
            "__type": "Polygon",
            "coordinates": points.iter().map(|p| json!([number(p.y), number(p.x)])).collect::<Vec<_>>(),
        }),
        (_, Value::Bool(b)) => Json::Bool(b),
        (_, Value::Integer(i)) => Json::from(i),
        (_, Value::Number(n)) => number(n),
        (_, Value::String(s)) => Json::String(s),
        (_, Value::StringArray(items)) => Json::from(items),
        (_, Value::Json(json)) => json,
    }
}

/// A JSON number, written as an integer when the double is whole.
pub fn number(n: f64) -> Json {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

/// Formats a timestamp the way the document API writes ISO dates.
pub fn to_iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a `{"__type": "Date", "iso": ...}` value or a bare ISO string.
pub fn parse_date(value: &Json) -> Result<DateTime<Utc>> {
    let iso = match value {
        Json::String(iso) => iso.as_str(),
        Json::Object(_) if type_tag(value) == Some("Date") => value
            .get("iso")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::invalid_json("Date value is missing `iso`"))?,
        _ => return Err(Error::invalid_json(format!("invalid Date value: {value}"))),
    };

    DateTime::parse_from_rfc3339(iso)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| Error::invalid_json(format!("invalid ISO date: {iso}")))
}
