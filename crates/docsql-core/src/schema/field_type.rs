use super::ColumnType;
use serde::{Deserialize, Serialize};

/// The type of a class field, in the document-API JSON shape.
///
/// Serializes as `{"type": "String"}`, `{"type": "Pointer", "targetClass":
/// "Team"}` or `{"type": "Array", "contents": {"type": "String"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contents: Option<Box<FieldType>>,
    },
    Pointer {
        #[serde(rename = "targetClass")]
        target_class: String,
    },
    Relation {
        #[serde(rename = "targetClass")]
        target_class: String,
    },
    GeoPoint,
    Polygon,
    Bytes,
    File,
}

impl FieldType {
    /// An array with no declared element type.
    pub fn array() -> FieldType {
        FieldType::Array { contents: None }
    }

    /// An array of strings, stored as a native `text[]` column.
    pub fn string_array() -> FieldType {
        FieldType::Array {
            contents: Some(Box::new(FieldType::String)),
        }
    }

    pub fn pointer(target_class: impl Into<String>) -> FieldType {
        FieldType::Pointer {
            target_class: target_class.into(),
        }
    }

    pub fn relation(target_class: impl Into<String>) -> FieldType {
        FieldType::Relation {
            target_class: target_class.into(),
        }
    }

    /// The column backing a field of this type. Relations live in join
    /// tables and have no column.
    pub fn column_type(&self) -> Option<ColumnType> {
        Some(match self {
            FieldType::String | FieldType::File | FieldType::Pointer { .. } => ColumnType::Text,
            FieldType::Date => ColumnType::TimestampTz,
            FieldType::Object | FieldType::Bytes => ColumnType::Jsonb,
            FieldType::Boolean => ColumnType::Boolean,
            FieldType::Number => ColumnType::DoublePrecision,
            FieldType::GeoPoint => ColumnType::Point,
            FieldType::Polygon => ColumnType::Polygon,
            FieldType::Array { .. } if self.is_string_array() => ColumnType::TextArray,
            FieldType::Array { .. } => ColumnType::Jsonb,
            FieldType::Relation { .. } => return None,
        })
    }

    pub fn is_string_array(&self) -> bool {
        matches!(self, FieldType::Array { contents: Some(contents) } if **contents == FieldType::String)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array { .. })
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, FieldType::Relation { .. })
    }

    pub fn target_class(&self) -> Option<&str> {
        match self {
            FieldType::Pointer { target_class } | FieldType::Relation { target_class } => {
                Some(target_class)
            }
            _ => None,
        }
    }

    /// The bare type tag, e.g. `"Pointer"`.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
            FieldType::Date => "Date",
            FieldType::Object => "Object",
            FieldType::Array { .. } => "Array",
            FieldType::Pointer { .. } => "Pointer",
            FieldType::Relation { .. } => "Relation",
            FieldType::GeoPoint => "GeoPoint",
            FieldType::Polygon => "Polygon",
            FieldType::Bytes => "Bytes",
            FieldType::File => "File",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_shape() {
        assert_eq!(
            serde_json::to_value(FieldType::pointer("Team")).unwrap(),
            json!({"type": "Pointer", "targetClass": "Team"})
        );
        assert_eq!(
            serde_json::to_value(FieldType::string_array()).unwrap(),
            json!({"type": "Array", "contents": {"type": "String"}})
        );
        assert_eq!(
            serde_json::to_value(FieldType::array()).unwrap(),
            json!({"type": "Array"})
        );

        let parsed: FieldType = serde_json::from_value(json!({"type": "GeoPoint"})).unwrap();
        assert_eq!(parsed, FieldType::GeoPoint);
    }

    #[test]
    fn column_types() {
        assert_eq!(FieldType::String.column_type(), Some(ColumnType::Text));
        assert_eq!(FieldType::pointer("A").column_type(), Some(ColumnType::Text));
        assert_eq!(FieldType::Date.column_type(), Some(ColumnType::TimestampTz));
        assert_eq!(FieldType::Bytes.column_type(), Some(ColumnType::Jsonb));
        assert_eq!(FieldType::string_array().column_type(), Some(ColumnType::TextArray));
        assert_eq!(FieldType::array().column_type(), Some(ColumnType::Jsonb));
        assert_eq!(FieldType::relation("A").column_type(), None);
    }
}
