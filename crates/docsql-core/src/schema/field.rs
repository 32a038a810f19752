use super::FieldType;
use serde::{Deserialize, Serialize};

/// A field declaration: its type plus the options the catalog keeps for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(flatten)]
    pub ty: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(
        default,
        rename = "defaultValue",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<serde_json::Value>,
}

impl Field {
    pub fn is_relation(&self) -> bool {
        self.ty.is_relation()
    }
}

impl From<FieldType> for Field {
    fn from(ty: FieldType) -> Field {
        Field {
            ty,
            required: None,
            default_value: None,
        }
    }
}
