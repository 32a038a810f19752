use super::{is_join_table, join_table_name, Field, FieldType, USER_CLASS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

/// Index keys: field name to direction (`1`, `-1`) in declaration order.
pub type IndexKeys = IndexMap<String, Json>;

/// A class schema as stored in the catalog and exchanged with the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub class_name: String,

    #[serde(default)]
    pub fields: IndexMap<String, Field>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_level_permissions: Option<Json>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub indexes: IndexMap<String, IndexKeys>,
}

impl Schema {
    pub fn new(class_name: impl Into<String>) -> Schema {
        Schema {
            class_name: class_name.into(),
            ..Schema::default()
        }
    }

    /// Adds a field, returning the schema for chaining.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Schema {
        self.fields.insert(name.into(), Field::from(ty));
        self
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name).map(|field| &field.ty)
    }

    pub fn is_user_class(&self) -> bool {
        self.class_name == USER_CLASS
    }

    pub fn is_join_table(&self) -> bool {
        is_join_table(&self.class_name)
    }

    /// Fields stored in join tables instead of columns.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields
            .iter()
            .filter(|(_, field)| field.is_relation())
            .map(|(name, field)| (name.as_str(), field))
    }

    pub fn join_tables(&self) -> Vec<String> {
        self.relations()
            .map(|(name, _)| join_table_name(&self.class_name, name))
            .collect()
    }

    /// The schema as stored: adds the hidden permission lists and, for the
    /// identity class, the password hash and history fields.
    pub fn to_storage(&self) -> Schema {
        let mut schema = self.clone();
        schema
            .fields
            .insert("_wperm".to_string(), FieldType::string_array().into());
        schema
            .fields
            .insert("_rperm".to_string(), FieldType::string_array().into());

        if schema.is_user_class() {
            schema
                .fields
                .insert("_hashed_password".to_string(), FieldType::String.into());
            schema
                .fields
                .insert("_password_history".to_string(), FieldType::array().into());
        }

        schema
    }

    /// The schema as shown to callers: hidden fields removed and
    /// permissions and indexes defaulted.
    pub fn to_public(&self) -> Schema {
        let mut schema = self.clone();
        schema.fields.shift_remove("_wperm");
        schema.fields.shift_remove("_rperm");
        if schema.is_user_class() {
            schema.fields.shift_remove("_hashed_password");
        }

        schema.class_level_permissions = Some(match self.class_level_permissions.as_ref() {
            Some(Json::Object(clps)) => {
                let mut merged = empty_clps();
                for (key, value) in clps {
                    merged.insert(key.clone(), value.clone());
                }
                Json::Object(merged)
            }
            _ => default_clps(),
        });

        schema
    }
}

fn default_clps() -> Json {
    json!({
        "find": {"*": true},
        "get": {"*": true},
        "count": {"*": true},
        "create": {"*": true},
        "update": {"*": true},
        "delete": {"*": true},
        "addField": {"*": true},
        "protectedFields": {"*": []},
    })
}

fn empty_clps() -> serde_json::Map<String, Json> {
    let Json::Object(clps) = json!({
        "find": {},
        "get": {},
        "count": {},
        "create": {},
        "update": {},
        "delete": {},
        "addField": {},
        "protectedFields": {},
    }) else {
        unreachable!()
    };
    clps
}
