//! Compiles object writes: inserts, atomic updates and the documents an
//! upsert inserts.

mod insert;
pub use insert::{compile_insert, Insert};

mod update;
pub use update::{compile_update, Update};

use docsql_core::{mapper::type_tag, Document, Error, Result};
use serde_json::{Map, Value as Json};

/// Expands top-level dotted keys into nested objects: `{"a.b": 1}` becomes
/// `{"a": {"b": 1}}`. A `Delete` operation removes the nested key instead.
pub fn handle_dot_fields(object: &Document) -> Document {
    let mut out = Document::new();
    let mut dotted = vec![];

    for (key, value) in object {
        if key.contains('.') {
            dotted.push((key, value));
        } else {
            out.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in dotted {
        let mut components = key.split('.');
        let Some(first) = components.next() else {
            continue;
        };
        let rest: Vec<&str> = components.collect();
        let value = if op(value) == Some("Delete") {
            None
        } else {
            Some(value.clone())
        };

        let mut current = out
            .entry(first.to_string())
            .or_insert_with(|| Json::Object(Map::new()));

        for (i, component) in rest.iter().enumerate() {
            if !current.is_object() {
                *current = Json::Object(Map::new());
            }
            let Json::Object(map) = current else {
                break;
            };

            if i + 1 == rest.len() {
                match &value {
                    Some(value) => {
                        map.insert(component.to_string(), value.clone());
                    }
                    None => {
                        map.shift_remove(*component);
                    }
                }
                break;
            }

            current = map
                .entry(component.to_string())
                .or_insert_with(|| Json::Object(Map::new()));
        }
    }

    out
}

/// Rejects nested keys containing `$` or `.` anywhere in a written value.
pub fn validate_nested_keys(value: &Json) -> Result<()> {
    match value {
        Json::Object(map) => {
            for (key, value) in map {
                validate_nested_keys(value)?;
                if key.contains('$') || key.contains('.') {
                    return Err(Error::invalid_nested_key(
                        "Nested keys should not contain the '$' or '.' characters",
                    ));
                }
            }
            Ok(())
        }
        Json::Array(items) => items.iter().try_for_each(validate_nested_keys),
        _ => Ok(()),
    }
}

/// The provider name of an `_auth_data_<provider>` key.
pub fn auth_data_provider(key: &str) -> Option<&str> {
    let provider = key.strip_prefix("_auth_data_")?;
    let valid = !provider.is_empty()
        && provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(provider)
}

/// Moves every `_auth_data_<provider>` entry under a single `authData`
/// object so the column is only written once.
pub fn fold_auth_data(object: &mut Document) {
    let providers: Vec<String> = object
        .keys()
        .filter(|key| auth_data_provider(key).is_some())
        .cloned()
        .collect();

    for key in providers {
        let Some(value) = object.shift_remove(&key) else {
            continue;
        };
        let provider = auth_data_provider(&key).unwrap_or_default().to_string();

        let auth_data = object
            .entry("authData")
            .or_insert_with(|| Json::Object(Map::new()));
        if !auth_data.is_object() {
            *auth_data = Json::Object(Map::new());
        }
        if let Json::Object(auth_data) = auth_data {
            auth_data.insert(provider, value);
        }
    }
}

/// The document an upsert inserts when no row matches: the literal
/// constraints of `query` overlaid with `update`, with operations resolved
/// as if applied to an empty object.
pub fn upsert_document(query: &Document, update: &Document) -> Document {
    let mut document = Document::new();

    for (key, value) in query {
        if key.starts_with('$') {
            continue;
        }
        let literal = match value {
            Json::Object(ops) => type_tag(value).is_some() || !ops.keys().any(|k| k.starts_with('$')),
            _ => true,
        };
        if literal {
            document.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in update {
        let resolved = match op(value) {
            Some("Increment") => value.get("amount").cloned(),
            Some("Add") | Some("AddUnique") => value.get("objects").cloned(),
            Some("Remove") => Some(Json::Array(vec![])),
            Some("Delete") => {
                document.shift_remove(key);
                None
            }
            Some(_) => None,
            None => Some(value.clone()),
        };
        if let Some(resolved) = resolved {
            document.insert(key.clone(), resolved);
        }
    }

    document
}

fn op(value: &Json) -> Option<&str> {
    value.get("__op")?.as_str()
}
