use docsql_core::{Field, FieldType, Schema};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{doc, require_db};

fn post(class_name: &str) -> Schema {
    Schema::new(class_name)
        .field("objectId", FieldType::String)
        .field("createdAt", FieldType::Date)
        .field("updatedAt", FieldType::Date)
        .field("title", FieldType::String)
        .field("likes", FieldType::relation("_User"))
}

#[tokio::test]
async fn create_class_twice_is_a_duplicate() {
    let db = require_db!();
    let class_name = db.class("Post");

    let created = db.adapter.create_class(&post(&class_name)).await.unwrap();
    assert!(created.field_type("_rperm").is_none());
    assert!(created.class_level_permissions.is_some());

    let err = db.adapter.create_class(&post(&class_name)).await.unwrap_err();
    assert!(err.is_duplicate_value());
    assert_eq!(err.to_string(), format!("Class {class_name} already exists."));

    assert!(db.adapter.class_exists(&class_name).await.unwrap());
    let join_table = docsql_core::schema::join_table_name(&class_name, "likes");
    assert!(db.adapter.class_exists(&join_table).await.unwrap());

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn add_field_is_idempotent() {
    let db = require_db!();
    let class_name = db.class("Post");
    db.adapter.create_class(&post(&class_name)).await.unwrap();

    let score = Field::from(FieldType::Number);
    db.adapter
        .add_field_if_not_exists(&class_name, "score", &score)
        .await
        .unwrap();
    db.adapter
        .add_field_if_not_exists(&class_name, "score", &score)
        .await
        .unwrap();

    let schema = db.adapter.get_class(&class_name).await.unwrap().unwrap();
    assert_eq!(schema.field_type("score"), Some(&FieldType::Number));

    let err = db
        .adapter
        .add_field_if_not_exists(&class_name, "score", &Field::from(FieldType::String))
        .await
        .unwrap_err();
    assert!(err.is_schema_conflict());

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn add_field_creates_a_missing_class() {
    let db = require_db!();
    let class_name = db.class("Note");

    db.adapter
        .add_field_if_not_exists(&class_name, "body", &Field::from(FieldType::String))
        .await
        .unwrap();

    assert!(db.adapter.class_exists(&class_name).await.unwrap());
    let schema = db.adapter.get_class(&class_name).await.unwrap().unwrap();
    assert_eq!(schema.field_type("body"), Some(&FieldType::String));

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn delete_class_reports_user_classes() {
    let db = require_db!();
    let class_name = db.class("Post");
    db.adapter.create_class(&post(&class_name)).await.unwrap();

    let join_table = docsql_core::schema::join_table_name(&class_name, "likes");
    assert!(!db.adapter.delete_class(&join_table).await.unwrap());
    assert!(db.adapter.delete_class(&class_name).await.unwrap());

    assert_eq!(db.adapter.get_class(&class_name).await.unwrap(), None);
    assert!(!db.adapter.class_exists(&class_name).await.unwrap());

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn upgrade_adds_missing_columns() {
    let db = require_db!();
    let class_name = db.class("Post");
    db.adapter.create_class(&post(&class_name)).await.unwrap();

    let upgraded = post(&class_name)
        .field("score", FieldType::Number)
        .field("tags", FieldType::string_array());
    db.adapter.schema_upgrade(&upgraded).await.unwrap();

    let schema = db.adapter.get_class(&class_name).await.unwrap().unwrap();
    assert_eq!(schema.field_type("score"), Some(&FieldType::Number));
    assert_eq!(schema.field_type("tags"), Some(&FieldType::string_array()));

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn delete_fields_updates_table_and_catalog() {
    let db = require_db!();
    let class_name = db.class("Post");
    let schema = post(&class_name).field("score", FieldType::Number);
    db.adapter.create_class(&schema).await.unwrap();

    db.adapter
        .delete_fields(&class_name, &["score".to_string(), "likes".to_string()])
        .await
        .unwrap();

    let stored = db.adapter.get_class(&class_name).await.unwrap().unwrap();
    assert!(stored.field_type("score").is_none());
    assert!(stored.field_type("likes").is_none());
    assert_eq!(stored.field_type("title"), Some(&FieldType::String));

    // The column is gone: writing it fails.
    let err = db
        .adapter
        .create_object(&schema, &doc(json!({"objectId": "p1", "score": 1})), None)
        .await
        .unwrap_err();
    assert!(err.is_driver());

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn field_options_and_permissions_are_catalogued() {
    let db = require_db!();
    let class_name = db.class("Post");
    db.adapter.create_class(&post(&class_name)).await.unwrap();

    let title = Field {
        ty: FieldType::String,
        required: Some(true),
        default_value: Some(json!("untitled")),
    };
    db.adapter
        .update_field_options(&class_name, "title", &title)
        .await
        .unwrap();

    let clps = json!({"find": {"role:admin": true}});
    db.adapter
        .set_class_level_permissions(&class_name, &clps)
        .await
        .unwrap();

    let schema = db.adapter.get_class(&class_name).await.unwrap().unwrap();
    assert_eq!(schema.fields["title"], title);
    let clps = schema.class_level_permissions.unwrap();
    assert_eq!(clps["find"], json!({"role:admin": true}));
    assert_eq!(clps["get"], json!({}));

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn indexes() {
    let db = require_db!();
    let class_name = db.class("Post");
    let schema = post(&class_name);
    db.adapter.create_class(&schema).await.unwrap();

    let title = ["title".to_string()];
    db.adapter
        .ensure_index(&class_name, &title, None, true)
        .await
        .unwrap();
    // Already there.
    db.adapter
        .ensure_index(&class_name, &title, None, true)
        .await
        .unwrap();

    let names: Vec<String> = db
        .adapter
        .get_indexes(&class_name)
        .await
        .unwrap()
        .into_iter()
        .map(|index| index.name)
        .collect();
    assert!(names.contains(&format!("{class_name}_default_title")), "{names:?}");

    for id in ["p1", "p2"] {
        let object = doc(json!({"objectId": id, "title": "same"}));
        db.adapter.create_object(&schema, &object, None).await.unwrap();
    }
    let err = db
        .adapter
        .ensure_uniqueness(&class_name, &title)
        .await
        .unwrap_err();
    assert!(err.is_duplicate_value());

    let by_title = format!("{class_name}_by_title");
    let submitted = indexmap_of([(by_title.as_str(), json!({"title": 1}))]);
    db.adapter
        .set_indexes_with_schema_format(&class_name, &submitted, &Default::default(), &schema.fields)
        .await
        .unwrap();
    let stored = db.adapter.get_class(&class_name).await.unwrap().unwrap();
    assert!(stored.indexes.contains_key(&by_title));
    assert!(stored.indexes.contains_key("_id_"));

    let submitted = indexmap_of([(by_title.as_str(), json!({"__op": "Delete"}))]);
    db.adapter
        .set_indexes_with_schema_format(&class_name, &submitted, &stored.indexes, &schema.fields)
        .await
        .unwrap();
    let stored = db.adapter.get_class(&class_name).await.unwrap().unwrap();
    assert!(!stored.indexes.contains_key(&by_title));

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn create_and_drop_named_indexes() {
    let db = require_db!();
    let class_name = db.class("Post");
    db.adapter.create_class(&post(&class_name)).await.unwrap();

    let by_title = format!("{class_name}_title_desc");
    let indexes = indexmap::IndexMap::from([(by_title.clone(), indexmap_of([("title", json!(-1))]))]);
    db.adapter.create_indexes(&class_name, &indexes).await.unwrap();

    let index = db
        .adapter
        .get_indexes(&class_name)
        .await
        .unwrap()
        .into_iter()
        .find(|index| index.name == by_title)
        .unwrap();
    assert!(index.definition.contains("DESC"), "{}", index.definition);

    db.adapter
        .drop_indexes(&class_name, &[by_title.clone()])
        .await
        .unwrap();
    let indexes = db.adapter.get_indexes(&class_name).await.unwrap();
    assert!(indexes.iter().all(|index| index.name != by_title));

    db.cleanup().await.unwrap();
}

fn indexmap_of<const N: usize>(
    entries: [(&str, serde_json::Value); N],
) -> indexmap::IndexMap<String, serde_json::Value> {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
