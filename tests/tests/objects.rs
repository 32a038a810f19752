use docsql_core::{FieldType, Schema};
use docsql_driver_postgresql::FindOptions;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{doc, require_db, TestDb};

fn game(class_name: &str) -> Schema {
    Schema::new(class_name)
        .field("objectId", FieldType::String)
        .field("createdAt", FieldType::Date)
        .field("updatedAt", FieldType::Date)
        .field("title", FieldType::String)
        .field("email", FieldType::String)
        .field("count", FieldType::Number)
        .field("status", FieldType::String)
        .field("amount", FieldType::Number)
        .field("tags", FieldType::string_array())
        .field("items", FieldType::array())
        .field("location", FieldType::GeoPoint)
        .field("owner", FieldType::pointer("_User"))
}

async fn create_game(db: &TestDb) -> Schema {
    let schema = game(&db.class("Game"));
    db.adapter.create_class(&schema).await.unwrap();
    schema
}

#[tokio::test]
async fn increment_adds_to_the_stored_value() {
    let db = require_db!();
    let schema = create_game(&db).await;

    let object = doc(json!({"objectId": "g1", "count": 5}));
    db.adapter.create_object(&schema, &object, None).await.unwrap();

    let updated = db
        .adapter
        .find_one_and_update(
            &schema,
            &doc(json!({"objectId": "g1"})),
            &doc(json!({"count": {"__op": "Increment", "amount": 3}})),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["count"], json!(8));

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn update_by_query_returns_every_match() {
    let db = require_db!();
    let schema = create_game(&db).await;

    for (id, status) in [("g1", "open"), ("g2", "open"), ("g3", "done")] {
        let object = doc(json!({"objectId": id, "status": status}));
        db.adapter.create_object(&schema, &object, None).await.unwrap();
    }

    let mut updated = db
        .adapter
        .update_objects_by_query(
            &schema,
            &doc(json!({"status": "open"})),
            &doc(json!({"title": "renamed"})),
            None,
        )
        .await
        .unwrap();
    updated.sort_by_key(|object| object["objectId"].as_str().map(str::to_string));

    let ids: Vec<_> = updated.iter().map(|object| object["objectId"].clone()).collect();
    assert_eq!(ids, [json!("g1"), json!("g2")]);
    assert!(updated.iter().all(|object| object["title"] == json!("renamed")));

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn find_decodes_typed_columns() {
    let db = require_db!();
    let schema = create_game(&db).await;

    let object = doc(json!({
        "objectId": "g1",
        "createdAt": {"__type": "Date", "iso": "2024-03-01T12:00:00.000Z"},
        "title": "chess",
        "tags": ["board", "classic"],
        "items": [1, {"k": "v"}],
        "location": {"__type": "GeoPoint", "latitude": 40.5, "longitude": -73.25},
        "owner": {"__type": "Pointer", "className": "_User", "objectId": "u1"},
    }));
    db.adapter.create_object(&schema, &object, None).await.unwrap();

    let found = db
        .adapter
        .find(&schema, &doc(json!({"objectId": "g1"})), &FindOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(
        found,
        vec![doc(json!({
            "objectId": "g1",
            "createdAt": "2024-03-01T12:00:00.000Z",
            "title": "chess",
            "tags": ["board", "classic"],
            "items": [1, {"k": "v"}],
            "location": {"__type": "GeoPoint", "latitude": 40.5, "longitude": -73.25},
            "owner": {"__type": "Pointer", "className": "_User", "objectId": "u1"},
        }))]
    );

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn find_with_in_sort_and_paging() {
    let db = require_db!();
    let schema = create_game(&db).await;

    for (id, title) in [("g1", "a"), ("g2", "b"), ("g3", "c")] {
        let object = doc(json!({"objectId": id, "title": title}));
        db.adapter.create_object(&schema, &object, None).await.unwrap();
    }

    let options = FindOptions::default()
        .sort("title", -1)
        .limit(1)
        .keys(["title"]);
    let found = db
        .adapter
        .find(&schema, &doc(json!({"title": {"$in": ["a", "b"]}})), &options, None)
        .await
        .unwrap();
    assert_eq!(found, vec![doc(json!({"title": "b"}))]);

    let count = db
        .adapter
        .count(&schema, &doc(json!({"title": {"$ne": "a"}})), false, None)
        .await
        .unwrap();
    assert_eq!(count, 2);

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn missing_class_reads_are_empty() {
    let db = require_db!();
    let schema = game(&db.class("Ghost"));
    let query = doc(json!({}));

    let found = db
        .adapter
        .find(&schema, &query, &FindOptions::default(), None)
        .await
        .unwrap();
    assert!(found.is_empty());
    assert_eq!(db.adapter.count(&schema, &query, false, None).await.unwrap(), 0);
    assert!(db
        .adapter
        .distinct(&schema, "title", &query, None)
        .await
        .unwrap()
        .is_empty());

    // Deleting from a missing table is a no-op.
    db.adapter
        .delete_objects_by_query(&schema, &query, None)
        .await
        .unwrap();

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn delete_reports_when_nothing_matched() {
    let db = require_db!();
    let schema = create_game(&db).await;

    let object = doc(json!({"objectId": "g1", "title": "chess"}));
    db.adapter.create_object(&schema, &object, None).await.unwrap();

    let err = db
        .adapter
        .delete_objects_by_query(&schema, &doc(json!({"title": "go"})), None)
        .await
        .unwrap_err();
    assert!(err.is_object_not_found());
    assert_eq!(err.code(), 101);

    db.adapter
        .delete_objects_by_query(&schema, &doc(json!({"title": "chess"})), None)
        .await
        .unwrap();
    assert_eq!(
        db.adapter.count(&schema, &doc(json!({})), false, None).await.unwrap(),
        0
    );

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn unique_violations_name_the_field() {
    let db = require_db!();
    let schema = create_game(&db).await;
    db.adapter
        .ensure_uniqueness(&schema.class_name, &["email".to_string()])
        .await
        .unwrap();

    let first = doc(json!({"objectId": "g1", "email": "a@example.com"}));
    db.adapter.create_object(&schema, &first, None).await.unwrap();

    let second = doc(json!({"objectId": "g2", "email": "a@example.com"}));
    let err = db
        .adapter
        .create_object(&schema, &second, None)
        .await
        .unwrap_err();
    assert!(err.is_duplicate_value());
    assert_eq!(err.duplicated_field(), Some("email"));
    assert_eq!(err.code(), 137);

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn upsert_inserts_then_updates() {
    let db = require_db!();
    let schema = create_game(&db).await;

    let query = doc(json!({"objectId": "g1"}));
    let update = doc(json!({"count": {"__op": "Increment", "amount": 2}}));

    db.adapter
        .upsert_one_object(&schema, &query, &update, None)
        .await
        .unwrap();
    db.adapter
        .upsert_one_object(&schema, &query, &update, None)
        .await
        .unwrap();

    let found = db
        .adapter
        .find(&schema, &query, &FindOptions::default().keys(["count"]), None)
        .await
        .unwrap();
    assert_eq!(found, vec![doc(json!({"count": 4}))]);

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn array_updates() {
    let db = require_db!();
    let schema = create_game(&db).await;

    let object = doc(json!({"objectId": "g1", "tags": ["a"], "items": [1, 2, 3]}));
    db.adapter.create_object(&schema, &object, None).await.unwrap();

    let updated = db
        .adapter
        .find_one_and_update(
            &schema,
            &doc(json!({"objectId": "g1"})),
            &doc(json!({
                "tags": {"__op": "AddUnique", "objects": ["a", "b"]},
                "items": {"__op": "Remove", "objects": [2]},
            })),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["tags"], json!(["a", "b"]));
    assert_eq!(updated["items"], json!([1, 3]));

    let matched = db
        .adapter
        .count(&schema, &doc(json!({"items": {"$all": [1, 3]}})), false, None)
        .await
        .unwrap();
    assert_eq!(matched, 1);

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn distinct_values() {
    let db = require_db!();
    let schema = create_game(&db).await;

    for (id, status, owner) in [("g1", "A", "u1"), ("g2", "A", "u2"), ("g3", "B", "u1")] {
        let object = doc(json!({
            "objectId": id,
            "status": status,
            "owner": {"__type": "Pointer", "className": "_User", "objectId": owner},
        }));
        db.adapter.create_object(&schema, &object, None).await.unwrap();
    }
    let object = doc(json!({"objectId": "g4"}));
    db.adapter.create_object(&schema, &object, None).await.unwrap();

    let mut statuses = db
        .adapter
        .distinct(&schema, "status", &doc(json!({})), None)
        .await
        .unwrap();
    statuses.sort_by_key(|status| status.to_string());
    assert_eq!(statuses, [json!("A"), json!("B")]);

    let owners = db
        .adapter
        .distinct(&schema, "owner", &doc(json!({"status": "B"})), None)
        .await
        .unwrap();
    assert_eq!(
        owners,
        [json!({"__type": "Pointer", "className": "_User", "objectId": "u1"})]
    );

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn aggregate_sums_by_group() {
    let db = require_db!();
    let schema = create_game(&db).await;

    for (id, status, amount) in [("g1", "A", 10), ("g2", "A", 5), ("g3", "B", 7)] {
        let object = doc(json!({"objectId": id, "status": status, "amount": amount}));
        db.adapter.create_object(&schema, &object, None).await.unwrap();
    }

    let pipeline = [
        json!({"$match": {"status": "A"}}),
        json!({"$group": {"_id": "$status", "total": {"$sum": "$amount"}}}),
    ];
    let rows = db
        .adapter
        .aggregate(&schema, &pipeline, false, None)
        .await
        .unwrap();
    assert_eq!(rows, vec![doc(json!({"objectId": "A", "total": 15}))]);

    let pipeline = [json!({"$group": {"_id": null, "n": {"$sum": 1}}})];
    let rows = db
        .adapter
        .aggregate(&schema, &pipeline, false, None)
        .await
        .unwrap();
    assert_eq!(rows, vec![doc(json!({"n": 3, "objectId": null}))]);

    db.cleanup().await.unwrap();
}
