use docsql_core::{FieldType, Schema};
use docsql_driver_postgresql::FindOptions;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{doc, require_db, TestDb};

async fn create_note(db: &TestDb) -> Schema {
    let schema = Schema::new(db.class("Note"))
        .field("objectId", FieldType::String)
        .field("body", FieldType::String);
    db.adapter.create_class(&schema).await.unwrap();
    schema
}

async fn count(db: &TestDb, schema: &Schema) -> i64 {
    db.adapter
        .count(schema, &doc(json!({})), false, None)
        .await
        .unwrap()
}

#[tokio::test]
async fn commit_makes_writes_visible() {
    let db = require_db!();
    let schema = create_note(&db).await;

    let session = db.adapter.create_transactional_session().await.unwrap();
    for id in ["n1", "n2"] {
        let object = doc(json!({"objectId": id, "body": "hello"}));
        db.adapter
            .create_object(&schema, &object, Some(&session))
            .await
            .unwrap();
    }

    // Reads inside the session see its writes; other connections do not.
    let inside = db
        .adapter
        .count(&schema, &doc(json!({})), false, Some(&session))
        .await
        .unwrap();
    assert_eq!(inside, 2);
    assert_eq!(count(&db, &schema).await, 0);

    db.adapter
        .commit_transactional_session(&session)
        .await
        .unwrap();
    assert_eq!(count(&db, &schema).await, 2);

    let err = db
        .adapter
        .create_object(&schema, &doc(json!({"objectId": "n3"})), Some(&session))
        .await
        .unwrap_err();
    assert!(err.is_transaction_closed());

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn abort_discards_writes() {
    let db = require_db!();
    let schema = create_note(&db).await;

    let session = db.adapter.create_transactional_session().await.unwrap();
    let object = doc(json!({"objectId": "n1", "body": "hello"}));
    db.adapter
        .create_object(&schema, &object, Some(&session))
        .await
        .unwrap();

    db.adapter
        .abort_transactional_session(&session)
        .await
        .unwrap();
    assert_eq!(count(&db, &schema).await, 0);

    let err = db
        .adapter
        .commit_transactional_session(&session)
        .await
        .unwrap_err();
    assert!(err.is_transaction_closed());

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn a_failed_operation_rolls_the_session_back() {
    let db = require_db!();
    let schema = create_note(&db).await;

    let session = db.adapter.create_transactional_session().await.unwrap();
    let object = doc(json!({"objectId": "n1", "body": "hello"}));
    db.adapter
        .create_object(&schema, &object, Some(&session))
        .await
        .unwrap();

    // Same primary key.
    let err = db
        .adapter
        .create_object(&schema, &object, Some(&session))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_value());

    let err = db
        .adapter
        .commit_transactional_session(&session)
        .await
        .unwrap_err();
    assert!(err.is_duplicate_value());
    assert_eq!(count(&db, &schema).await, 0);

    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn missing_class_in_a_session_keeps_earlier_writes() {
    let db = require_db!();
    let schema = create_note(&db).await;
    let ghost = Schema::new(db.class("Ghost")).field("body", FieldType::String);
    let query = doc(json!({}));

    let session = db.adapter.create_transactional_session().await.unwrap();
    let object = doc(json!({"objectId": "n1", "body": "hello"}));
    db.adapter
        .create_object(&schema, &object, Some(&session))
        .await
        .unwrap();

    let found = db
        .adapter
        .find(&ghost, &query, &FindOptions::default(), Some(&session))
        .await
        .unwrap();
    assert!(found.is_empty());
    let counted = db
        .adapter
        .count(&ghost, &query, false, Some(&session))
        .await
        .unwrap();
    assert_eq!(counted, 0);
    db.adapter
        .delete_objects_by_query(&ghost, &query, Some(&session))
        .await
        .unwrap();

    // The session is still usable after the recovered failures.
    let inside = db
        .adapter
        .count(&schema, &query, false, Some(&session))
        .await
        .unwrap();
    assert_eq!(inside, 1);

    db.adapter
        .commit_transactional_session(&session)
        .await
        .unwrap();
    assert_eq!(count(&db, &schema).await, 1);

    db.cleanup().await.unwrap();
}
