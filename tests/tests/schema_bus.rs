use docsql_core::{FieldType, Schema};
use docsql_driver_postgresql::SchemaChange;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tests::require_db;
use tokio::sync::mpsc;

#[tokio::test]
async fn other_instances_hear_schema_changes() {
    let (tx, mut rx) = mpsc::unbounded_channel::<SchemaChange>();

    let listener = require_db!(|builder: &mut docsql_driver_postgresql::Builder| {
        builder.enable_schema_hooks(true);
    });
    listener.adapter.watch(move |change| {
        let _ = tx.send(change);
    });

    let writer = require_db!(|builder: &mut docsql_driver_postgresql::Builder| {
        builder.enable_schema_hooks(true);
    });

    let class_name = writer.class("Post");
    let schema = Schema::new(&class_name).field("title", FieldType::String);
    writer.adapter.create_class(&schema).await.unwrap();

    // The listener may also hear about other tests' classes.
    let heard = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(change) = rx.recv().await {
            if change.class_name.as_deref() == Some(class_name.as_str()) {
                return change;
            }
        }
        panic!("listener stopped");
    })
    .await
    .expect("no schema change received");
    assert_eq!(heard.class_name.as_deref(), Some(class_name.as_str()));

    writer.cleanup().await.unwrap();
    listener.cleanup().await.unwrap();
}

async fn next_change_for(rx: &mut mpsc::UnboundedReceiver<SchemaChange>, class_name: &str) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(change) = rx.recv().await {
            if change.class_name.as_deref() == Some(class_name) {
                return;
            }
        }
        panic!("listener stopped");
    })
    .await
    .expect("no schema change received");
}

#[tokio::test]
async fn index_changes_are_announced() {
    let (tx, mut rx) = mpsc::unbounded_channel::<SchemaChange>();

    let listener = require_db!(|builder: &mut docsql_driver_postgresql::Builder| {
        builder.enable_schema_hooks(true);
    });
    listener.adapter.watch(move |change| {
        let _ = tx.send(change);
    });

    let writer = require_db!(|builder: &mut docsql_driver_postgresql::Builder| {
        builder.enable_schema_hooks(true);
    });

    let class_name = writer.class("Post");
    let schema = Schema::new(&class_name).field("title", FieldType::String);
    writer.adapter.create_class(&schema).await.unwrap();
    next_change_for(&mut rx, &class_name).await;

    let title = ["title".to_string()];
    writer
        .adapter
        .ensure_index(&class_name, &title, None, false)
        .await
        .unwrap();
    next_change_for(&mut rx, &class_name).await;

    writer.adapter.ensure_uniqueness(&class_name, &title).await.unwrap();
    next_change_for(&mut rx, &class_name).await;

    let name = format!("{class_name}_default_title");
    writer.adapter.drop_indexes(&class_name, &[name]).await.unwrap();
    next_change_for(&mut rx, &class_name).await;

    writer.cleanup().await.unwrap();
    listener.cleanup().await.unwrap();
}

#[tokio::test]
async fn own_changes_are_not_echoed() {
    let (tx, mut rx) = mpsc::unbounded_channel::<SchemaChange>();

    let db = require_db!(|builder: &mut docsql_driver_postgresql::Builder| {
        builder.enable_schema_hooks(true);
    });
    db.adapter.watch(move |change| {
        let _ = tx.send(change);
    });

    let class_name = db.class("Post");
    let schema = Schema::new(&class_name).field("title", FieldType::String);
    db.adapter.create_class(&schema).await.unwrap();

    let echoed = tokio::time::timeout(Duration::from_millis(500), async {
        while let Some(change) = rx.recv().await {
            if change.class_name.as_deref() == Some(class_name.as_str()) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(!echoed);

    db.cleanup().await.unwrap();
}
