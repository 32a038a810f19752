mod support;

use chrono::{TimeZone, Utc};
use docsql_core::{
    schema::{FieldType, Schema},
    Point, Value,
};
use docsql_sql::{compile_insert, compile_update};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{doc, post_schema};

fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

fn user_schema() -> Schema {
    Schema::new("_User")
        .field("objectId", FieldType::String)
        .field("username", FieldType::String)
        .field("title", FieldType::String)
        .to_storage()
}

#[test]
fn insert_routes_values_by_field_type() {
    let object = doc(json!({
        "objectId": "p1",
        "title": "Hello",
        "score": 3,
        "tags": ["a"],
        "items": [1],
        "meta": {"a": 1},
        "location": {"__type": "GeoPoint", "latitude": 10, "longitude": 20},
        "author": {"__type": "Pointer", "className": "_User", "objectId": "u1"},
        "createdAt": {"__type": "Date", "iso": "2024-01-01T00:00:00.000Z"},
        "_rperm": ["*"],
        "published": null,
    }));

    let compiled = compile_insert(&post_schema(), &object)
        .unwrap()
        .into_statement("Post", false);

    assert_eq!(
        compiled.sql,
        r#"INSERT INTO "Post" ("objectId", "title", "score", "tags", "items", "meta", "author", "createdAt", "_rperm", "location") VALUES ($1, $2, $3, $4::text[], $5::jsonb, $6, $7, $8, $9::text[], POINT($10, $11))"#
    );
    assert_eq!(
        compiled.params,
        [
            string("p1"),
            string("Hello"),
            Value::Number(3.0),
            Value::StringArray(vec!["a".to_string()]),
            Value::Json(json!([1])),
            Value::Json(json!({"a": 1})),
            string("u1"),
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            Value::StringArray(vec!["*".to_string()]),
            Value::Number(20.0),
            Value::Number(10.0),
        ]
    );
}

#[test]
fn insert_can_ignore_conflicts() {
    let compiled = compile_insert(&post_schema(), &doc(json!({"objectId": "p1"})))
        .unwrap()
        .into_statement("Post", true);
    assert_eq!(
        compiled.sql,
        r#"INSERT INTO "Post" ("objectId") VALUES ($1) ON CONFLICT DO NOTHING"#
    );
}

#[test]
fn insert_nests_dotted_keys() {
    let insert = compile_insert(
        &post_schema(),
        &doc(json!({"objectId": "p2", "meta.author": "ann"})),
    )
    .unwrap();
    assert_eq!(insert.columns, ["objectId", "meta"]);
    assert_eq!(
        insert.params.values(),
        [string("p2"), Value::Json(json!({"author": "ann"}))]
    );
}

#[test]
fn insert_rejects_reserved_nested_keys() {
    let err = compile_insert(&post_schema(), &doc(json!({"meta": {"a$b": 1}}))).unwrap_err();
    assert!(err.is_invalid_nested_key());

    let err = compile_insert(&post_schema(), &doc(json!({"meta": {"a": {"b.c": 1}}}))).unwrap_err();
    assert!(err.is_invalid_nested_key());
}

#[test]
fn insert_folds_auth_data() {
    let insert = compile_insert(
        &user_schema(),
        &doc(json!({"objectId": "u1", "_auth_data_facebook": {"id": "1"}})),
    )
    .unwrap();
    assert_eq!(insert.columns, ["objectId", "authData"]);
    assert_eq!(
        insert.params.values(),
        [string("u1"), Value::Json(json!({"facebook": {"id": "1"}}))]
    );
}

#[test]
fn insert_closes_polygons() {
    let insert = compile_insert(
        &post_schema(),
        &doc(json!({"area": {"__type": "Polygon", "coordinates": [[0, 0], [0, 1], [1, 1]]}})),
    )
    .unwrap();
    let [Value::Polygon(points)] = insert.params.values() else {
        panic!("expected one polygon, got {:?}", insert.params.values());
    };
    assert_eq!(
        points,
        &[
            Point { x: 0.0, y: 0.0 },
            Point { x: 1.0, y: 0.0 },
            Point { x: 1.0, y: 1.0 },
            Point { x: 0.0, y: 0.0 },
        ]
    );
}

#[test]
fn increment_update() {
    let update = compile_update(
        &post_schema(),
        &doc(json!({"score": {"__op": "Increment", "amount": 3}})),
    )
    .unwrap();
    assert_eq!(update.sets, [r#""score" = COALESCE("score", 0) + $1"#]);

    let compiled = update
        .into_statement(&post_schema(), &doc(json!({"objectId": "p1"})))
        .unwrap();
    assert_eq!(
        compiled.sql,
        r#"UPDATE "Post" SET "score" = COALESCE("score", 0) + $1 WHERE "objectId" = $2 RETURNING *"#
    );
    assert_eq!(compiled.params, [Value::Number(3.0), string("p1")]);
}

#[test]
fn array_operations_on_json_arrays() {
    for (op, function) in [
        ("Add", "array_add"),
        ("AddUnique", "array_add_unique"),
        ("Remove", "array_remove"),
    ] {
        let update = compile_update(
            &post_schema(),
            &doc(json!({"items": {"__op": op, "objects": [1, 2]}})),
        )
        .unwrap();
        assert_eq!(
            update.sets,
            [format!(r#""items" = {function}(COALESCE("items", '[]'::jsonb), $1::jsonb)"#)]
        );
        assert_eq!(update.params.values(), [Value::Json(json!([1, 2]))]);
    }
}

#[test]
fn array_operations_on_text_arrays() {
    let sets = |op: &str| {
        compile_update(
            &post_schema(),
            &doc(json!({"tags": {"__op": op, "objects": ["a"]}})),
        )
        .unwrap()
        .sets
    };

    assert_eq!(
        sets("Add"),
        [r#""tags" = array_cat(COALESCE("tags", '{}'::text[]), $1::text[])"#]
    );
    assert_eq!(
        sets("AddUnique"),
        [r#""tags" = array_cat(COALESCE("tags", '{}'::text[]), ARRAY(SELECT DISTINCT e FROM unnest($1::text[]) AS e WHERE e <> ALL (COALESCE("tags", '{}'::text[]))))"#]
    );
    assert_eq!(
        sets("Remove"),
        [r#""tags" = ARRAY(SELECT e FROM unnest(COALESCE("tags", '{}'::text[])) AS e WHERE e <> ALL ($1::text[]))"#]
    );
}

#[test]
fn text_array_operations_need_strings() {
    for op in ["Add", "AddUnique", "Remove"] {
        let err = compile_update(
            &post_schema(),
            &doc(json!({"tags": {"__op": op, "objects": ["a", 1]}})),
        )
        .unwrap_err();
        assert!(err.is_invalid_json(), "{op}: {err}");
    }

    let err = compile_update(
        &post_schema(),
        &doc(json!({"tags": {"__op": "Add", "objects": "a"}})),
    )
    .unwrap_err();
    assert!(err.is_invalid_json());
}

#[test]
fn delete_and_null() {
    let update = compile_update(
        &post_schema(),
        &doc(json!({"title": {"__op": "Delete"}, "score": null})),
    )
    .unwrap();
    assert_eq!(update.sets, [r#""title" = NULL"#, r#""score" = NULL"#]);
    assert!(update.params.is_empty());
}

#[test]
fn dotted_object_update_merges() {
    let update = compile_update(
        &post_schema(),
        &doc(json!({
            "meta.views": {"__op": "Increment", "amount": 1},
            "meta.old": {"__op": "Delete"},
            "meta.name": "x",
        })),
    )
    .unwrap();

    assert_eq!(
        update.sets,
        [r#""meta" = (COALESCE("meta", '{}'::jsonb) - $1::text || jsonb_build_object($2::text, COALESCE(("meta"->>$2::text)::double precision, 0) + $3) || $4::jsonb)"#]
    );
    assert_eq!(
        update.params.values(),
        [
            string("old"),
            string("views"),
            Value::Number(1.0),
            Value::Json(json!({"name": "x"})),
        ]
    );
}

#[test]
fn whole_object_update_replaces() {
    let update = compile_update(&post_schema(), &doc(json!({"meta": {"a": 1}}))).unwrap();
    assert_eq!(update.sets, [r#""meta" = ('{}'::jsonb || $1::jsonb)"#]);
}

#[test]
fn auth_data_is_assigned_once() {
    let update = compile_update(
        &user_schema(),
        &doc(json!({
            "title": "t",
            "_auth_data_facebook": {"id": "1"},
            "_auth_data_github": {"__op": "Delete"},
        })),
    )
    .unwrap();

    assert_eq!(
        update.sets,
        [
            r#""authData" = json_object_set_key(COALESCE(json_object_set_key(COALESCE("authData", '{}'::jsonb), $1::text, $2::jsonb)::jsonb, '{}'::jsonb), $3::text, $4::jsonb)::jsonb"#,
            r#""title" = $5"#,
        ]
    );
    assert_eq!(
        update.params.values(),
        [
            string("facebook"),
            Value::Json(json!({"id": "1"})),
            string("github"),
            Value::Null,
            string("t"),
        ]
    );
}

#[test]
fn typed_values() {
    let update = compile_update(
        &post_schema(),
        &doc(json!({
            "location": {"__type": "GeoPoint", "latitude": 1, "longitude": 2},
            "author": {"__type": "Pointer", "className": "_User", "objectId": "u1"},
            "updatedAt": "2024-01-01T00:00:00.000Z",
            "published": true,
        })),
    )
    .unwrap();

    assert_eq!(
        update.sets,
        [
            r#""location" = POINT($1, $2)"#,
            r#""author" = $3"#,
            r#""updatedAt" = $4"#,
            r#""published" = $5"#,
        ]
    );
    assert_eq!(
        update.params.values(),
        [
            Value::Number(2.0),
            Value::Number(1.0),
            string("u1"),
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            Value::Bool(true),
        ]
    );
}

#[test]
fn array_literals() {
    let update = compile_update(
        &post_schema(),
        &doc(json!({"tags": ["a", "b"], "items": [1]})),
    )
    .unwrap();
    assert_eq!(
        update.sets,
        [r#""tags" = $1::text[]"#, r#""items" = $2::jsonb"#]
    );
}

#[test]
fn relation_operations_are_skipped() {
    let update = compile_update(
        &post_schema(),
        &doc(json!({"likes": {"__op": "AddRelation", "objects": []}})),
    )
    .unwrap();
    assert!(update.is_empty());
}

#[test]
fn unsupported_updates_are_forbidden() {
    let err = compile_update(&post_schema(), &doc(json!({"title": [1]}))).unwrap_err();
    assert!(err.is_operation_forbidden());

    let err = compile_update(
        &post_schema(),
        &doc(json!({"score": {"__op": "Multiply", "amount": 2}})),
    )
    .unwrap_err();
    assert!(err.is_operation_forbidden());
}
