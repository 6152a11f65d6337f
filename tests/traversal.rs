//! Traversal Tests
//!
//! Reads and writes through records: broadcast over arrays, lazy handles for
//! relations and nested objects, and JSON read idempotence.

use std::collections::BTreeMap;
use std::sync::Arc;

use aeromodel::field::{FieldValue, Format};
use aeromodel::schema::{FieldDefinition, Model, ModelDefinition, ModelRegistry};
use aeromodel::{ErrorCode, Record};
use serde_json::json;

const A: &str = "5f8d0d55b54764421b7156c1";
const B: &str = "5f8d0d55b54764421b7156c2";
const C: &str = "5f8d0d55b54764421b7156c3";

fn model() -> Arc<Model> {
    let mut task = BTreeMap::new();
    task.insert("title".to_string(), FieldDefinition::text());
    task.insert("done".to_string(), FieldDefinition::boolean().with_default(json!(false)));

    let mut meta = BTreeMap::new();
    meta.insert("owner".to_string(), FieldDefinition::relation("accounts"));

    let mut registry = ModelRegistry::with_builtins();
    registry
        .register(
            ModelDefinition::new("boards")
                .field("name", FieldDefinition::text())
                .field("members", FieldDefinition::array(FieldDefinition::relation("accounts")))
                .field("tasks", FieldDefinition::array(FieldDefinition::nested(task)))
                .field("meta", FieldDefinition::nested(meta).with_default_field(FieldDefinition::number()))
                .field("score", FieldDefinition::number()),
        )
        .unwrap()
}

fn record(data: serde_json::Value) -> Record {
    Record::new(model(), data)
}

// =============================================================================
// RELATION ARRAYS
// =============================================================================

#[test]
fn test_relation_array_broadcast() {
    let board = record(json!({"members": [A, B, C]}));

    match board.get("members.[]", Format::Object) {
        FieldValue::List(items) => {
            assert_eq!(items.len(), 3);
            let ids: Vec<_> = items
                .iter()
                .map(|item| match item {
                    FieldValue::Record(r) => {
                        assert_eq!(r.model, "accounts");
                        r.id.clone()
                    }
                    other => panic!("expected a record handle, got {:?}", other),
                })
                .collect();
            assert_eq!(ids, vec![A, B, C]);
        }
        other => panic!("expected a list, got {:?}", other),
    }
}

#[test]
fn test_relation_array_index() {
    let board = record(json!({"members": [A, B, C]}));

    match board.get("members.[1]", Format::Object) {
        FieldValue::Record(r) => assert_eq!(r.id, B),
        other => panic!("expected a record handle, got {:?}", other),
    }
    assert!(board.get("members.[3]", Format::Object).is_undefined());
}

#[test]
fn test_relation_array_whole() {
    let board = record(json!({"members": [A, {"_id": B, "name": "populated"}]}));

    match board.get("members", Format::Object) {
        FieldValue::RecordList(list) => {
            assert_eq!(list.model, "accounts");
            assert_eq!(list.ids, vec![A, B]);
        }
        other => panic!("expected a record list, got {:?}", other),
    }
    assert_eq!(board.get_json("members"), json!([A, B]));
}

// =============================================================================
// NESTED OBJECTS
// =============================================================================

#[test]
fn test_nested_view() {
    let board = record(json!({"meta": {"owner": A, "views": "12"}}));

    let view = match board.get("meta", Format::Object) {
        FieldValue::Nested(view) => view,
        other => panic!("expected a nested view, got {:?}", other),
    };
    assert_eq!(view.path(), "meta");
    match view.get("owner") {
        FieldValue::Record(r) => assert_eq!(r.id, A),
        other => panic!("expected a record handle, got {:?}", other),
    }
    assert_eq!(view.get("views"), FieldValue::Json(json!(12)));
    assert!(view.get("missing").is_undefined());
}

#[test]
fn test_broadcast_through_nested_items() {
    let board = record(json!({"tasks": [{"title": "a"}, {"title": "b", "done": true}]}));

    assert_eq!(
        board.get("tasks.[].title", Format::Json),
        FieldValue::List(vec![FieldValue::Json(json!("a")), FieldValue::Json(json!("b"))])
    );
    // Implicit wildcard reads the same values.
    assert_eq!(board.get("tasks.title", Format::Json), board.get("tasks.[].title", Format::Json));
    // Defaults are injected per element on reads but never in document form.
    assert_eq!(board.get_json("tasks.[].done"), json!([false, true]));
    assert_eq!(board.get("tasks.[0].done", Format::Document), FieldValue::Undefined);
}

#[test]
fn test_null_short_circuits() {
    let board = record(json!({"meta": null, "tasks": null}));
    assert_eq!(board.get("meta.owner", Format::Json), FieldValue::null());
    assert_eq!(board.get("tasks.[0].title", Format::Json), FieldValue::null());
    assert!(board.get("name", Format::Json).is_undefined());
}

// =============================================================================
// SETTERS
// =============================================================================

#[test]
fn test_set_coerces_and_materializes() {
    let mut board = record(json!({}));
    board.set("meta.views", json!("7")).unwrap();
    board.set("tasks.[0].title", json!(42)).unwrap();
    board.set("members.[1]", json!({"_id": B})).unwrap();

    assert_eq!(
        board.data(),
        &json!({
            "meta": {"views": 7},
            "tasks": [{"title": "42"}],
            "members": [null, B],
        })
    );
}

#[test]
fn test_set_broadcast_and_unset() {
    let mut board = record(json!({"tasks": [{"title": "a"}, {"title": "b"}], "score": 3}));
    board.set("tasks.[].done", json!(true)).unwrap();
    board.unset("score").unwrap();

    assert_eq!(board.get_json("tasks.[].done"), json!([true, true]));
    assert!(board.data().get("score").is_none());
}

#[test]
fn test_set_unresolvable_path() {
    let mut board = record(json!({}));
    let err = board.set("name.first", json!("x")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidPath);
    let err = board.set("unknown", json!("x")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidPath);
}

// =============================================================================
// IDEMPOTENCE
// =============================================================================

#[test]
fn test_json_read_is_idempotent() {
    let original = json!({
        "name": "board",
        "score": 4.5,
        "members": [A, B],
        "meta": {"owner": A, "views": 3},
        "tasks": [{"title": "a", "done": true}],
    });
    let board = record(original.clone());

    let mut copy = record(json!({}));
    for path in ["name", "score", "members", "meta", "tasks"] {
        copy.set(path, board.get_json(path)).unwrap();
    }
    assert_eq!(copy.data(), &original);
    assert_eq!(copy.to_json(), board.to_json());
}
