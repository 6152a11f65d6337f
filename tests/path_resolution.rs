//! Path Resolution Tests
//!
//! Resolution is purely schema-driven: the same path on the same model always
//! yields the same chain, and a broken step poisons every later step.

use std::collections::BTreeMap;
use std::sync::Arc;

use aeromodel::path::{resolve_path, split_path, FieldPathItem};
use aeromodel::schema::{FieldDefinition, FieldType, Model, ModelDefinition, ModelRegistry};

fn model() -> Arc<Model> {
    let mut comment = BTreeMap::new();
    comment.insert("body".to_string(), FieldDefinition::text());
    comment.insert("likes".to_string(), FieldDefinition::array(FieldDefinition::relation("accounts")));

    let mut meta = BTreeMap::new();
    meta.insert("title".to_string(), FieldDefinition::text());

    let mut registry = ModelRegistry::with_builtins();
    registry
        .register(
            ModelDefinition::new("posts")
                .field("title", FieldDefinition::text())
                .field("comments", FieldDefinition::array(FieldDefinition::nested(comment)))
                .field("meta", FieldDefinition::nested(meta).with_default_field(FieldDefinition::number()))
                .field("matrix", FieldDefinition::array(FieldDefinition::array(FieldDefinition::number()))),
        )
        .unwrap()
}

fn shape(items: &[Option<FieldPathItem>]) -> Vec<Option<(String, FieldType)>> {
    items
        .iter()
        .map(|item| item.as_ref().map(|i| (i.key.clone(), i.field.field_type())))
        .collect()
}

// =============================================================================
// DETERMINISM
// =============================================================================

#[test]
fn test_resolution_is_deterministic() {
    let model = model();
    for path in ["comments.[].likes.[2]", "meta.anything", "title", "matrix.[1].[]", "nope.x"] {
        let first = resolve_path(&model, path);
        let second = resolve_path(&model, path);
        assert_eq!(first.len(), second.len(), "length differs for {}", path);
        assert_eq!(shape(&first), shape(&second), "chain differs for {}", path);
    }
}

// =============================================================================
// SHORT-CIRCUIT
// =============================================================================

#[test]
fn test_unknown_root_is_all_none() {
    let items = resolve_path(&model(), "missing.a.b");
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(Option::is_none));
}

#[test]
fn test_none_poisons_the_rest() {
    let items = resolve_path(&model(), "title.sub.deeper.[0]");
    assert_eq!(items.len(), 4);
    assert!(items[0].is_some());
    assert!(items[1..].iter().all(Option::is_none));
}

#[test]
fn test_undeclared_nested_key_without_default_field_breaks() {
    let items = resolve_path(&model(), "comments.[].author.name");
    assert_eq!(
        shape(&items),
        vec![
            Some(("comments".to_string(), FieldType::Array)),
            Some(("[]".to_string(), FieldType::Nested)),
            None,
            None,
        ]
    );
}

// =============================================================================
// ARRAYS AND NESTED OBJECTS
// =============================================================================

#[test]
fn test_indexed_and_wildcard_items() {
    let model = model();
    let items = resolve_path(&model, "comments[1].likes.[]");
    let chain: Vec<_> = items.into_iter().map(Option::unwrap).collect();
    assert_eq!(chain[1].field.path(), "comments.[1]");
    assert_eq!(chain[2].field.path(), "comments.[1].likes");
    assert_eq!(chain[3].field.field_type(), FieldType::Relation);
    assert_eq!(chain[3].field.path(), "comments.[1].likes.[]");
}

#[test]
fn test_implicit_wildcard_is_inserted() {
    let items = resolve_path(&model(), "comments.body");
    assert_eq!(
        shape(&items),
        vec![
            Some(("comments".to_string(), FieldType::Array)),
            Some(("[]".to_string(), FieldType::Nested)),
            Some(("body".to_string(), FieldType::Text)),
        ]
    );
    assert_eq!(items[2].as_ref().unwrap().field.path(), "comments.[].body");
}

#[test]
fn test_default_field_answers_undeclared_keys() {
    let items = resolve_path(&model(), "meta.views");
    let views = items[1].as_ref().unwrap();
    assert_eq!(views.field.field_type(), FieldType::Number);
    assert_eq!(views.field.path(), "meta.views");

    let title = resolve_path(&model(), "meta.title");
    assert_eq!(title[1].as_ref().unwrap().field.field_type(), FieldType::Text);
}

#[test]
fn test_nested_arrays() {
    let items = resolve_path(&model(), "matrix.[1].[0]");
    let types: Vec<_> = items.iter().map(|i| i.as_ref().unwrap().field.field_type()).collect();
    assert_eq!(types, vec![FieldType::Array, FieldType::Array, FieldType::Number]);
}

#[test]
fn test_split_path_forms_are_equivalent() {
    assert_eq!(split_path("comments[0].body"), split_path("comments.[0].body"));
}
