//! Validation Invariant Tests
//!
//! Batch validation semantics: presence and uniqueness rules, scoping of
//! default-field groups, one run per logical validator, and the two-phase
//! split between structural and scoped checks.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aeromodel::core::TransactionContext;
use aeromodel::field::FieldFactory;
use aeromodel::schema::{FieldDefinition, Model, ModelDefinition, ModelRegistry, ValidatorType};
use aeromodel::validation::validate_documents;
use aeromodel::validator::{RequiredValidator, Validator, ValidatorBehavior, ValidatorFactory, ValidatorOverrides};
use aeromodel::{CoreResult, ErrorCode, ValidatorDefinition};
use serde_json::{json, Value};

fn register(def: ModelDefinition) -> Arc<Model> {
    ModelRegistry::with_builtins().register(def).unwrap()
}

fn validate(model: &Arc<Model>, docs: &[Value]) -> CoreResult<()> {
    validate_documents(model, docs, &TransactionContext::new())
}

/// Counts rule invocations while delegating to the built-in REQUIRED rule
#[derive(Debug, Default)]
struct CountingRequired {
    calls: AtomicUsize,
}

impl ValidatorBehavior for CountingRequired {
    fn validate(&self, validator: &Validator, batch: &[aeromodel::Record], ctx: &TransactionContext) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RequiredValidator.validate(validator, batch, ctx)
    }
}

fn register_counting(def: ModelDefinition) -> (Arc<Model>, Arc<CountingRequired>) {
    let counter = Arc::new(CountingRequired::default());
    let mut overrides: ValidatorOverrides = HashMap::new();
    overrides.insert(ValidatorType::Required, counter.clone());
    let mut registry = ModelRegistry::new(
        Arc::new(FieldFactory::new()),
        Arc::new(ValidatorFactory::with_overrides(overrides)),
    );
    (registry.register(def).unwrap(), counter)
}

fn tasks_model() -> ModelDefinition {
    let mut task = BTreeMap::new();
    task.insert("title".to_string(), FieldDefinition::text());
    task.insert("owner".to_string(), FieldDefinition::relation("accounts"));
    ModelDefinition::new("boards").field(
        "tasks",
        FieldDefinition::array(FieldDefinition::nested(task))
            .with_validator(ValidatorDefinition::required("title")),
    )
}

/// `meta` holds arbitrary keys, each an object requiring a `title`
fn grouped_model() -> ModelDefinition {
    let mut entry = BTreeMap::new();
    entry.insert("title".to_string(), FieldDefinition::text());
    ModelDefinition::new("pages").field(
        "meta",
        FieldDefinition::nested(BTreeMap::new()).with_default_field(
            FieldDefinition::nested(entry).with_validator(ValidatorDefinition::required("title")),
        ),
    )
}

// =============================================================================
// REQUIRED
// =============================================================================

#[test]
fn test_required_rejects_missing_null_and_empty() {
    let model = register(
        ModelDefinition::new("posts")
            .field("title", FieldDefinition::text())
            .validator(ValidatorDefinition::required("title")),
    );

    for doc in [json!({}), json!({"title": null}), json!({"title": ""})] {
        let err = validate(&model, &[doc.clone()]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed, "{} should fail", doc);
    }
    assert!(validate(&model, &[json!({"title": "x"})]).is_ok());
}

#[test]
fn test_required_fails_if_any_record_misses() {
    let model = register(
        ModelDefinition::new("posts")
            .field("title", FieldDefinition::text())
            .validator(ValidatorDefinition::required("title")),
    );
    let err = validate(&model, &[json!({"title": "a"}), json!({})]).unwrap_err();
    let validation = err.as_validation().unwrap();
    assert_eq!(validation.validators.len(), 1);
    assert_eq!(validation.validators[0].path, "title");
}

// =============================================================================
// UNIQUE
// =============================================================================

#[test]
fn test_unique_across_batch() {
    let model = register(
        ModelDefinition::new("tags")
            .field("name", FieldDefinition::text())
            .validator(ValidatorDefinition::unique("name")),
    );

    assert!(validate(&model, &[json!({"name": "a"}), json!({"name": "b"}), json!({})]).is_ok());
    let err = validate(&model, &[json!({"name": "a"}), json!({"name": "a"})]).unwrap_err();
    assert_eq!(err.as_validation().unwrap().validators[0].path, "name");
}

#[test]
fn test_unique_inside_array_scope() {
    let mut task = BTreeMap::new();
    task.insert("title".to_string(), FieldDefinition::text());
    let model = register(ModelDefinition::new("boards").field(
        "tasks",
        FieldDefinition::array(FieldDefinition::nested(task))
            .with_validator(ValidatorDefinition::unique("title")),
    ));

    assert!(validate(&model, &[json!({"tasks": [{"title": "a"}, {"title": "b"}]})]).is_ok());
    let err = validate(&model, &[json!({"tasks": [{"title": "a"}, {"title": "a"}]})]).unwrap_err();
    assert_eq!(err.as_validation().unwrap().validators[0].path, "tasks.[].title");
}

// =============================================================================
// DEFAULT-FIELD GROUPING
// =============================================================================

#[test]
fn test_default_field_groups_are_scoped() {
    let model = register(grouped_model());
    assert!(validate(
        &model,
        &[json!({"meta": {"a": {"title": "x"}}}), json!({"meta": {"b": {"title": "y"}}})]
    )
    .is_ok());
}

#[test]
fn test_default_field_group_failure() {
    let model = register(grouped_model());
    let err = validate(
        &model,
        &[json!({"meta": {"a": {"title": "x"}}}), json!({"meta": {"b": {}}})],
    )
    .unwrap_err();

    let validation = err.as_validation().unwrap();
    assert!(validation.fields.is_empty());
    let paths: Vec<_> = validation.validators.iter().map(|v| v.path.as_str()).collect();
    assert_eq!(paths, vec!["meta.b.title"]);
}

// =============================================================================
// DEDUPLICATION
// =============================================================================

#[test]
fn test_array_scope_validator_runs_once() {
    let (model, counter) = register_counting(tasks_model());
    let docs = [
        json!({"tasks": [{"title": "a"}]}),
        json!({"tasks": [{"title": "b"}, {"title": "c", "extra": 1}]}),
        json!({"tasks": []}),
        json!({}),
    ];

    assert!(validate(&model, &docs).is_ok());
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_identical_groups_share_one_run() {
    let (model, counter) = register_counting(grouped_model());
    let docs = [json!({"meta": {"a": {"title": "x"}}}), json!({"meta": {"a": {"title": "x"}}})];
    assert!(validate(&model, &docs).is_ok());
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

    let (model, counter) = register_counting(grouped_model());
    let docs = [json!({"meta": {"a": {"title": "x"}}}), json!({"meta": {"b": {"title": "x"}}})];
    assert!(validate(&model, &docs).is_ok());
    assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_same_key_with_different_content_runs_once() {
    let (model, counter) = register_counting(grouped_model());
    let docs = [
        json!({"meta": {"a": {"title": "x"}}}),
        json!({"meta": {"a": {"title": "y"}}}),
        json!({"meta": {"a": {"title": "z", "extra": true}}}),
    ];
    assert!(validate(&model, &docs).is_ok());
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_field_errors_skip_scoped_validators() {
    let (model, counter) = register_counting(tasks_model());
    let err = validate(&model, &[json!({"tasks": [{"owner": "not-an-id"}]})]).unwrap_err();

    let validation = err.as_validation().unwrap();
    assert_eq!(validation.field_paths(), vec!["tasks.[].owner"]);
    assert!(validation.validators.is_empty());
    assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// GROUPED UNIQUE
// =============================================================================

fn ordered_model() -> Arc<Model> {
    let mut item = BTreeMap::new();
    item.insert("name".to_string(), FieldDefinition::text());
    let mut entry = BTreeMap::new();
    entry.insert("items".to_string(), FieldDefinition::array(FieldDefinition::nested(item)));
    entry.insert("n".to_string(), FieldDefinition::number());
    register(ModelDefinition::new("catalogs").field(
        "meta",
        FieldDefinition::nested(BTreeMap::new()).with_default_field(
            FieldDefinition::nested(entry).with_validator(ValidatorDefinition::unique("items.[].name")),
        ),
    ))
}

#[test]
fn test_unique_detected_when_group_content_matches() {
    let model = ordered_model();
    let doc = json!({"meta": {"k": {"items": [{"name": "a"}, {"name": "b"}]}}});
    let err = validate(&model, &[doc.clone(), doc]).unwrap_err();
    assert_eq!(err.as_validation().unwrap().validators[0].path, "meta.k.items.[].name");
}

#[test]
fn test_unique_detected_when_siblings_differ() {
    let model = ordered_model();
    let docs = [
        json!({"meta": {"k": {"items": [{"name": "a"}], "n": 1}}}),
        json!({"meta": {"k": {"items": [{"name": "a"}], "n": 2}}}),
    ];
    let err = validate(&model, &docs).unwrap_err();
    assert_eq!(err.as_validation().unwrap().validators[0].path, "meta.k.items.[].name");
}

#[test]
fn test_unique_detected_across_reordered_arrays() {
    // Reordered arrays hash into separate groups; the validator still runs
    // once over both documents because it shares one key.
    let model = ordered_model();
    let docs = [
        json!({"meta": {"k": {"items": [{"name": "a"}, {"name": "b"}]}}}),
        json!({"meta": {"k": {"items": [{"name": "b"}, {"name": "a"}]}}}),
    ];
    assert!(validate(&model, &docs).is_err());
}

#[test]
fn test_unique_is_scoped_per_key() {
    let model = ordered_model();
    let docs = [
        json!({"meta": {"k": {"items": [{"name": "a"}]}}}),
        json!({"meta": {"j": {"items": [{"name": "a"}]}}}),
    ];
    assert!(validate(&model, &docs).is_ok());
}

// =============================================================================
// RELATION ARRAYS
// =============================================================================

#[test]
fn test_relation_array_rejects_non_identifiers() {
    let model = register(
        ModelDefinition::new("teams")
            .field("members", FieldDefinition::array(FieldDefinition::relation("accounts"))),
    );

    for members in [json!([123]), json!([{"x": 1}]), json!(["5f8d0d55b54764421b7156c3", 123])] {
        let err = validate(&model, &[json!({ "members": members.clone() })]).unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().field_paths(),
            vec!["members.[]"],
            "{} should fail",
            members
        );
    }
    assert!(validate(&model, &[json!({"members": ["5f8d0d55b54764421b7156c3"]})]).is_ok());
}

#[test]
fn test_relation_array_document_keeps_positions() {
    let model = register(
        ModelDefinition::new("teams")
            .field("members", FieldDefinition::array(FieldDefinition::relation("accounts"))),
    );
    let record = model.record(json!({"members": [123, "5f8d0d55b54764421b7156c3"]}));
    assert_eq!(record.to_document(), json!({"members": [null, "5f8d0d55b54764421b7156c3"]}));
}
