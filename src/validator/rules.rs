//! Built-in validator rules

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{Validator, ValidatorBehavior};
use crate::core::context::TransactionContext;
use crate::field::{coerce_number, FieldValue};
use crate::record::Record;
use crate::schema::{system_fields, FieldDefinition, ValidatorDefinition};

/// Slugs that user-defined models may not take
pub const RESERVED_SLUGS: &[&str] = &["models", "accounts", "roles", "settings"];

const KEY_PATTERN: &str = r"^[a-zA-Z0-9_\-]+$";
const MODEL_SLUG_PATTERN: &str = r"^[a-z][a-zA-Z0-9_]*$";

fn key_regex() -> Option<&'static Regex> {
    static KEY: OnceLock<Option<Regex>> = OnceLock::new();
    KEY.get_or_init(|| Regex::new(KEY_PATTERN).ok()).as_ref()
}

fn model_slug_regex() -> Option<&'static Regex> {
    static SLUG: OnceLock<Option<Regex>> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(MODEL_SLUG_PATTERN).ok()).as_ref()
}

/// Text form used by pattern and length checks
fn as_text(value: &FieldValue) -> String {
    match value.to_json() {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn all_present(values: &[FieldValue]) -> bool {
    values.iter().all(|v| !v.is_empty())
}

fn all_distinct(values: &[FieldValue]) -> bool {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| !v.is_empty())
        .all(|v| seen.insert(v.to_json().to_string()))
}

fn all_match(values: &[FieldValue], regex: &Regex) -> bool {
    values
        .iter()
        .filter(|v| !v.is_empty())
        .all(|v| regex.is_match(&as_text(v)))
}

fn within(n: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |min| n >= min) && max.map_or(true, |max| n <= max)
}

/// Builds `(?flags)pattern`, keeping only flags the regex engine knows
fn compile_pattern(pattern: &str, flags: Option<&str>) -> Result<Regex, regex::Error> {
    let flags: String = flags
        .unwrap_or_default()
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x' | 'U'))
        .collect();
    if flags.is_empty() {
        Regex::new(pattern)
    } else {
        Regex::new(&format!("(?{}){}", flags, pattern))
    }
}

#[derive(Debug, Default)]
pub struct RequiredValidator;

impl ValidatorBehavior for RequiredValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        all_present(&validator.values(batch, ctx))
    }
}

#[derive(Debug, Default)]
pub struct UniqueValidator;

impl ValidatorBehavior for UniqueValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        all_distinct(&validator.values(batch, ctx))
    }
}

#[derive(Debug, Default)]
pub struct RegexValidator;

impl ValidatorBehavior for RegexValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        let options = validator.options();
        let pattern = match options.pattern.as_deref() {
            Some(pattern) => pattern,
            None => return true,
        };
        match compile_pattern(pattern, options.flags.as_deref()) {
            Ok(regex) => all_match(&validator.values(batch, ctx), &regex),
            Err(err) => {
                tracing::warn!(path = %validator.full_path(), error = %err, "invalid validator pattern");
                false
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct LengthValidator;

impl ValidatorBehavior for LengthValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        let options = validator.options();
        validator
            .values(batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| {
                let len = match v.to_json() {
                    Value::Array(items) => items.len(),
                    _ => as_text(v).chars().count(),
                };
                within(len as f64, options.min, options.max)
            })
    }
}

#[derive(Debug, Default)]
pub struct BoundariesValidator;

impl ValidatorBehavior for BoundariesValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        let options = validator.options();
        validator
            .values(batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| match coerce_number(&v.to_json()).as_f64() {
                Some(n) => within(n, options.min, options.max),
                None => false,
            })
    }
}

/// Slug pattern, presence and uniqueness on one field
#[derive(Debug, Default)]
pub struct KeyFieldValidator;

impl ValidatorBehavior for KeyFieldValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        let values = validator.values(batch, ctx);
        let pattern_ok = key_regex().map_or(false, |re| all_match(&values, re));
        pattern_ok && all_present(&values) && all_distinct(&values)
    }
}

/// Slug of a model-describing record
#[derive(Debug, Default)]
pub struct ModelSlugValidator;

impl ValidatorBehavior for ModelSlugValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        let regex = match model_slug_regex() {
            Some(regex) => regex,
            None => return false,
        };
        validator
            .values(batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| match v.to_json() {
                Value::String(slug) => regex.is_match(&slug) && !RESERVED_SLUGS.contains(&slug.as_str()),
                _ => false,
            })
    }
}

/// `{ fields, validators }` body of a model-describing record
#[derive(Debug, Default)]
pub struct ModelDefinitionValidator;

impl ModelDefinitionValidator {
    fn check(value: &Value) -> bool {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => return false,
        };

        let fields: BTreeMap<String, FieldDefinition> = match obj.get("fields") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(fields) => fields,
                Err(_) => return false,
            },
        };
        let names_ok = key_regex().map_or(false, |re| fields.keys().all(|name| re.is_match(name)));
        if !names_ok {
            return false;
        }

        let validators: Vec<ValidatorDefinition> = match obj.get("validators") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(validators) => validators,
                Err(_) => return false,
            },
        };
        let system = system_fields();
        validators.iter().all(|def| {
            let root = def.options.field.split(['.', '[']).next().unwrap_or_default();
            fields.contains_key(root) || system.contains_key(root)
        })
    }
}

impl ValidatorBehavior for ModelDefinitionValidator {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool {
        validator
            .values(batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| Self::check(&v.to_json()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(raw: &[Value]) -> Vec<FieldValue> {
        raw.iter().cloned().map(FieldValue::Json).collect()
    }

    #[test]
    fn test_presence() {
        assert!(all_present(&values(&[json!("x"), json!(0)])));
        assert!(!all_present(&values(&[json!("x"), json!("")])));
        assert!(!all_present(&[FieldValue::Undefined]));
    }

    #[test]
    fn test_distinct_ignores_empty() {
        assert!(all_distinct(&values(&[json!("a"), json!("b"), json!(null), json!(null)])));
        assert!(!all_distinct(&values(&[json!("a"), json!("a")])));
        // number and string forms are different values
        assert!(all_distinct(&values(&[json!(1), json!("1")])));
    }

    #[test]
    fn test_compile_pattern_flags() {
        let regex = compile_pattern("^abc$", Some("gi")).unwrap();
        assert!(regex.is_match("ABC"));
        assert!(compile_pattern("(", None).is_err());
    }

    #[test]
    fn test_model_definition_check() {
        assert!(ModelDefinitionValidator::check(&json!({
            "fields": {"title": {"type": "text"}},
            "validators": [{"type": "required", "options": {"field": "title"}}]
        })));
        assert!(!ModelDefinitionValidator::check(&json!({
            "fields": {"title": {"type": "text"}},
            "validators": [{"type": "required", "options": {"field": "missing"}}]
        })));
        assert!(!ModelDefinitionValidator::check(&json!({
            "fields": {"bad name": {"type": "text"}}
        })));
        assert!(!ModelDefinitionValidator::check(&json!("not an object")));
    }
}
