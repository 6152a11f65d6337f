//! Path resolution
//!
//! Turns a dotted/bracketed path (`items.[].title`, `items[2]`, `meta.a.b`)
//! into the chain of fields it traverses. Resolution is purely schema-driven:
//! a `None` at position *i* means the schema cannot answer beyond that point,
//! and every later position is `None` as well.
//!
//! Arrays of nested objects may be addressed without an explicit `[]`
//! (`items.title`); the resolver inserts the implicit wildcard item, so the
//! returned chain is aligned with the normalized path.

pub mod traversal;

use crate::field::Field;
use crate::schema::{FieldType, Model};

pub use traversal::{get_value, set_value};

/// One step of a resolved path
#[derive(Debug, Clone)]
pub struct FieldPathItem {
    pub key: String,
    pub field: Field,
}

impl FieldPathItem {
    pub fn new(key: impl Into<String>, field: Field) -> Self {
        Self {
            key: key.into(),
            field,
        }
    }
}

/// Classified path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Key(&'a str),
    Index(usize),
    Wildcard,
}

/// Classifies one segment
pub fn parse_segment(segment: &str) -> Segment<'_> {
    match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some("") => Segment::Wildcard,
        Some(inner) => match inner.parse::<usize>() {
            Ok(i) => Segment::Index(i),
            Err(_) => Segment::Key(segment),
        },
        None => Segment::Key(segment),
    }
}

/// Splits a path into segments; `a[1].b` and `a.[1].b` are equivalent
pub fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut bracket = String::from("[");
                for inner in chars.by_ref() {
                    bracket.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
                segments.push(bracket);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Resolves a path string against a model's root fields
pub fn resolve_path(model: &Model, path: &str) -> Vec<Option<FieldPathItem>> {
    resolve_segments(model, &split_path(path))
}

/// Resolves pre-split segments against a model's root fields
pub fn resolve_segments(model: &Model, segments: &[String]) -> Vec<Option<FieldPathItem>> {
    let (first, rest) = match segments.split_first() {
        Some(parts) => parts,
        None => return Vec::new(),
    };

    let root = match parse_segment(first) {
        Segment::Key(key) => model.field(key),
        _ => None,
    };

    match root {
        Some(field) => {
            let mut items = vec![Some(FieldPathItem::new(first.clone(), field.clone()))];
            items.extend(resolve_from(&field, rest));
            items
        }
        None => vec![None; segments.len()],
    }
}

/// Resolves the remaining segments starting from an already-resolved field
pub fn resolve_from(start: &Field, segments: &[String]) -> Vec<Option<FieldPathItem>> {
    let mut items = Vec::with_capacity(segments.len());
    let mut previous = Some(start.clone());

    for segment in segments {
        let resolved = previous.as_ref().and_then(|field| step(field, segment));
        match resolved {
            Some(step_items) => {
                previous = step_items.last().map(|item| item.field.clone());
                items.extend(step_items.into_iter().map(Some));
            }
            None => {
                previous = None;
                items.push(None);
            }
        }
    }

    items
}

/// One fold step; may yield two items when an implicit `[]` is inserted
fn step(previous: &Field, segment: &str) -> Option<Vec<FieldPathItem>> {
    match (previous.field_type(), parse_segment(segment)) {
        (FieldType::Array, Segment::Index(i)) => {
            let item = previous.item_field(Some(i))?;
            Some(vec![FieldPathItem::new(format!("[{}]", i), item)])
        }
        (FieldType::Array, Segment::Wildcard) => {
            let item = previous.item_field(None)?;
            Some(vec![FieldPathItem::new("[]", item)])
        }
        (FieldType::Array, Segment::Key(key)) => {
            let item = previous.item_field(None)?;
            let sub = item.nested_field(key)?;
            Some(vec![FieldPathItem::new("[]", item), FieldPathItem::new(key, sub)])
        }
        (FieldType::Nested, Segment::Key(key)) => {
            let sub = previous.nested_field(key)?;
            Some(vec![FieldPathItem::new(key, sub)])
        }
        _ => None,
    }
}

/// Collapses a resolution into a complete chain, `None` if any step failed
pub fn complete(items: Vec<Option<FieldPathItem>>) -> Option<Vec<FieldPathItem>> {
    items.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(split_path("a[1].b"), vec!["a", "[1]", "b"]);
        assert_eq!(split_path("a.[].b"), vec!["a", "[]", "b"]);
        assert_eq!(split_path("a[][2]"), vec!["a", "[]", "[2]"]);
        assert!(split_path("").is_empty());
    }

    #[test]
    fn test_parse_segment() {
        assert_eq!(parse_segment("[]"), Segment::Wildcard);
        assert_eq!(parse_segment("[3]"), Segment::Index(3));
        assert_eq!(parse_segment("title"), Segment::Key("title"));
        assert_eq!(parse_segment("[x]"), Segment::Key("[x]"));
    }
}
