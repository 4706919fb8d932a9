use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("could not rewrite map: key = {key:?} is not an object")]
    NotAnObject { key: String },
    #[error("could not rewrite array map: key = {key:?} is not an array")]
    NotAnArray { key: String },
    #[error("could not rewrite array map: key = {key:?} is not an object")]
    ElementNotObject { key: String },
    #[error("could not rewrite array map: len(actual)={actual} != len(overwrite)={expected}: key = {key:?}")]
    LengthMismatch {
        key: String,
        actual: usize,
        expected: usize,
    },
    #[error("field overwrite must be a JSON object, got {0}")]
    NotAnOverwrite(&'static str),
}

/// How a single field is overwritten.
#[derive(Debug, Clone, PartialEq)]
pub enum Overwrite {
    /// Replace the field, whatever its current type.
    Value(Value),
    /// Recurse into an object field.
    Object(FieldOverwrite),
    /// Recurse into each element of an array-of-objects field, by index.
    Array(Vec<FieldOverwrite>),
}

/// A declarative patch applied to a decoded JSON object before comparison.
///
/// Only keys already present in the target are touched, so one overwrite can be
/// shared by responses where a field is sometimes absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOverwrite {
    fields: BTreeMap<String, Overwrite>,
}

impl FieldOverwrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(key.into(), Overwrite::Value(value.into()));
        self
    }

    pub fn nested(mut self, key: impl Into<String>, overwrite: FieldOverwrite) -> Self {
        self.fields.insert(key.into(), Overwrite::Object(overwrite));
        self
    }

    pub fn each(
        mut self,
        key: impl Into<String>,
        items: impl IntoIterator<Item = FieldOverwrite>,
    ) -> Self {
        self.fields
            .insert(key.into(), Overwrite::Array(items.into_iter().collect()));
        self
    }

    /// Build an overwrite from a JSON object.
    ///
    /// Object values recurse; everything else, arrays included, is a literal
    /// replacement. Per-element array overwrites are built with
    /// [`FieldOverwrite::each`].
    pub fn from_json(value: Value) -> Result<Self, RewriteError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(RewriteError::NotAnOverwrite(kind(&other))),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .map(|(key, value)| {
                let overwrite = match value {
                    Value::Object(nested) => Overwrite::Object(Self::from_map(nested)),
                    literal => Overwrite::Value(literal),
                };
                (key, overwrite)
            })
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Overwrite> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Overwrite)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<Value> for FieldOverwrite {
    type Error = RewriteError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

/// Overwrite the fields of `target` named by `overwrite`, in place.
pub fn rewrite(target: &mut Map<String, Value>, overwrite: &FieldOverwrite) -> Result<(), RewriteError> {
    rewrite_map(target, overwrite, &[])
}

fn rewrite_map(
    target: &mut Map<String, Value>,
    overwrite: &FieldOverwrite,
    parents: &[String],
) -> Result<(), RewriteError> {
    for (key, patch) in &overwrite.fields {
        let Some(current) = target.get_mut(key) else {
            continue;
        };
        match patch {
            Overwrite::Object(nested) => {
                let Value::Object(sub) = current else {
                    return Err(RewriteError::NotAnObject {
                        key: key_path(parents, key),
                    });
                };
                rewrite_map(sub, nested, &child_path(parents, key))?;
            }
            Overwrite::Array(items) => {
                let Value::Array(elements) = current else {
                    return Err(RewriteError::NotAnArray {
                        key: key_path(parents, key),
                    });
                };
                if elements.len() != items.len() {
                    return Err(RewriteError::LengthMismatch {
                        key: key_path(parents, key),
                        actual: elements.len(),
                        expected: items.len(),
                    });
                }
                for (index, (element, item)) in elements.iter_mut().zip(items).enumerate() {
                    let indexed = format!("{key}#{index}");
                    let Value::Object(sub) = element else {
                        return Err(RewriteError::ElementNotObject {
                            key: key_path(parents, &indexed),
                        });
                    };
                    rewrite_map(sub, item, &child_path(parents, &indexed))?;
                }
            }
            Overwrite::Value(value) => *current = value.clone(),
        }
    }
    Ok(())
}

fn child_path(parents: &[String], key: &str) -> Vec<String> {
    let mut path = parents.to_vec();
    path.push(key.to_string());
    path
}

fn key_path(parents: &[String], key: &str) -> String {
    child_path(parents, key).join(".")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn literal_overwrite_replaces_regardless_of_type() {
        let mut target = object(json!({"id": 1, "created_time": 1_700_000_000, "token": null}));
        let overwrite = FieldOverwrite::new()
            .set("created_time", 1677136520)
            .set("token", "<token>");

        rewrite(&mut target, &overwrite).unwrap();

        assert_eq!(
            Value::Object(target),
            json!({"id": 1, "created_time": 1677136520, "token": "<token>"})
        );
    }

    #[test]
    fn absent_keys_leave_target_unchanged() {
        let original = object(json!({"id": 1, "meta": {"etag": "abc"}}));
        let mut target = original.clone();
        let overwrite = FieldOverwrite::new()
            .set("created_time", 0)
            .nested("owner", FieldOverwrite::new().set("id", 0))
            .each("items", [FieldOverwrite::new().set("id", 0)]);

        rewrite(&mut target, &overwrite).unwrap();

        assert_eq!(target, original);
    }

    #[test]
    fn nested_objects_only_touch_named_fields() {
        let mut target = object(json!({
            "user": {"name": "JoJo", "updated_at": "2024-01-01T00:00:00Z"},
            "updated_at": "2024-01-01T00:00:00Z"
        }));
        let overwrite =
            FieldOverwrite::new().nested("user", FieldOverwrite::new().set("updated_at", "<ts>"));

        rewrite(&mut target, &overwrite).unwrap();

        assert_eq!(
            Value::Object(target),
            json!({
                "user": {"name": "JoJo", "updated_at": "<ts>"},
                "updated_at": "2024-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn arrays_of_objects_match_by_index() {
        let mut target = object(json!({
            "items": [
                {"id": 10, "created_at": 111},
                {"id": 11, "created_at": 222}
            ]
        }));
        let overwrite = FieldOverwrite::new().each(
            "items",
            [
                FieldOverwrite::new().set("created_at", 0),
                FieldOverwrite::new().set("id", 99).set("created_at", 1),
            ],
        );

        rewrite(&mut target, &overwrite).unwrap();

        assert_eq!(
            Value::Object(target),
            json!({
                "items": [
                    {"id": 10, "created_at": 0},
                    {"id": 99, "created_at": 1}
                ]
            })
        );
    }

    #[test]
    fn array_length_mismatch_is_fatal() {
        let original = object(json!({"items": [{"id": 1}, {"id": 2}, {"id": 3}]}));
        let mut target = original.clone();
        let overwrite = FieldOverwrite::new().each(
            "items",
            [FieldOverwrite::new().set("id", 0), FieldOverwrite::new().set("id", 0)],
        );

        let err = rewrite(&mut target, &overwrite).unwrap_err();

        assert_eq!(
            err,
            RewriteError::LengthMismatch {
                key: "items".into(),
                actual: 3,
                expected: 2,
            }
        );
        assert_eq!(target, original);
    }

    #[test]
    fn shape_mismatches_report_key_path() {
        let mut target = object(json!({"user": {"tags": "none", "posts": [{"id": 1}, 7]}}));

        let err = rewrite(
            &mut target,
            &FieldOverwrite::new().nested(
                "user",
                FieldOverwrite::new().nested("tags", FieldOverwrite::new().set("x", 1)),
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RewriteError::NotAnObject {
                key: "user.tags".into()
            }
        );

        let err = rewrite(
            &mut target,
            &FieldOverwrite::new().nested(
                "user",
                FieldOverwrite::new().each("tags", [FieldOverwrite::new()]),
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RewriteError::NotAnArray {
                key: "user.tags".into()
            }
        );

        let err = rewrite(
            &mut target,
            &FieldOverwrite::new().nested(
                "user",
                FieldOverwrite::new().each(
                    "posts",
                    [FieldOverwrite::new().set("id", 0), FieldOverwrite::new()],
                ),
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RewriteError::ElementNotObject {
                key: "user.posts#1".into()
            }
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let overwrite = FieldOverwrite::from_json(json!({
            "created_time": 1677136520,
            "owner": {"id": "<id>"},
            "items": [{"at": 0}, {"at": 0}]
        }))
        .unwrap();
        let mut once = object(json!({
            "created_time": 5,
            "owner": {"id": "u-1", "name": "JoJo"},
            "items": [{"at": 1}, {"at": 2, "keep": true}]
        }));
        rewrite(&mut once, &overwrite).unwrap();
        let mut twice = once.clone();
        rewrite(&mut twice, &overwrite).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn from_json_classifies_values() {
        let overwrite = FieldOverwrite::from_json(json!({
            "a": 1,
            "b": {"c": 2},
            "d": [{"e": 3}],
            "f": [1, 2],
            "g": []
        }))
        .unwrap();

        assert_eq!(overwrite.get("a"), Some(&Overwrite::Value(json!(1))));
        assert_eq!(
            overwrite.get("b"),
            Some(&Overwrite::Object(FieldOverwrite::new().set("c", 2)))
        );
        assert_eq!(overwrite.get("d"), Some(&Overwrite::Value(json!([{"e": 3}]))));
        assert_eq!(overwrite.get("f"), Some(&Overwrite::Value(json!([1, 2]))));
        assert_eq!(overwrite.get("g"), Some(&Overwrite::Value(json!([]))));
        assert_eq!(overwrite.len(), 5);
        assert!(!overwrite.is_empty());
        assert_eq!(
            overwrite.iter().map(|(key, _)| key).collect::<Vec<_>>(),
            ["a", "b", "d", "f", "g"]
        );
        assert!(FieldOverwrite::from_json(json!({})).unwrap().is_empty());
    }

    #[test]
    fn array_of_objects_from_json_replaces_the_whole_array() {
        let mut target = object(json!({"items": [{"id": 1, "at": 10}, {"id": 2, "at": 20}]}));
        let overwrite = FieldOverwrite::from_json(json!({"items": [{"id": 9}]})).unwrap();
        rewrite(&mut target, &overwrite).unwrap();
        assert_eq!(Value::Object(target), json!({"items": [{"id": 9}]}));

        assert_eq!(
            FieldOverwrite::try_from(json!([1])).unwrap_err(),
            RewriteError::NotAnOverwrite("an array")
        );
    }
}
