//! Fine-grained share attributes.
//!
//! Attributes are `(scope, key, value)` records, for example
//! `("permissions", "download", false)`. They are persisted in
//! `share.attributes` as a JSON array of three-element arrays.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attribute record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareAttribute {
    /// Attribute scope, such as `permissions`.
    pub scope: String,
    /// Key within the scope.
    pub key: String,
    /// Attribute value.
    pub value: Value,
}

/// Set of attributes keyed by `(scope, key)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareAttributes {
    entries: BTreeMap<(String, String), Value>,
}

impl ShareAttributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous value for the same scope and key.
    pub fn set(&mut self, scope: impl Into<String>, key: impl Into<String>, value: Value) -> &mut Self {
        self.entries.insert((scope.into(), key.into()), value);
        self
    }

    /// Look up an attribute value.
    pub fn get(&self, scope: &str, key: &str) -> Option<&Value> {
        self.entries.get(&(scope.to_string(), key.to_string()))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all records in `(scope, key)` order.
    pub fn iter(&self) -> impl Iterator<Item = ShareAttribute> + '_ {
        self.entries.iter().map(|((scope, key), value)| ShareAttribute {
            scope: scope.clone(),
            key: key.clone(),
            value: value.clone(),
        })
    }

    /// Encode for the `attributes` column. Empty sets are stored as `NULL`.
    pub fn to_json(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let triples: Vec<Value> = self
            .entries
            .iter()
            .map(|((scope, key), value)| {
                Value::Array(vec![
                    Value::String(scope.clone()),
                    Value::String(key.clone()),
                    value.clone(),
                ])
            })
            .collect();
        Some(Value::Array(triples).to_string())
    }

    /// Decode the `attributes` column.
    ///
    /// Returns `None` for `NULL`, malformed JSON or anything that is not a
    /// list of `[scope, key, value]` triples.
    pub fn from_json(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        let parsed: Vec<(String, String, Value)> = match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed share attributes");
                return None;
            }
        };
        let mut attributes = Self::new();
        for (scope, key, value) in parsed {
            attributes.set(scope, key, value);
        }
        Some(attributes)
    }
}

impl FromIterator<ShareAttribute> for ShareAttributes {
    fn from_iter<T: IntoIterator<Item = ShareAttribute>>(iter: T) -> Self {
        let mut attributes = Self::new();
        for attr in iter {
            attributes.set(attr.scope, attr.key, attr.value);
        }
        attributes
    }
}
