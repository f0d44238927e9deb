//! Row filters
//!
//! Filters have the shape `{key, comparator, value}` and are combined with
//! logical AND.

use crate::store::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Comparison applied by a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    /// Column equals value (a `null` value matches NULL / missing columns)
    Eq,
    /// Column differs from value
    Ne,
}

/// A single column predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Column name
    pub key: String,
    /// Comparison
    pub comparator: Comparator,
    /// Value compared against
    pub value: Value,
}

impl Filter {
    /// `key == value`
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            comparator: Comparator::Eq,
            value: value.into(),
        }
    }

    /// `key != value`
    pub fn ne(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            comparator: Comparator::Ne,
            value: value.into(),
        }
    }

    /// `key IS NULL`
    pub fn is_null(key: impl Into<String>) -> Self {
        Self::eq(key, Value::Null)
    }

    /// Evaluate the predicate against a row
    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(&self.key).unwrap_or(&Value::Null);
        match self.comparator {
            Comparator::Eq => actual == &self.value,
            Comparator::Ne => actual != &self.value,
        }
    }

    /// The value rendered as a query parameter, if it has a scalar form
    pub fn value_as_param(&self) -> Option<String> {
        match &self.value {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.comparator {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        };
        write!(f, "{} {} {}", self.key, op, self.value)
    }
}

/// True when every filter matches the row
pub fn matches_all(filters: &[Filter], row: &Row) -> bool {
    filters.iter().all(|f| f.matches(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_eq_and_ne() {
        let r = row(json!({"site_id": "pod-1", "service_type": "neutron"}));
        assert!(Filter::eq("site_id", "pod-1").matches(&r));
        assert!(!Filter::eq("site_id", "pod-2").matches(&r));
        assert!(Filter::ne("site_id", "pod-2").matches(&r));
        assert!(!Filter::ne("service_type", "neutron").matches(&r));
    }

    #[test]
    fn test_null_matches_missing_and_null_columns() {
        let r = row(json!({"top_id": "t1", "bottom_id": null}));
        assert!(Filter::is_null("bottom_id").matches(&r));
        assert!(Filter::is_null("not_a_column").matches(&r));
        assert!(!Filter::is_null("top_id").matches(&r));
    }

    #[test]
    fn test_matches_all_is_conjunction() {
        let r = row(json!({"a": 1, "b": "x"}));
        assert!(matches_all(&[], &r));
        assert!(matches_all(&[Filter::eq("a", 1), Filter::eq("b", "x")], &r));
        assert!(!matches_all(&[Filter::eq("a", 1), Filter::eq("b", "y")], &r));
    }

    #[test]
    fn test_filter_wire_shape() {
        let f: Filter = serde_json::from_value(json!({
            "key": "name", "comparator": "eq", "value": "private"
        }))
        .unwrap();
        assert_eq!(f, Filter::eq("name", "private"));
        assert_eq!(f.value_as_param().as_deref(), Some("private"));
    }
}
