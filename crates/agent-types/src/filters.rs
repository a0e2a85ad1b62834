//! Standard search filters.
//!
//! The v1 search API accepts five operator groups, each keyed by a metadata
//! field name. All present groups are ANDed:
//!
//! ```json
//! {
//!   "equals":    { "chainId": 84532 },
//!   "in":        { "tags": ["defi", "trading"] },
//!   "notIn":     { "owner": ["0xdead..."] },
//!   "exists":    ["mcpEndpoint"],
//!   "notExists": ["deprecatedAt"]
//! }
//! ```
//!
//! Internally the groups are flattened into [`FilterClause`], a closed union
//! that the search layer translates per target store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed scalar filter operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FilterValue {
    /// Check whether a stored metadata value satisfies equality with this operand.
    ///
    /// Array-valued metadata matches when any element matches, so
    /// `equals.tags = "defi"` selects agents tagged `defi`.
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::Array(items) => items.iter().any(|item| self.matches_scalar(item)),
            other => self.matches_scalar(other),
        }
    }

    fn matches_scalar(&self, value: &Value) -> bool {
        match (self, value) {
            (FilterValue::Bool(b), Value::Bool(v)) => b == v,
            (FilterValue::Integer(i), Value::Number(n)) => match n.as_i64() {
                Some(v) => v == *i,
                None => n.as_f64() == Some(*i as f64),
            },
            (FilterValue::Float(f), Value::Number(n)) => n.as_f64() == Some(*f),
            (FilterValue::Text(s), Value::String(v)) => s == v,
            _ => false,
        }
    }

    /// Convert to a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            FilterValue::Bool(b) => Value::Bool(*b),
            FilterValue::Integer(i) => Value::from(*i),
            FilterValue::Float(f) => Value::from(*f),
            FilterValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Integer(v)
    }
}

impl From<u64> for FilterValue {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(FilterValue::Integer)
            .unwrap_or(FilterValue::Float(v as f64))
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

/// One flattened filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    Equals { field: String, value: FilterValue },
    In { field: String, values: Vec<FilterValue> },
    NotIn { field: String, values: Vec<FilterValue> },
    Exists { field: String },
    NotExists { field: String },
}

impl FilterClause {
    pub fn field(&self) -> &str {
        match self {
            FilterClause::Equals { field, .. }
            | FilterClause::In { field, .. }
            | FilterClause::NotIn { field, .. }
            | FilterClause::Exists { field }
            | FilterClause::NotExists { field } => field,
        }
    }
}

/// The five-operator filter language of the v1 search API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardFilters {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub equals: BTreeMap<String, FilterValue>,

    #[serde(default, rename = "in", skip_serializing_if = "BTreeMap::is_empty")]
    pub in_values: BTreeMap<String, Vec<FilterValue>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub not_in: BTreeMap<String, Vec<FilterValue>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exists: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_exists: Vec<String>,
}

impl StandardFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equals(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    pub fn with_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        self.in_values
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_not_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        self.not_in
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exists(mut self, field: impl Into<String>) -> Self {
        self.exists.push(field.into());
        self
    }

    pub fn with_not_exists(mut self, field: impl Into<String>) -> Self {
        self.not_exists.push(field.into());
        self
    }

    /// True when no group carries a condition.
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
            && self.in_values.is_empty()
            && self.not_in.is_empty()
            && self.exists.is_empty()
            && self.not_exists.is_empty()
    }

    /// Total number of conditions across all groups.
    pub fn condition_count(&self) -> usize {
        self.equals.len()
            + self.in_values.len()
            + self.not_in.len()
            + self.exists.len()
            + self.not_exists.len()
    }

    /// Flatten the groups into clauses in a fixed group order.
    ///
    /// Empty `in`/`notIn` lists carry no condition and are dropped.
    pub fn clauses(&self) -> Vec<FilterClause> {
        let mut clauses = Vec::with_capacity(self.condition_count());

        for (field, value) in &self.equals {
            clauses.push(FilterClause::Equals {
                field: field.clone(),
                value: value.clone(),
            });
        }
        for (field, values) in &self.in_values {
            if !values.is_empty() {
                clauses.push(FilterClause::In {
                    field: field.clone(),
                    values: values.clone(),
                });
            }
        }
        for (field, values) in &self.not_in {
            if !values.is_empty() {
                clauses.push(FilterClause::NotIn {
                    field: field.clone(),
                    values: values.clone(),
                });
            }
        }
        for field in &self.exists {
            clauses.push(FilterClause::Exists {
                field: field.clone(),
            });
        }
        for field in &self.not_exists {
            clauses.push(FilterClause::NotExists {
                field: field.clone(),
            });
        }

        clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_all_groups() {
        let filters: StandardFilters = serde_json::from_value(json!({
            "equals": {"chainId": 84532, "active": true},
            "in": {"tags": ["defi", "trading"]},
            "notIn": {"owner": ["0xdead"]},
            "exists": ["mcpEndpoint"],
            "notExists": ["deprecatedAt"]
        }))
        .unwrap();

        assert_eq!(filters.equals["chainId"], FilterValue::Integer(84532));
        assert_eq!(filters.equals["active"], FilterValue::Bool(true));
        assert_eq!(filters.in_values["tags"].len(), 2);
        assert_eq!(filters.not_in["owner"], vec![FilterValue::from("0xdead")]);
        assert_eq!(filters.exists, vec!["mcpEndpoint"]);
        assert_eq!(filters.not_exists, vec!["deprecatedAt"]);
        assert_eq!(filters.condition_count(), 6);
    }

    #[test]
    fn test_clauses_skip_empty_lists() {
        let filters = StandardFilters::new()
            .with_in("chainId", Vec::<i64>::new())
            .with_equals("active", true);

        let clauses = filters.clauses();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].field(), "active");
    }

    #[test]
    fn test_value_matching() {
        assert!(FilterValue::Integer(84532).matches(&json!(84532)));
        assert!(FilterValue::Integer(1).matches(&json!(1.0)));
        assert!(FilterValue::Float(0.5).matches(&json!(0.5)));
        assert!(FilterValue::from("defi").matches(&json!(["nft", "defi"])));
        assert!(!FilterValue::from("84532").matches(&json!(84532)));
        assert!(!FilterValue::Bool(true).matches(&Value::Null));
    }

    #[test]
    fn test_serialize_skips_empty_groups() {
        let filters = StandardFilters::new().with_exists("mcpEndpoint");
        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(json, json!({"exists": ["mcpEndpoint"]}));
    }
}
