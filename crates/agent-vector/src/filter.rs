//! Native filter expressions evaluated by the stores.

use agent_types::FilterValue;
use serde_json::{Map, Value};

/// A filter the vector store evaluates while searching.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeFilter {
    /// Field equals value (any element, for array fields)
    Eq { field: String, value: FilterValue },
    /// Field matches one of the values
    In {
        field: String,
        values: Vec<FilterValue>,
    },
    /// Field is absent or matches none of the values
    NotIn {
        field: String,
        values: Vec<FilterValue>,
    },
    /// All sub-filters match
    And(Vec<NativeFilter>),
}

impl NativeFilter {
    /// Combine filters with AND; `None` when there are none.
    pub fn all(mut filters: Vec<NativeFilter>) -> Option<NativeFilter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(NativeFilter::And(filters)),
        }
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        match self {
            NativeFilter::Eq { field, value } => metadata
                .get(field)
                .is_some_and(|stored| value.matches(stored)),
            NativeFilter::In { field, values } => metadata
                .get(field)
                .is_some_and(|stored| values.iter().any(|v| v.matches(stored))),
            NativeFilter::NotIn { field, values } => match metadata.get(field) {
                None | Some(Value::Null) => true,
                Some(stored) => !values.iter().any(|v| v.matches(stored)),
            },
            NativeFilter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_eq_and_in() {
        let m = meta(json!({"chainId": 84532, "tags": ["defi", "nft"]}));

        let eq = NativeFilter::Eq {
            field: "chainId".into(),
            value: 84532u64.into(),
        };
        assert!(eq.matches(&m));

        let tag_in = NativeFilter::In {
            field: "tags".into(),
            values: vec!["trading".into(), "defi".into()],
        };
        assert!(tag_in.matches(&m));

        let missing = NativeFilter::In {
            field: "owner".into(),
            values: vec!["0x1".into()],
        };
        assert!(!missing.matches(&m));
    }

    #[test]
    fn test_not_in_passes_missing_field() {
        let m = meta(json!({"chainId": 1}));
        let filter = NativeFilter::NotIn {
            field: "owner".into(),
            values: vec!["0xdead".into()],
        };
        assert!(filter.matches(&m));

        let excluded = NativeFilter::NotIn {
            field: "chainId".into(),
            values: vec![1i64.into()],
        };
        assert!(!excluded.matches(&m));
    }

    #[test]
    fn test_all_combinator() {
        assert!(NativeFilter::all(vec![]).is_none());

        let single = NativeFilter::Eq {
            field: "a".into(),
            value: true.into(),
        };
        assert_eq!(NativeFilter::all(vec![single.clone()]), Some(single.clone()));

        let both = NativeFilter::all(vec![
            single,
            NativeFilter::Eq {
                field: "b".into(),
                value: false.into(),
            },
        ])
        .unwrap();
        assert!(both.matches(&meta(json!({"a": true, "b": false}))));
        assert!(!both.matches(&meta(json!({"a": true, "b": true}))));
    }
}
