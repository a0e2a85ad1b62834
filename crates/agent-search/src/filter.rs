//! Translation of standard filters into store-native filters.
//!
//! `equals`, `in` and `notIn` become a [`NativeFilter`] evaluated by the
//! vector store during the query. `exists` and `notExists` have no native
//! form and become a [`PostFilter`] applied to the store's matches.

use std::collections::HashMap;

use agent_types::{FilterClause, StandardFilters};
use agent_vector::NativeFilter;
use serde_json::{Map, Value};

/// A condition checked after the store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilterClause {
    /// Field is present and not null
    Exists(String),
    /// Field is absent or null
    NotExists(String),
}

/// Conjunction of post-filter clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilter {
    clauses: Vec<PostFilterClause>,
}

impl PostFilter {
    pub fn clauses(&self) -> &[PostFilterClause] {
        &self.clauses
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|clause| match clause {
            PostFilterClause::Exists(field) => is_present(metadata, field),
            PostFilterClause::NotExists(field) => !is_present(metadata, field),
        })
    }
}

fn is_present(metadata: &Map<String, Value>, field: &str) -> bool {
    !matches!(metadata.get(field), None | Some(Value::Null))
}

/// Result of translating a [`StandardFilters`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedFilters {
    pub native: Option<NativeFilter>,
    pub post_filter: Option<PostFilter>,
}

impl TransformedFilters {
    pub fn requires_post_filter(&self) -> bool {
        self.post_filter.is_some()
    }
}

/// Translates standard filters, renaming fields on the way.
///
/// Field names map to themselves unless a mapping is registered.
#[derive(Debug, Clone, Default)]
pub struct FilterTransformer {
    field_map: HashMap<String, String>,
}

impl FilterTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `field` under `target` in the vector store's metadata.
    pub fn with_field_mapping(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.field_map.insert(field.into(), target.into());
        self
    }

    pub fn map_field(&self, field: &str) -> String {
        self.field_map
            .get(field)
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }

    pub fn transform(&self, filters: &StandardFilters) -> TransformedFilters {
        let mut native = Vec::new();
        let mut post = Vec::new();

        for clause in filters.clauses() {
            match clause {
                FilterClause::Equals { field, value } => native.push(NativeFilter::Eq {
                    field: self.map_field(&field),
                    value,
                }),
                FilterClause::In { field, values } => native.push(NativeFilter::In {
                    field: self.map_field(&field),
                    values,
                }),
                FilterClause::NotIn { field, values } => native.push(NativeFilter::NotIn {
                    field: self.map_field(&field),
                    values,
                }),
                FilterClause::Exists { field } => {
                    post.push(PostFilterClause::Exists(self.map_field(&field)))
                }
                FilterClause::NotExists { field } => {
                    post.push(PostFilterClause::NotExists(self.map_field(&field)))
                }
            }
        }

        TransformedFilters {
            native: NativeFilter::all(native),
            post_filter: (!post.is_empty()).then_some(PostFilter { clauses: post }),
        }
    }
}
