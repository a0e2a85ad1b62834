//! Request validation for the standard search API.
//!
//! Everything here runs before any provider call. Each rejection carries a
//! stable machine code and the offending field.

use std::fmt;

use agent_types::{SortKey, StandardSearchRequest};
use serde::Serialize;
use thiserror::Error;

use crate::limits::{
    DEFAULT_LIMIT, FILTERED_FETCH_MULTIPLIER, MAX_FILTERS, MAX_QUERY_LENGTH, MAX_TOPK,
};
use crate::pagination::decode_cursor;

/// Machine-readable validation failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    InvalidRequest,
    InvalidQuery,
    QueryTooLong,
    InvalidLimit,
    InvalidOffset,
    InvalidCursor,
    InvalidMinScore,
    TooManyFilters,
    InvalidSort,
    RequestTooLarge,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::InvalidRequest => "INVALID_REQUEST",
            ValidationCode::InvalidQuery => "INVALID_QUERY",
            ValidationCode::QueryTooLong => "QUERY_TOO_LONG",
            ValidationCode::InvalidLimit => "INVALID_LIMIT",
            ValidationCode::InvalidOffset => "INVALID_OFFSET",
            ValidationCode::InvalidCursor => "INVALID_CURSOR",
            ValidationCode::InvalidMinScore => "INVALID_MIN_SCORE",
            ValidationCode::TooManyFilters => "TOO_MANY_FILTERS",
            ValidationCode::InvalidSort => "INVALID_SORT",
            ValidationCode::RequestTooLarge => "REQUEST_TOO_LARGE",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected search request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ValidationCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ValidationCode, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Largest offset a request with page size `limit` may start at.
pub fn max_offset(limit: usize) -> usize {
    MAX_TOPK.saturating_sub(limit.saturating_mul(FILTERED_FETCH_MULTIPLIER))
}

/// Reject bodies over `max_bytes`.
pub fn check_body_size(len: usize, max_bytes: usize) -> Result<(), ValidationError> {
    if len > max_bytes {
        return Err(ValidationError::new(
            ValidationCode::RequestTooLarge,
            None,
            format!("request body is {} bytes, limit is {}", len, max_bytes),
        ));
    }
    Ok(())
}

/// Parse and validate a raw request body.
pub fn parse_request(body: &[u8], max_bytes: usize) -> Result<StandardSearchRequest, ValidationError> {
    check_body_size(body.len(), max_bytes)?;
    let request: StandardSearchRequest = serde_json::from_slice(body).map_err(|e| {
        ValidationError::new(
            ValidationCode::InvalidRequest,
            None,
            format!("malformed request body: {}", e),
        )
    })?;
    validate_request(&request)?;
    Ok(request)
}

/// Check a parsed request against the API limits.
pub fn validate_request(request: &StandardSearchRequest) -> Result<(), ValidationError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ValidationError::new(
            ValidationCode::InvalidQuery,
            Some("query"),
            "query must be a non-empty string",
        ));
    }
    let query_len = query.chars().count();
    if query_len > MAX_QUERY_LENGTH {
        return Err(ValidationError::new(
            ValidationCode::QueryTooLong,
            Some("query"),
            format!(
                "query is {} characters, limit is {}",
                query_len, MAX_QUERY_LENGTH
            ),
        ));
    }

    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_TOPK {
        return Err(ValidationError::new(
            ValidationCode::InvalidLimit,
            Some("limit"),
            format!("limit must be between 1 and {}", MAX_TOPK),
        ));
    }

    let bound = max_offset(limit);
    if let Some(offset) = request.offset {
        if offset > bound {
            return Err(ValidationError::new(
                ValidationCode::InvalidOffset,
                Some("offset"),
                format!("offset must be at most {} for limit {}", bound, limit),
            ));
        }
    }

    if let Some(cursor) = request.cursor.as_deref() {
        let offset = decode_cursor(cursor).map_err(|e| {
            ValidationError::new(ValidationCode::InvalidCursor, Some("cursor"), e.to_string())
        })?;
        if offset > bound {
            return Err(ValidationError::new(
                ValidationCode::InvalidCursor,
                Some("cursor"),
                format!("cursor offset {} exceeds {} for limit {}", offset, bound, limit),
            ));
        }
    }

    if let Some(min_score) = request.min_score {
        if !min_score.is_finite() || !(0.0..=1.0).contains(&min_score) {
            return Err(ValidationError::new(
                ValidationCode::InvalidMinScore,
                Some("minScore"),
                "minScore must be between 0 and 1",
            ));
        }
    }

    if let Some(filters) = &request.filters {
        let count = filters.condition_count();
        if count > MAX_FILTERS {
            return Err(ValidationError::new(
                ValidationCode::TooManyFilters,
                Some("filters"),
                format!("{} filter conditions, limit is {}", count, MAX_FILTERS),
            ));
        }
    }

    for expr in &request.sort {
        SortKey::parse(expr).map_err(|e| {
            ValidationError::new(ValidationCode::InvalidSort, Some("sort"), e.to_string())
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::encode_cursor;
    use agent_types::StandardFilters;

    fn code(request: &StandardSearchRequest) -> ValidationCode {
        validate_request(request).unwrap_err().code
    }

    #[test]
    fn test_valid_request() {
        let request = StandardSearchRequest::new("defi trading bot")
            .with_limit(5)
            .with_min_score(0.2)
            .with_sort("score:desc");
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_query_rules() {
        assert_eq!(code(&StandardSearchRequest::new("   ")), ValidationCode::InvalidQuery);
        let long = "a".repeat(MAX_QUERY_LENGTH + 1);
        assert_eq!(code(&StandardSearchRequest::new(long)), ValidationCode::QueryTooLong);
        let max = "a".repeat(MAX_QUERY_LENGTH);
        assert!(validate_request(&StandardSearchRequest::new(max)).is_ok());
    }

    #[test]
    fn test_limit_bounds() {
        let q = || StandardSearchRequest::new("q");
        assert_eq!(code(&q().with_limit(0)), ValidationCode::InvalidLimit);
        assert_eq!(code(&q().with_limit(MAX_TOPK + 1)), ValidationCode::InvalidLimit);
        assert!(validate_request(&q().with_limit(MAX_TOPK)).is_ok());
    }

    #[test]
    fn test_offset_bound_depends_on_limit() {
        let q = || StandardSearchRequest::new("q").with_limit(10);
        assert!(validate_request(&q().with_offset(970)).is_ok());
        let err = validate_request(&q().with_offset(971)).unwrap_err();
        assert_eq!(err.code, ValidationCode::InvalidOffset);
        assert_eq!(err.field.as_deref(), Some("offset"));
    }

    #[test]
    fn test_cursor_rules() {
        let q = || StandardSearchRequest::new("q").with_limit(10);
        assert!(validate_request(&q().with_cursor(encode_cursor(20))).is_ok());
        assert_eq!(code(&q().with_cursor("garbage")), ValidationCode::InvalidCursor);
        assert_eq!(
            code(&q().with_cursor(encode_cursor(999))),
            ValidationCode::InvalidCursor
        );
    }

    #[test]
    fn test_min_score_range() {
        let q = || StandardSearchRequest::new("q");
        assert_eq!(code(&q().with_min_score(1.5)), ValidationCode::InvalidMinScore);
        assert_eq!(code(&q().with_min_score(-0.1)), ValidationCode::InvalidMinScore);
        assert_eq!(code(&q().with_min_score(f32::NAN)), ValidationCode::InvalidMinScore);
        assert!(validate_request(&q().with_min_score(0.0)).is_ok());
    }

    #[test]
    fn test_too_many_filters() {
        let mut filters = StandardFilters::new();
        for i in 0..=MAX_FILTERS {
            filters = filters.with_exists(format!("field{}", i));
        }
        let request = StandardSearchRequest::new("q").with_filters(filters);
        assert_eq!(code(&request), ValidationCode::TooManyFilters);
    }

    #[test]
    fn test_bad_sort() {
        let request = StandardSearchRequest::new("q").with_sort("name:up");
        assert_eq!(code(&request), ValidationCode::InvalidSort);
    }

    #[test]
    fn test_parse_request_body() {
        let body = br#"{"query":"defi","limit":5}"#;
        let request = parse_request(body, 1024).unwrap();
        assert_eq!(request.limit, Some(5));

        let err = parse_request(body, 8).unwrap_err();
        assert_eq!(err.code, ValidationCode::RequestTooLarge);

        let err = parse_request(b"{not json", 1024).unwrap_err();
        assert_eq!(err.code, ValidationCode::InvalidRequest);

        let err = parse_request(br#"{"query":""}"#, 1024).unwrap_err();
        assert_eq!(err.code, ValidationCode::InvalidQuery);
    }

    #[test]
    fn test_error_serializes_code() {
        let err = ValidationError::new(ValidationCode::InvalidLimit, Some("limit"), "bad");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_LIMIT");
        assert_eq!(json["field"], "limit");
        assert_eq!(err.to_string(), "INVALID_LIMIT: bad");
    }
}
