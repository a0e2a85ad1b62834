//! Request limits of the standard search API.

/// Largest number of candidates one search may fetch from the vector store.
pub const MAX_TOPK: usize = 1000;

/// Longest accepted query, in characters.
pub const MAX_QUERY_LENGTH: usize = 1000;

/// Most filter conditions one request may carry, summed over all groups.
pub const MAX_FILTERS: usize = 50;

/// Page size when a request gives none.
pub const DEFAULT_LIMIT: usize = 10;

/// Largest accepted request body, in bytes.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Over-fetch multiplier when results are filtered after the store query.
pub const FILTERED_FETCH_MULTIPLIER: usize = 3;

/// Over-fetch multiplier for unfiltered queries.
pub const DEFAULT_FETCH_MULTIPLIER: usize = 2;
