//! # agent-search
//!
//! Semantic agent search over an embedding provider and a vector store.
//!
//! ## Modules
//!
//! - [`filter`]: standard filters to native filters plus a post-filter
//! - [`pagination`]: cursor codec and offset/cursor pagination blocks
//! - [`validation`]: request checks with stable error codes
//! - [`manager`]: indexing and the legacy and v1 search flows

pub mod error;
pub mod filter;
pub mod limits;
pub mod manager;
pub mod pagination;
pub mod validation;

pub use error::SearchError;
pub use filter::{FilterTransformer, PostFilter, PostFilterClause, TransformedFilters};
pub use limits::{DEFAULT_LIMIT, MAX_FILTERS, MAX_QUERY_LENGTH, MAX_REQUEST_BYTES, MAX_TOPK};
pub use manager::{IndexReport, SemanticSearchManager, SkippedAgent};
pub use pagination::{
    calculate_cursor_pagination, calculate_offset_pagination, decode_cursor, encode_cursor,
    get_offset,
};
pub use validation::{
    check_body_size, max_offset, parse_request, validate_request, ValidationCode, ValidationError,
};
