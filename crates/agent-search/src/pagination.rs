//! Offset and cursor pagination.
//!
//! A cursor is an opaque encoding of a global offset. Decoding accepts, in
//! order:
//!
//! 1. a bare integer string (`"20"`)
//! 2. a JSON object with `offset` or `_global_offset` (`{"offset":20}`)
//! 3. base64 of a JSON object with `offset`
//!
//! Encoding always produces the canonical form 2, `{"offset":n}`. Base64 is
//! only accepted from older clients.

use agent_types::PaginationInfo;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{json, Value};

use crate::error::SearchError;
use crate::validation::max_offset;

/// Encode a global offset as a cursor.
pub fn encode_cursor(offset: usize) -> String {
    json!({ "offset": offset }).to_string()
}

/// Decode a cursor to its global offset.
pub fn decode_cursor(cursor: &str) -> Result<usize, SearchError> {
    let trimmed = cursor.trim();

    if let Ok(offset) = trimmed.parse::<usize>() {
        return Ok(offset);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(offset) = offset_field(&value, &["offset", "_global_offset"]) {
            return Ok(offset);
        }
    }

    let decoded = STANDARD
        .decode(trimmed)
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed.trim_end_matches('=')));
    if let Ok(bytes) = decoded {
        if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
            if let Some(offset) = offset_field(&value, &["offset"]) {
                return Ok(offset);
            }
        }
    }

    Err(SearchError::InvalidCursor(format!(
        "'{}' does not encode a non-negative integer offset",
        cursor
    )))
}

fn offset_field(value: &Value, keys: &[&str]) -> Option<usize> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(as_offset)
}

fn as_offset(value: &Value) -> Option<usize> {
    if let Some(n) = value.as_u64() {
        return usize::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 {
        return Some(f as usize);
    }
    None
}

/// Effective offset: the cursor wins, then the raw offset, then 0.
pub fn get_offset(cursor: Option<&str>, offset: Option<usize>) -> Result<usize, SearchError> {
    match cursor {
        Some(c) => decode_cursor(c),
        None => Ok(offset.unwrap_or(0)),
    }
}

/// More results remain and the page starting at `next` would pass validation.
fn has_next_page(limit: usize, next: usize, total: usize) -> bool {
    next < total && next <= max_offset(limit)
}

/// Pagination block for a cursor-driven page.
pub fn calculate_cursor_pagination(
    limit: usize,
    cursor: Option<&str>,
    total: usize,
    returned: usize,
) -> Result<PaginationInfo, SearchError> {
    let start = match cursor {
        Some(c) => decode_cursor(c)?,
        None => 0,
    };
    let end = start + returned;
    let has_more = has_next_page(limit, end, total);

    Ok(PaginationInfo {
        has_more,
        next_cursor: has_more.then(|| encode_cursor(end)),
        limit,
        offset: None,
    })
}

/// Pagination block for an offset-driven page.
pub fn calculate_offset_pagination(
    limit: usize,
    offset: usize,
    total: usize,
    returned: usize,
) -> PaginationInfo {
    let end = offset + returned;
    let has_more = has_next_page(limit, end, total);

    PaginationInfo {
        has_more,
        next_cursor: has_more.then(|| encode_cursor(end)),
        limit,
        offset: Some(offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_forms() {
        assert_eq!(decode_cursor("20").unwrap(), 20);
        assert_eq!(decode_cursor(r#"{"offset":5}"#).unwrap(), 5);
        assert_eq!(decode_cursor(r#"{"_global_offset":7}"#).unwrap(), 7);
        assert_eq!(decode_cursor(r#"{"offset":3.0}"#).unwrap(), 3);
        assert_eq!(decode_cursor(&encode_cursor(40)).unwrap(), 40);
        assert_eq!(decode_cursor("eyJvZmZzZXQiOjEwfQ").unwrap(), 10);
    }

    #[test]
    fn test_decode_rejects_bad_cursors() {
        for bad in [
            "-1",
            "abc",
            r#"{"offset":-3}"#,
            r#"{"offset":1.5}"#,
            r#"{"page":2}"#,
            "",
        ] {
            assert!(
                matches!(decode_cursor(bad), Err(SearchError::InvalidCursor(_))),
                "cursor {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_encode_shape() {
        assert_eq!(encode_cursor(12), r#"{"offset":12}"#);
        assert_eq!(encode_cursor(0), r#"{"offset":0}"#);
    }

    #[test]
    fn test_decode_accepts_base64_from_older_clients() {
        let legacy = STANDARD.encode(r#"{"offset":40}"#);
        assert_eq!(decode_cursor(&legacy).unwrap(), 40);
    }

    #[test]
    fn test_get_offset_precedence() {
        assert_eq!(get_offset(Some("30"), Some(10)).unwrap(), 30);
        assert_eq!(get_offset(None, Some(10)).unwrap(), 10);
        assert_eq!(get_offset(None, None).unwrap(), 0);
        assert!(get_offset(Some("nope"), Some(10)).is_err());
    }

    #[test]
    fn test_cursor_pagination() {
        let page = calculate_cursor_pagination(10, Some(&encode_cursor(10)), 25, 10).unwrap();
        assert!(page.has_more);
        assert_eq!(decode_cursor(page.next_cursor.as_deref().unwrap()).unwrap(), 20);
        assert_eq!(page.offset, None);

        let last = calculate_cursor_pagination(10, Some("20"), 25, 5).unwrap();
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn test_no_next_cursor_past_offset_bound() {
        // limit 10 may start at most at offset 970
        let page = calculate_offset_pagination(10, 960, 1000, 10);
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some(r#"{"offset":970}"#));

        let page = calculate_offset_pagination(10, 970, 1000, 10);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());

        let page = calculate_cursor_pagination(10, Some("970"), 1000, 10).unwrap();
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_offset_pagination_matches_cursor_pagination() {
        for (offset, returned, total) in [(0, 10, 25), (10, 10, 25), (20, 5, 25), (30, 0, 25)] {
            let by_offset = calculate_offset_pagination(10, offset, total, returned);
            let by_cursor =
                calculate_cursor_pagination(10, Some(&encode_cursor(offset)), total, returned)
                    .unwrap();
            assert_eq!(by_offset.has_more, by_cursor.has_more);
            assert_eq!(by_offset.next_cursor, by_cursor.next_cursor);
        }
    }
}
