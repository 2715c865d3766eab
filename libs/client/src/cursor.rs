//! Opaque continuation tokens for paginated tool responses.
//!
//! A token is base64 over the JSON form of `{page, limit}`. The codec is
//! pure and stateless, so a token minted by one server process decodes in
//! any other as long as the scheme is unchanged. Anything not produced by
//! [`PageCursor::encode`] is rejected outright; there is no partial
//! acceptance.

use crate::error::ClientError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Pagination state carried inside a continuation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageCursor {
    /// 1-based page index.
    pub page: u64,
    /// Caller-facing page size.
    pub limit: u64,
}

impl PageCursor {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    /// Cursor for the page after this one, same limit.
    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            limit: self.limit,
        }
    }

    /// Zero-based offset of the first record on this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit) as usize
    }

    /// Serialize to an opaque token.
    pub fn encode(&self) -> String {
        // Serialization of two u64 fields cannot fail.
        let json = serde_json::to_vec(self).expect("cursor serialization");
        BASE64.encode(json)
    }

    /// Decode and validate a token.
    ///
    /// Fails with [`ClientError::InvalidCursor`] on anything that is not
    /// valid base64 over exactly `{"page": n, "limit": m}` with both fields
    /// positive.
    pub fn decode(token: &str) -> Result<Self, ClientError> {
        let bytes = BASE64
            .decode(token.trim())
            .map_err(|_| ClientError::InvalidCursor("not valid base64".into()))?;
        let cursor: PageCursor = serde_json::from_slice(&bytes)
            .map_err(|_| ClientError::InvalidCursor("unrecognized token payload".into()))?;
        if cursor.page < 1 || cursor.limit < 1 {
            return Err(ClientError::InvalidCursor(
                "page and limit must be positive".into(),
            ));
        }
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for (page, limit) in [(1, 1), (1, 50), (7, 25), (1000, 500), (u64::MAX / 2, 1)] {
            let cursor = PageCursor::new(page, limit);
            let token = cursor.encode();
            assert_eq!(PageCursor::decode(&token).unwrap(), cursor);
        }
    }

    #[test]
    fn test_next_advances_page_only() {
        let cursor = PageCursor::new(3, 25);
        assert_eq!(cursor.next(), PageCursor::new(4, 25));
        assert_eq!(cursor.offset(), 50);
    }

    #[test]
    fn test_rejects_garbage() {
        for token in ["invalid-token-xyz", "", "!!!", "aGVsbG8"] {
            let err = PageCursor::decode(token).unwrap_err();
            assert!(
                matches!(err, ClientError::InvalidCursor(_)),
                "token {:?} produced {:?}",
                token,
                err
            );
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn test_rejects_valid_base64_wrong_shape() {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;

        let payloads = [
            r#"{"page":1}"#,                          // missing limit
            r#"{"limit":10}"#,                        // missing page
            r#"{"page":0,"limit":10}"#,               // zero page
            r#"{"page":1,"limit":0}"#,                // zero limit
            r#"{"page":-1,"limit":10}"#,              // negative
            r#"{"page":1,"limit":10,"extra":true}"#,  // foreign field
            r#"{"page":"1","limit":"10"}"#,           // wrong types
            r#"[1,10]"#,                              // wrong container
            r#""hello""#,                             // not an object
        ];
        for payload in payloads {
            let token = BASE64.encode(payload);
            assert!(
                matches!(
                    PageCursor::decode(&token),
                    Err(ClientError::InvalidCursor(_))
                ),
                "payload {:?} was accepted",
                payload
            );
        }
    }

    #[test]
    fn test_token_is_stable_across_instances() {
        // Same cursor, two encodes: identical text, no hidden state.
        let a = PageCursor::new(2, 100).encode();
        let b = PageCursor::new(2, 100).encode();
        assert_eq!(a, b);
    }
}
