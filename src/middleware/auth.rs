use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use std::fmt;

use super::micropub_request::RequestBody;

/// Body field carrying the token when no `Authorization` header is sent.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";

/// Opaque credential presented by a Micropub client. The value never shows
/// up in `Debug` output, so it cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Extract the bearer token for a request.
///
/// Looks at:
/// 1) header: `Authorization: Bearer <token>`. A value that does not start
///    with `Bearer` is taken whole as the token.
/// 2) body: `access_token`, only when no usable `Authorization` header is
///    present.
pub fn extract_bearer(headers: &HeaderMap, body: &RequestBody) -> Option<BearerToken> {
    if let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return token_from_header(auth);
    }
    body.get_str(ACCESS_TOKEN_FIELD).map(BearerToken::new)
}

fn token_from_header(value: &str) -> Option<BearerToken> {
    let value = value.trim();
    let token = if value.starts_with("Bearer") {
        value.split_once(' ').map(|(_, token)| token.trim()).unwrap_or("")
    } else {
        value
    };
    (!token.is_empty()).then(|| BearerToken::new(token))
}
