//! Double-submit cookie protection for admin forms.
//!
//! A form page sets a random token in an `HttpOnly`, `SameSite=Strict`
//! cookie and echoes it in a hidden `_token` field. A submission is accepted
//! only if both copies are present and equal.

use axum::http::{header, HeaderMap, HeaderValue};

use subtle::ConstantTimeEq;

use crate::security::random_secret;

pub const COOKIE_NAME: &str = "csrf_token";
pub const FIELD_NAME: &str = "_token";
const TOKEN_LEN: usize = 40;

pub fn new_token() -> String {
    random_secret(TOKEN_LEN)
}

/// `Set-Cookie` value carrying `token`, scoped to the admin pages.
pub fn cookie(token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/admin; HttpOnly; SameSite=Strict",
        COOKIE_NAME, token
    ))
    .ok()
}

/// Token stored in the request's cookie, if any.
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Whether the submitted field matches the cookie.
pub fn verify(headers: &HeaderMap, submitted: Option<&str>) -> bool {
    match (cookie_token(headers), submitted) {
        (Some(expected), Some(submitted)) if !submitted.is_empty() => {
            expected.as_bytes().ct_eq(submitted.as_bytes()).into()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(raw).unwrap());
        headers
    }

    #[test]
    fn finds_token_among_other_cookies() {
        let headers = headers_with_cookie("theme=dark; csrf_token=abc123; lang=id");
        assert_eq!(cookie_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn verify_requires_matching_pair() {
        let headers = headers_with_cookie("csrf_token=abc123");
        assert!(verify(&headers, Some("abc123")));
        assert!(!verify(&headers, Some("abc124")));
        assert!(!verify(&headers, Some("")));
        assert!(!verify(&headers, None));
        assert!(!verify(&HeaderMap::new(), Some("abc123")));
    }

    #[test]
    fn cookie_is_scoped_and_http_only() {
        let value = cookie("tok").unwrap();
        let text = value.to_str().unwrap();
        assert!(text.starts_with("csrf_token=tok;"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("SameSite=Strict"));
    }
}
