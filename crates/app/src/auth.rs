use crate::routes::ApiError;
use axum::http::{header, HeaderMap};
use rag_relay_core::{verify_token, SessionClaims};

pub const SESSION_COOKIE: &str = "session";

/// Claims carried by the request's session cookie, if the cookie is present
/// and its token verifies.
pub fn claims_from_headers(headers: &HeaderMap, secret: &str) -> Option<SessionClaims> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            Some(value.to_string())
        } else {
            None
        }
    })?;
    verify_token(&token, secret)
}

pub fn require_admin(headers: &HeaderMap, secret: &str) -> Result<SessionClaims, ApiError> {
    match claims_from_headers(headers, secret) {
        Some(claims) if claims.is_admin() => Ok(claims),
        _ => Err(ApiError::unauthorized("admin only")),
    }
}
