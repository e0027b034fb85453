use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

/// Default session lifetime: seven days.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

/// Claims carried by one signed session token. Derived per request; never
/// persisted server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "sub")]
    pub subject: String,
    pub role: Role,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SessionClaims {
    pub fn new(subject: impl Into<String>, role: Role, ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            subject: subject.into(),
            role,
            issued_at: now,
            expires_at: now + ttl_secs,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// Sign claims into a compact `header.claims.signature` token.
///
/// Returns `None` only when the MAC cannot be initialized, which HMAC-SHA256
/// never does for any key length.
pub fn sign_token(claims: &SessionClaims, secret: &str) -> Option<String> {
    let header = URL_SAFE_NO_PAD.encode(TOKEN_HEADER);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).ok()?);
    let signing_input = format!("{header}.{body}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Some(format!("{signing_input}.{signature}"))
}

/// Verify a compact token: shape, signature, and expiry. Any failure yields
/// `None`; no distinction is surfaced to callers.
pub fn verify_token(token: &str, secret: &str) -> Option<SessionClaims> {
    let mut parts = token.split('.');
    let header = parts.next()?;
    let body = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{header}.{body}").as_bytes());
    let decoded_signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
    mac.verify_slice(&decoded_signature).ok()?;

    let claims: SessionClaims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(body).ok()?).ok()?;
    if claims.expires_at <= Utc::now().timestamp() {
        return None;
    }

    Some(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn signed_tokens_verify_and_round_trip_claims() {
        let claims = SessionClaims::new("alex@example.com", Role::Admin, DEFAULT_SESSION_TTL_SECS);
        let token = sign_token(&claims, SECRET).unwrap();

        let verified = verify_token(&token, SECRET).unwrap();
        assert_eq!(verified, claims);
        assert!(verified.is_admin());
    }

    #[test]
    fn a_tampered_body_is_rejected() {
        let claims = SessionClaims::new("member@example.com", Role::Member, DEFAULT_SESSION_TTL_SECS);
        let token = sign_token(&claims, SECRET).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_claims = SessionClaims::new("member@example.com", Role::Admin, DEFAULT_SESSION_TTL_SECS);
        let forged_body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        parts[1] = &forged_body;
        let forged = parts.join(".");

        assert!(verify_token(&forged, SECRET).is_none());
    }

    #[test]
    fn the_wrong_secret_is_rejected() {
        let claims = SessionClaims::new("member@example.com", Role::Member, DEFAULT_SESSION_TTL_SECS);
        let token = sign_token(&claims, SECRET).unwrap();
        assert!(verify_token(&token, "other-secret").is_none());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut claims = SessionClaims::new("member@example.com", Role::Member, 0);
        claims.expires_at = claims.issued_at - 10;
        let token = sign_token(&claims, SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_none());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(verify_token("", SECRET).is_none());
        assert!(verify_token("only.two", SECRET).is_none());
        assert!(verify_token("a.b.c.d", SECRET).is_none());
        assert!(verify_token("not base64.!!!.???", SECRET).is_none());
    }
}
