//! Identity verification for incoming requests
//!
//! A request's credential is taken from, in order: the `token` field of the
//! JSON body, an `Authorization: Bearer` header, or the `gsync_session`
//! cookie. The credential is an HS256 JWT carrying `sub` (user id) and
//! `email`.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap};
use gsync_core::api::SESSION_COOKIE;
use gsync_core::config::AuthConfig;
use gsync_core::{GsyncError, GsyncResult, UserIdentity};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Resolves a bearer credential to the user it belongs to.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> GsyncResult<UserIdentity>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl JwtVerifier {
    pub fn new(secret: &SecretString, auth: &AuthConfig) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = auth.leeway_secs;
        if let Some(iss) = &auth.issuer {
            validation.set_issuer(&[iss]);
        }
        Self {
            decoding: DecodingKey::from_secret(key),
            encoding: EncodingKey::from_secret(key),
            validation,
            issuer: auth.issuer.clone(),
        }
    }

    /// Sign a session token for `identity`, valid for `ttl_secs`.
    pub fn issue(&self, identity: &UserIdentity, ttl_secs: u64) -> GsyncResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("system clock before epoch: {e}"))?
            .as_secs();
        let claims = Claims {
            sub: identity.user_id.clone(),
            email: identity.email.clone(),
            exp: now + ttl_secs,
            iat: now,
            iss: self.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| anyhow::anyhow!("JWT encoding failed: {e}").into())
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> GsyncResult<UserIdentity> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("token rejected: {e}");
            GsyncError::Authentication("invalid or expired session".into())
        })?;

        if data.claims.sub.is_empty() {
            return Err(GsyncError::Authentication("token has no subject".into()));
        }

        Ok(UserIdentity {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// Pick the request credential: body token, then bearer header, then cookie.
pub fn extract_token(body_token: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(t) = body_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(t.to_string());
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(t) = bearer {
        return Some(t.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(
            &SecretString::from("test-secret-with-enough-length-000"),
            &AuthConfig::default(),
        )
    }

    fn alice() -> UserIdentity {
        UserIdentity {
            user_id: "alice".into(),
            email: "alice@example.com".into(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let v = verifier();
        let token = v.issue(&alice(), 3600).unwrap();
        assert_eq!(v.verify(&token).unwrap(), alice());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = verifier().issue(&alice(), 3600).unwrap();
        let other = JwtVerifier::new(
            &SecretString::from("another-secret-entirely-000000000"),
            &AuthConfig::default(),
        );
        assert!(matches!(
            other.verify(&token),
            Err(GsyncError::Authentication(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let v = verifier();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let claims = Claims {
            sub: "alice".into(),
            email: "alice@example.com".into(),
            exp: now - 3600,
            iat: now - 7200,
            iss: None,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &v.encoding).unwrap();
        assert!(v.verify(&token).is_err());
    }

    #[test]
    fn test_issuer_enforced() {
        let auth = AuthConfig {
            issuer: Some("gsync".into()),
            ..Default::default()
        };
        let secret = SecretString::from("test-secret-with-enough-length-000");
        let strict = JwtVerifier::new(&secret, &auth);

        let unscoped = verifier().issue(&alice(), 3600).unwrap();
        assert!(strict.verify(&unscoped).is_err());

        let scoped = strict.issue(&alice(), 3600).unwrap();
        assert_eq!(strict.verify(&scoped).unwrap(), alice());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verifier().verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_extract_token_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; gsync_session=from-cookie"),
        );

        assert_eq!(extract_token(Some("from-body"), &headers).as_deref(), Some("from-body"));
        assert_eq!(extract_token(Some("  "), &headers).as_deref(), Some("from-header"));

        headers.remove(header::AUTHORIZATION);
        assert_eq!(extract_token(None, &headers).as_deref(), Some("from-cookie"));

        assert_eq!(extract_token(None, &HeaderMap::new()), None);
    }
}
