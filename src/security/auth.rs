//! Bearer token verification.
//!
//! # Responsibilities
//! - Pull the token out of `Authorization: Bearer <jwt>`
//! - Verify the HS256 signature against the configured secret
//! - Reject tokens whose `stamp` (ms since epoch) lies in the past
//!
//! # Design Decisions
//! - `exp` is honoured when present but not required; `stamp` is the
//!   expiry tokens are issued with
//! - Scope and role checks live on `Claims`, the middleware only maps
//!   failures to status codes

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role that satisfies every role requirement.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer token")]
    NotBearer,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Space separated scope list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Expiry in milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    /// True when every scope in `required` was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|wanted| {
            let wanted = wanted.as_ref();
            let in_scope = self
                .scope
                .as_deref()
                .is_some_and(|s| s.split_whitespace().any(|granted| granted == wanted));
            let in_scopes = self
                .scopes
                .as_ref()
                .is_some_and(|list| list.iter().any(|granted| granted == wanted));
            in_scope || in_scopes
        })
    }

    /// True for `role` itself or the admin role.
    pub fn has_role(&self, role: &str) -> bool {
        matches!(self.role.as_deref(), Some(r) if r == role || r == ADMIN_ROLE)
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.stamp, Some(stamp) if stamp < now_ms)
    }
}

/// Verifies bearer tokens signed with a shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a raw token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        if data.claims.is_expired(now_millis()) {
            return Err(AuthError::Expired);
        }
        Ok(data.claims)
    }

    /// Verify the bearer token in `headers`.
    pub fn verify_header(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthError::NotBearer)?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotBearer)?;
        self.verify(token)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
