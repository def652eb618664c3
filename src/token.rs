// JWT codec for scope-tagged, expiring tokens
// Signature covers the whole claim set, so tampering with exp or scope
// invalidates the token

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AuthError;

/// Opaque decode failure. Callers map it to the taxonomy of the path they
/// are on (401 for API gating, 422 for email verification) without learning
/// whether the signature, the expiry or the scope check failed.
#[derive(Debug, Error)]
#[error("invalid token")]
pub struct InvalidToken;

/// Logical purpose of a token, carried inside the signed claims.
///
/// A token only decodes against the scope it was created with; a valid,
/// unexpired refresh token never satisfies an access-token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    AccessToken,
    RefreshToken,
    EmailToken,
}

impl Scope {
    /// Default lifetime for tokens of this scope
    pub fn default_ttl(self) -> Duration {
        match self {
            Scope::AccessToken => Duration::minutes(15),
            Scope::RefreshToken => Duration::days(7),
            Scope::EmailToken => Duration::days(2),
        }
    }
}

/// Signed claim set. All timestamps are UTC epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub scope: Scope,
}

/// HS256 codec over a shared deployment secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the decode-time wall clock, no grace window
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign a token for `sub` with the given scope.
    ///
    /// `ttl` overrides the scope's default lifetime when provided.
    pub fn create(
        &self,
        sub: &str,
        scope: Scope,
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now + ttl.unwrap_or_else(|| scope.default_ttl());

        let claims = Claims {
            sub: sub.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            scope,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Verify signature and expiry, then require the claimed scope to equal
    /// `expected`. All three checks fail the same way.
    pub fn decode(&self, token: &str, expected: Scope) -> Result<Claims, InvalidToken> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| InvalidToken)?;

        if data.claims.scope != expected {
            return Err(InvalidToken);
        }

        Ok(data.claims)
    }
}
