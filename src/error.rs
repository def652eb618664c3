// Authentication and authorization error types
// Maps every failure to an HTTP status at the request boundary

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors raised by the authentication core.
///
/// Every authentication failure on the API-gating path collapses into
/// [`AuthError::Unauthenticated`] so that clients cannot distinguish a bad
/// signature from an expired token or an unknown subject.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, invalid, expired or wrong-scope token, or subject not found
    #[error("Could not validate credentials")]
    Unauthenticated,

    /// Malformed or expired email-verification token (not an API-gating path)
    #[error("Invalid token for email verification")]
    InvalidVerificationToken,

    /// Authenticated, but the user's role is not in the route's allow-list
    #[error("Forbidden")]
    Forbidden,

    /// Token signing failed
    #[error("Token creation error: {0}")]
    TokenCreation(String),

    /// Password hashing failed
    #[error("Password hashing error")]
    PasswordHash,

    /// Cache infrastructure failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// User store infrastructure failure
    #[error("User store error: {0}")]
    Store(String),

    /// Anything else that must never reach a client verbatim
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::InvalidVerificationToken => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::TokenCreation(_)
            | AuthError::PasswordHash
            | AuthError::Cache(_)
            | AuthError::Store(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to send to clients (infrastructure detail stays in logs)
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Unauthenticated => "Could not validate credentials".to_string(),
            AuthError::InvalidVerificationToken => {
                "Invalid token for email verification".to_string()
            }
            AuthError::Forbidden => "Forbidden".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::Unauthenticated => {
                warn!("Rejected request: could not validate credentials");
            }
            AuthError::InvalidVerificationToken => {
                warn!("Rejected email verification token");
            }
            AuthError::Forbidden => {
                warn!("Forbidden: role not in allow-list");
            }
            AuthError::TokenCreation(msg) => error!("Token creation error: {}", msg),
            AuthError::PasswordHash => error!("Password hashing error"),
            AuthError::Cache(msg) => error!("Cache error: {}", msg),
            AuthError::Store(msg) => error!("User store error: {}", msg),
            AuthError::Internal(msg) => error!("Internal error: {}", msg),
        }

        let status = self.status_code();
        let body = Json(json!({ "error": self.client_message() }));
        let mut response = (status, body).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
