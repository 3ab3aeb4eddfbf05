//! Custom error types for the authentication service
//!
//! Credential and token failures are terminal per-request and carry enough
//! detail for the client to act on. Operational failures (configuration,
//! store) are logged server-side and surfaced as a generic failure so that
//! internals never leak, and so they are never mistaken for bad credentials.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for authentication and session operations
#[derive(Error, Debug)]
pub enum AuthError {
    /// Username/password pair did not match a stored credential
    #[error("Invalid username or password")]
    InvalidCredential,

    /// No user row exists for the requested identity
    #[error("User not found")]
    UserNotFound,

    /// Token absent, undecodable, or missing required claims
    #[error("Invalid or missing token")]
    TokenMalformed,

    /// Token signature did not verify
    #[error("Invalid token signature")]
    TokenInvalid,

    /// Token is past its expiry
    #[error("Token expired")]
    TokenExpired,

    /// Token was issued before the user's most recent login
    #[error("Session terminated - Another login detected")]
    SessionSuperseded,

    /// User's active flag is cleared
    #[error("Session terminated - User logged out")]
    SessionLoggedOut,

    /// Conflicting active session; a forced login can take it over
    #[error("User is already logged in elsewhere")]
    AlreadyLoggedIn,

    /// Too many login attempts in the rate-limit window
    #[error("Too many login attempts, try again later")]
    RateLimited,

    /// Server-side misconfiguration (missing secret, bad state)
    #[error("Server configuration error: {0}")]
    Configuration(String),

    /// Session store unreachable or failing
    #[error("Session store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Type alias for authentication results
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Stable machine-readable reason string for session-check responses
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::UserNotFound => "user_not_found",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::SessionSuperseded => "session_superseded",
            AuthError::SessionLoggedOut => "session_logged_out",
            AuthError::AlreadyLoggedIn => "already_logged_in",
            AuthError::RateLimited => "rate_limited",
            AuthError::Configuration(_) => "configuration_error",
            AuthError::Store(_) => "store_unavailable",
        }
    }

    /// True for infrastructure faults, as opposed to authentication outcomes
    pub fn is_operational(&self) -> bool {
        matches!(self, AuthError::Configuration(_) | AuthError::Store(_))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Unknown user and bad password get the same response on purpose:
        // the login surface must not allow username enumeration.
        let (status, error_message) = match &self {
            AuthError::InvalidCredential | AuthError::UserNotFound => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            ),
            AuthError::TokenMalformed | AuthError::TokenInvalid | AuthError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AuthError::SessionSuperseded | AuthError::SessionLoggedOut => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            AuthError::AlreadyLoggedIn => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "already_logged_in": true,
                }));
                return (StatusCode::FORBIDDEN, body).into_response();
            }
            AuthError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AuthError::Configuration(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AuthError::Store(e) => {
                error!("Session store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons_are_stable() {
        assert_eq!(AuthError::SessionSuperseded.reason(), "session_superseded");
        assert_eq!(AuthError::SessionLoggedOut.reason(), "session_logged_out");
        assert_eq!(AuthError::TokenExpired.reason(), "token_expired");
    }

    #[test]
    fn test_operational_classification() {
        assert!(AuthError::Configuration("no secret".into()).is_operational());
        assert!(
            AuthError::Store(DatabaseError::Configuration("no url".into())).is_operational()
        );
        assert!(!AuthError::InvalidCredential.is_operational());
        assert!(!AuthError::SessionSuperseded.is_operational());
    }
}
