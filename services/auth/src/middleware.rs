//! Middleware for JWT token validation and authentication
//!
//! Every request passing through here runs the full validation machine:
//! signature and expiry, then the user row's session marker and active flag.
//! A token that verified yesterday is rejected today if another login has
//! advanced the marker since.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AuthError;

/// Extract and validate the bearer token from the Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::TokenMalformed)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::TokenMalformed)?;

    let auth_user = state.sessions.validate(token).await?;

    // Make the authenticated identity available to handlers
    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}
