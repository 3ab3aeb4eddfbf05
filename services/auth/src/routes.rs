//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;
use crate::error::AuthError;
use crate::session::{AuthUser, LoginOutcome, SessionStatus};

/// Request for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Take over a conflicting active session
    #[serde(default)]
    pub force: bool,
}

/// Response for a successful login
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: AuthUser,
    pub message: String,
}

/// Response for a successful logout
#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub message: String,
}

/// Request for logging out every other session
#[derive(Debug, Deserialize)]
pub struct LogoutOthersRequest {
    pub user_id: Uuid,
}

/// Response for logging out every other session
///
/// Carries a freshly issued token; the caller must replace its stored token
/// with this one, since the old one falls to the advanced session marker.
#[derive(Serialize)]
pub struct LogoutOthersResponse {
    pub success: bool,
    pub token: String,
    pub message: String,
}

/// Response for the authenticated-identity endpoint
#[derive(Serialize)]
pub struct MeResponse {
    pub authorized: bool,
    pub user: AuthUser,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", post(check_session))
        .route("/auth/logout-others", post(logout_other_sessions))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User login endpoint
///
/// Returns 403 with `already_logged_in: true` when another session is active
/// and `force` was not set, so the client can offer a takeover choice.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if !state.rate_limiter.is_allowed(&payload.username).await {
        return Err(AuthError::RateLimited);
    }

    let outcome = state
        .sessions
        .login(&payload.username, &payload.password, payload.force)
        .await?;

    match outcome {
        LoginOutcome::Granted { token, user } => {
            state.rate_limiter.reset(&payload.username).await;
            Ok((
                StatusCode::OK,
                Json(LoginResponse {
                    success: true,
                    token,
                    expires_in: state.sessions.token_expiry(),
                    user,
                    message: "Login successful".to_string(),
                }),
            ))
        }
        LoginOutcome::AlreadyActive => Err(AuthError::AlreadyLoggedIn),
    }
}

/// Logout endpoint
///
/// Accepts expired tokens; the session named by the token is cleared either
/// way and the client is expected to discard its copy.
pub async fn logout(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<impl IntoResponse, AuthError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AuthError::TokenMalformed)?;

    let user_id = state.sessions.logout(bearer.token()).await?;

    Ok((
        StatusCode::OK,
        Json(LogoutResponse {
            success: true,
            user_id,
            message: "Successfully logged out".to_string(),
        }),
    ))
}

/// Session check endpoint
///
/// Polled by clients to notice a superseded or terminated session. Always
/// answers with a structured `{valid, reason}` body; only an infrastructure
/// fault produces a 500, and even that carries `valid: false`.
pub async fn check_session(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> impl IntoResponse {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return (
            StatusCode::OK,
            Json(SessionStatus {
                valid: false,
                reason: Some("token_malformed"),
                user: None,
            }),
        )
            .into_response();
    };

    match state.sessions.check_session(bearer.token()).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => {
            error!("Session check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "valid": false,
                    "message": "Server error",
                })),
            )
                .into_response()
        }
    }
}

/// Logout-other-sessions endpoint
///
/// Requires a currently valid token for the named user; responds with the
/// reissued token that keeps this device signed in.
pub async fn logout_other_sessions(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(payload): Json<LogoutOthersRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AuthError::TokenMalformed)?;

    let token = state
        .sessions
        .logout_other_sessions(payload.user_id, bearer.token())
        .await?;

    info!("Other sessions logged out for user {}", payload.user_id);

    Ok((
        StatusCode::OK,
        Json(LogoutOthersResponse {
            success: true,
            token,
            message: "Other sessions logged out successfully".to_string(),
        }),
    ))
}

/// Authenticated-identity endpoint, gated by the auth middleware
pub async fn me(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    Json(MeResponse {
        authorized: true,
        user,
    })
}
