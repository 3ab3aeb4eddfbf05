//! Session lifecycle management
//!
//! This module is the single source of truth for login, logout, and token
//! validation. The model is deliberately stateless on the token side: the
//! server never stores a token, and "at most one effective session per user"
//! is enforced entirely through the user row. Every successful login (and
//! logout) advances `last_login_at`, which silently invalidates every token
//! issued before that instant without any revocation list.
//!
//! Validation order for a presented token:
//!
//! 1. signature and expiry (`TokenInvalid` / `TokenExpired`)
//! 2. claim shape (`TokenMalformed`)
//! 3. user row lookup (`UserNotFound`)
//! 4. staleness: `iat < last_login_at - TOLERANCE` (`SessionSuperseded`)
//! 5. active flag (`SessionLoggedOut`)

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::jwt::{Claims, JwtService};
use crate::models::{Role, User};
use crate::repositories::UserStore;

/// Tolerance window for the staleness check, in seconds.
///
/// A token's `iat` and the database write of `last_login_at` are not atomic
/// across the network, so a token could otherwise be rejected by the very
/// login that created it. Tokens issued up to this many seconds before the
/// marker remain acceptable.
pub const LAST_LOGIN_TOLERANCE_SECS: i64 = 10;

/// Identity attached to a validated request
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

/// Result of a login attempt that passed credential verification
#[derive(Debug)]
pub enum LoginOutcome {
    /// Session started; a fresh token was issued
    Granted { token: String, user: AuthUser },
    /// Another session is active and the caller did not force. Nothing was
    /// mutated; the caller may retry with force to take the session over.
    AlreadyActive,
}

/// Structured result of a read-only session check
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
}

impl SessionStatus {
    fn valid(user: AuthUser) -> Self {
        Self {
            valid: true,
            reason: None,
            user: Some(user),
        }
    }

    fn invalid(reason: &'static str) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            user: None,
        }
    }
}

/// Pure session check over an immutable user snapshot
///
/// This is the whole invalidation mechanism: a token is live only while its
/// issuance is not older than the session marker (within tolerance) and the
/// user's active flag is set. Kept free of I/O so the ordering and boundary
/// behavior can be tested exhaustively.
pub(crate) fn evaluate_session(claims: &Claims, user: &User) -> AuthResult<()> {
    if let Some(last_login) = user.last_login_at {
        let cutoff = last_login - Duration::seconds(LAST_LOGIN_TOLERANCE_SECS);
        if claims.iat < cutoff.timestamp() {
            return Err(AuthError::SessionSuperseded);
        }
    }

    if !user.logged_in {
        return Err(AuthError::SessionLoggedOut);
    }

    Ok(())
}

/// Session service orchestrating login, logout, and validation
#[derive(Clone)]
pub struct SessionService<S> {
    store: S,
    jwt: JwtService,
}

impl<S: UserStore> SessionService<S> {
    /// Create a new session service
    pub fn new(store: S, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    /// Authenticate a user and start a session
    ///
    /// On a credential match, the login transition (flag plus marker) is a
    /// single conditional update; when it touches no row the user already
    /// holds a session and [`LoginOutcome::AlreadyActive`] is returned with
    /// nothing mutated. The token and the session marker share one timestamp
    /// so a token is never stale against its own login.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        force: bool,
    ) -> AuthResult<LoginOutcome> {
        info!("Login attempt for user: {}", username);

        let user = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let password_ok = user.verify_password(password).map_err(|e| {
            AuthError::Configuration(format!("Stored password hash unreadable: {}", e))
        })?;
        if !password_ok {
            info!("Invalid password for user: {}", username);
            return Err(AuthError::InvalidCredential);
        }

        let now = Utc::now();
        let started = self.store.begin_session(user.id, now, force).await?;
        if !started {
            info!("User {} is already logged in elsewhere", username);
            return Ok(LoginOutcome::AlreadyActive);
        }

        let token = self.jwt.generate_token_at(&user, now)?;
        info!("Login successful for user: {}", username);

        Ok(LoginOutcome::Granted {
            token,
            user: AuthUser {
                user_id: user.id,
                username: user.username,
                role: user.role,
            },
        })
    }

    /// Terminate the session named by a token
    ///
    /// The token is verified when possible, but an expired or unverifiable
    /// token is still decoded so it can end its own session; only the user id
    /// claim is trusted, and only for clearing state. Logging out a user with
    /// no row is a soft no-op since the client discards the token regardless.
    pub async fn logout(&self, token: &str) -> AuthResult<Uuid> {
        let claims = match self.jwt.validate_token(token) {
            Ok(claims) => claims,
            Err(AuthError::TokenExpired) | Err(AuthError::TokenInvalid) => {
                warn!("Logout with unverifiable token, falling back to decode");
                self.jwt.decode_unverified(token)?
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let existed = self.store.end_session(claims.user_id, now).await?;
        if existed {
            info!("User {} logged out", claims.username);
        } else {
            warn!("Logout for unknown user {}", claims.user_id);
        }

        Ok(claims.user_id)
    }

    /// Invalidate every session of a user except the caller's
    ///
    /// Requires a fully valid token for the same user. Advancing the marker
    /// kills all earlier-issued tokens, including the one presented, so a
    /// fresh token is minted from the same instant and returned; the caller
    /// swaps tokens and stays signed in while every other device is kicked.
    pub async fn logout_other_sessions(&self, user_id: Uuid, token: &str) -> AuthResult<String> {
        let auth_user = self.validate(token).await?;
        if auth_user.user_id != user_id {
            warn!(
                "Token for user {} presented against user {}",
                auth_user.user_id, user_id
            );
            return Err(AuthError::TokenInvalid);
        }

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let now = Utc::now();
        self.store.touch_last_login(user_id, now).await?;
        let fresh_token = self.jwt.generate_token_at(&user, now)?;

        info!("Other sessions logged out for user: {}", user.username);
        Ok(fresh_token)
    }

    /// Run the full validation machine for a presented token
    pub async fn validate(&self, token: &str) -> AuthResult<AuthUser> {
        let claims = self.jwt.validate_token(token)?;

        let user = self
            .store
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        evaluate_session(&claims, &user)?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        })
    }

    /// Get the configured token lifetime in seconds
    pub fn token_expiry(&self) -> i64 {
        self.jwt.token_expiry()
    }

    /// Read-only session check reporting `{valid, reason}`
    ///
    /// Authentication outcomes never surface as errors here; only
    /// infrastructure faults (store, configuration) propagate.
    pub async fn check_session(&self, token: &str) -> AuthResult<SessionStatus> {
        match self.validate(token).await {
            Ok(user) => Ok(SessionStatus::valid(user)),
            Err(e) if e.is_operational() => Err(e),
            Err(e) => Ok(SessionStatus::invalid(e.reason())),
        }
    }
}
