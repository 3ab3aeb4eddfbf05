//! Authentication service repositories
//!
//! `UserStore` is the contract the session state machine consumes: user
//! lookup plus the three login-state transitions. All of a user's session
//! state lives in their row, so each transition is a single statement and
//! there is nothing else to coordinate.

use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use uuid::Uuid;

use crate::models::User;

pub mod user;

// Re-export for convenience
pub use user::UserRepository;

/// Relational store backing the session lifecycle
#[allow(async_fn_in_trait)]
pub trait UserStore: Send + Sync {
    /// Look up a user by exact username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError>;

    /// Look up a user by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Start a session: set `logged_in` and advance `last_login_at` to `now`
    /// in one conditional update. Returns `false` when the user already holds
    /// an active session and `force` was not set (nothing is mutated), so the
    /// check-and-set cannot race against a concurrent login.
    async fn begin_session(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<bool, DatabaseError>;

    /// End a session: clear `logged_in` and advance `last_login_at` to `now`
    /// so earlier-issued tokens also fall to the staleness check. Returns
    /// `false` when no such user exists.
    async fn end_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError>;

    /// Advance `last_login_at` to `now` without touching the active flag,
    /// invalidating every token issued before this instant. Returns `false`
    /// when no such user exists.
    async fn touch_last_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError>;
}
