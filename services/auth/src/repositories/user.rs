//! User repository for database operations

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::models::{NewUser, Role, User, hash_password};
use crate::repositories::UserStore;
use crate::validation::{validate_email, validate_password, validate_username};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    ///
    /// User rows are normally provisioned by the fleet administration
    /// tooling; this exists for that tooling and for test fixtures. The
    /// payload is validated and the password hashed before insertion.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        validate_username(&new_user.username).map_err(|e| anyhow::anyhow!(e))?;
        validate_email(&new_user.email).map_err(|e| anyhow::anyhow!(e))?;
        validate_password(&new_user.password).map_err(|e| anyhow::anyhow!(e))?;

        info!("Creating new user: {}", new_user.username);

        let password_hash = hash_password(&new_user.password)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, logged_in)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            RETURNING id, username, email, password_hash, role, logged_in,
                      last_login_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        row_to_user(&row).context("Failed to decode created user row")
    }
}

impl UserStore for UserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, role, logged_in,
                   last_login_at, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        match row {
            Some(row) => {
                let user = row_to_user(&row).map_err(decode_error)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, role, logged_in,
                   last_login_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        match row {
            Some(row) => {
                let user = row_to_user(&row).map_err(decode_error)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn begin_session(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<bool, DatabaseError> {
        // The conflict check and the state transition are one statement:
        // zero rows affected means another session is already active.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET logged_in = TRUE, last_login_at = $2, updated_at = $2
            WHERE id = $1 AND (logged_in = FALSE OR $3)
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(force)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn end_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        // last_login_at advances on logout too, so tokens issued before the
        // logout are rejected by the staleness check as well as the flag.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET logged_in = FALSE, last_login_at = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Decode a user row, parsing the stored role name
fn row_to_user(row: &PgRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    let role: Role = role.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        logged_in: row.try_get("logged_in")?,
        last_login_at: row.try_get("last_login_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Wrap a row-decoding failure as a query-level database error
fn decode_error(err: anyhow::Error) -> DatabaseError {
    DatabaseError::Query(sqlx::Error::Decode(err.into()))
}
