//! User model and related functionality
//!
//! The `User` row is the single source of truth for session state: the
//! `logged_in` flag says whether the user currently holds an active session,
//! and `last_login_at` is the marker every issued token is checked against.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role assigned to a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    Shop,
    Manager,
}

impl Role {
    /// Get the role name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
            Role::Shop => "shop",
            Role::Manager => "manager",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "driver" => Ok(Role::Driver),
            "shop" => Ok(Role::Shop),
            "manager" => Ok(Role::Manager),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User entity
///
/// Invariant: `logged_in == true` implies `last_login_at` is set and holds
/// the timestamp of the most recent successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub logged_in: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Verify a plaintext password against this user's stored hash
    ///
    /// Returns `Ok(true)` on a match and `Ok(false)` on a mismatch. Any other
    /// outcome means the stored hash itself is unreadable.
    pub fn verify_password(&self, password: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(&self.password_hash)?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// New user creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Hash a plaintext password with a fresh random salt
///
/// Produces a PHC-formatted string carrying algorithm parameters and salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(password_hash: String) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "hdavis".to_string(),
            email: "hdavis@example.com".to_string(),
            password_hash,
            role: Role::Driver,
            logged_in: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("fleet-pass-123!").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));

        let user = test_user(hash);
        assert!(user.verify_password("fleet-pass-123!").unwrap());
        assert!(!user.verify_password("wrong-password").unwrap());
    }

    #[test]
    fn test_unreadable_hash_is_an_error() {
        let user = test_user("not-a-phc-string".to_string());
        assert!(user.verify_password("anything").is_err());
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Admin, Role::Driver, Role::Shop, Role::Manager] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("dispatcher".parse::<Role>().is_err());
    }
}
