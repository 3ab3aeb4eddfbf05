//! JWT service for token generation and validation
//!
//! Tokens are HS256-signed bearer tokens carrying the user's identity claims
//! and an issuance timestamp. The server never stores a token: validity is
//! decided from the signature, the expiry, and a comparison of the issuance
//! time against the user's session marker (see the session module).

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::{Role, User};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for signing and verifying tokens
    pub secret: String,
    /// Token lifetime in seconds (default: 24 hours)
    pub token_expiry: i64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: shared signing secret (required)
    /// - `JWT_TOKEN_EXPIRY`: token lifetime in seconds (default: 86400)
    pub fn from_env() -> AuthResult<Self> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| {
            AuthError::Configuration("JWT_SECRET environment variable not set".to_string())
        })?;

        if secret.is_empty() {
            return Err(AuthError::Configuration(
                "JWT_SECRET must not be empty".to_string(),
            ));
        }

        let token_expiry = std::env::var("JWT_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        Ok(JwtConfig {
            secret,
            token_expiry,
        })
    }
}

/// JWT claims structure
///
/// The user identifier is written as `user_id`, but tokens minted by the
/// previous generation of the platform used `user_ID`; both decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    #[serde(alias = "user_ID")]
    pub user_id: Uuid,
    /// Username at issuance time
    pub username: String,
    /// Role at issuance time
    pub role: Role,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiration time (seconds since epoch)
    pub exp: i64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Generate a token for a user, issued now
    pub fn generate_token(&self, user: &User) -> AuthResult<String> {
        self.generate_token_at(user, Utc::now())
    }

    /// Generate a token for a user with an explicit issuance instant
    ///
    /// Login passes the same instant here and to the session-marker write so
    /// that `iat` and `last_login_at` agree exactly.
    pub fn generate_token_at(&self, user: &User, issued_at: DateTime<Utc>) -> AuthResult<String> {
        let iat = issued_at.timestamp();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            iat,
            exp: iat + self.config.token_expiry,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Configuration(format!("Failed to sign token: {}", e)))
    }

    /// Validate a token's signature and expiry and return the claims
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(classify_jwt_error)?;
        Ok(token_data.claims)
    }

    /// Decode a token without verifying signature or expiry
    ///
    /// Used only by logout: an expired or otherwise unverifiable token must
    /// still be able to terminate its own session. Only the claims' shape is
    /// checked; the identity it names is trusted solely for clearing state.
    pub fn decode_unverified(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::TokenMalformed)?;
        Ok(token_data.claims)
    }

    /// Get the configured token lifetime in seconds
    pub fn token_expiry(&self) -> i64 {
        self.config.token_expiry
    }
}

/// Map a jsonwebtoken error onto the authentication error taxonomy
fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => AuthError::TokenMalformed,
        _ => AuthError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn test_service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "motorpool-test-secret-long-enough-for-hmac".to_string(),
            token_expiry: 86400,
        })
    }

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Driver,
            logged_in: true,
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let service = test_service();
        let user = test_user();

        let token = service.generate_token(&user).expect("token should sign");
        let claims = service.validate_token(&token).expect("token should verify");

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Driver);
        assert_eq!(claims.exp, claims.iat + 86400);
    }

    #[test]
    fn test_expired_token_fails_as_expired() {
        let service = test_service();
        let user = test_user();

        // Issued two days ago with a 24h lifetime: expired a full day ago,
        // well past the default 60-second leeway.
        let issued = Utc::now() - chrono::Duration::days(2);
        let token = service
            .generate_token_at(&user, issued)
            .expect("token should sign");

        let result = service.validate_token(&token);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_foreign_secret_fails_as_invalid() {
        let service = test_service();
        let other = JwtService::new(JwtConfig {
            secret: "a-different-secret-entirely".to_string(),
            token_expiry: 86400,
        });

        let token = other
            .generate_token(&test_user())
            .expect("token should sign");

        let result = service.validate_token(&token);
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn test_capitalized_user_id_alias_decodes() {
        let service = test_service();
        let user_id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        // Tokens from the previous platform generation spell the claim user_ID.
        let legacy = json!({
            "user_ID": user_id,
            "username": "alice",
            "role": "manager",
            "iat": now,
            "exp": now + 3600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &legacy,
            &EncodingKey::from_secret("motorpool-test-secret-long-enough-for-hmac".as_bytes()),
        )
        .expect("legacy token should sign");

        let claims = service.validate_token(&token).expect("alias should decode");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn test_missing_user_id_is_malformed() {
        let service = test_service();
        let now = Utc::now().timestamp();

        let incomplete = json!({
            "username": "alice",
            "role": "driver",
            "iat": now,
            "exp": now + 3600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &incomplete,
            &EncodingKey::from_secret("motorpool-test-secret-long-enough-for-hmac".as_bytes()),
        )
        .expect("token should sign");

        let result = service.validate_token(&token);
        assert!(matches!(result, Err(AuthError::TokenMalformed)));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let service = test_service();
        let result = service.validate_token("not-a-token-at-all");
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn test_decode_unverified_recovers_expired_claims() {
        let service = test_service();
        let user = test_user();

        let issued = Utc::now() - chrono::Duration::days(2);
        let token = service
            .generate_token_at(&user, issued)
            .expect("token should sign");

        // Full validation rejects it, the logout path can still read it.
        assert!(service.validate_token(&token).is_err());
        let claims = service
            .decode_unverified(&token)
            .expect("unverified decode should succeed");
        assert_eq!(claims.user_id, user.id);
    }

    #[test]
    #[serial]
    fn test_jwt_config_from_env() {
        unsafe {
            std::env::set_var("JWT_SECRET", "a-test-secret");
            std::env::remove_var("JWT_TOKEN_EXPIRY");
        }

        let config = JwtConfig::from_env().expect("config should load");
        assert_eq!(config.secret, "a-test-secret");
        assert_eq!(config.token_expiry, 86400);

        unsafe {
            std::env::set_var("JWT_TOKEN_EXPIRY", "7200");
        }
        let config = JwtConfig::from_env().expect("config should load");
        assert_eq!(config.token_expiry, 7200);

        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("JWT_TOKEN_EXPIRY");
        }
    }

    #[test]
    #[serial]
    fn test_missing_secret_is_a_configuration_error() {
        unsafe {
            std::env::remove_var("JWT_SECRET");
        }

        let result = JwtConfig::from_env();
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn test_claims_serialize_with_stable_names() {
        let service = test_service();
        let user = test_user();
        let token = service.generate_token(&user).expect("token should sign");
        let claims = service.validate_token(&token).expect("token should verify");

        let value = serde_json::to_value(&claims).expect("claims should serialize");
        assert!(value.get("user_id").is_some());
        assert!(value.get("username").is_some());
        assert!(value.get("role").is_some());
        assert!(value.get("iat").is_some());
    }
}
