//! Bearer tokens and password hashing.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies HS256 access tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, username: &str, user_id: &str) -> Result<String, ServerError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: username.to_owned(),
            user_id: user_id.to_owned(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServerError::Internal(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ServerError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ServerError::Unauthorized(format!("invalid token: {e}")))
    }
}

/// Hashes `password` on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ServerError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ServerError::Internal(format!("spawn_blocking panicked: {e}")))?
        .map_err(|e| ServerError::Internal(format!("password hashing failed: {e}")))
}

/// Checks `password` against a stored bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ServerError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ServerError::Internal(format!("spawn_blocking panicked: {e}")))?
        .map_err(|e| ServerError::Internal(format!("password check failed: {e}")))
}
