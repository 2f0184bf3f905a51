//! Password hashing and JWT login tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use keyhub_core::error::{KeyHubError, Result};
use serde::{Deserialize, Serialize};

/// JWT claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // user ID
    pub email: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == keyhub_core::types::ROLE_ADMIN
    }
}

/// Signs and verifies login tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl_hours: i64,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        Self { secret: secret.into(), ttl_hours }
    }

    /// Generate a JWT token.
    pub fn create_token(&self, user_id: &str, email: &str, role: &str) -> Result<String> {
        let expiration = chrono::Utc::now()
            .checked_add_signed(chrono::Duration::hours(self.ttl_hours))
            .ok_or_else(|| KeyHubError::Config(format!("token ttl out of range: {}h", self.ttl_hours)))?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id.into(),
            email: email.into(),
            role: role.into(),
            exp: expiration,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| KeyHubError::Crypto(format!("Token creation failed: {e}")))
    }

    /// Validate and decode a JWT token. Any failure is `Unauthorized`.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {e}");
                KeyHubError::Unauthorized
            })
    }
}

/// Hash a password using bcrypt.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| KeyHubError::Crypto(format!("Hash error: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
