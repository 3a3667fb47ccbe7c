//! Signed, expiring password reset tokens.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    reset_password: i32,
    exp: i64,
}

#[derive(Clone)]
pub struct ResetTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl ResetTokens {
    #[must_use]
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
        }
    }

    pub fn issue(&self, user_id: i32) -> Result<String> {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    /// Issues a token as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, user_id: i32, now: i64) -> Result<String> {
        let claims = ResetClaims {
            reset_password: user_id,
            exp: now + self.ttl_seconds,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("Failed to sign reset token")
    }

    /// User id carried by a valid, unexpired token.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<i32> {
        decode::<ResetClaims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims.reset_password)
    }
}
