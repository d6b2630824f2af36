//! services/api/src/web/auth.rs
//!
//! Bearer token claims and verification.
//!
//! Tokens are HS256 JWTs issued elsewhere; this service only verifies them and
//! reads the caller's role and login id.

use class_schedule_core::ActorId;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

/// The claims carried by a verified token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The login's username. Tokens minted by the legacy issuer carry it as
    /// `unique_name`.
    #[serde(alias = "unique_name")]
    pub sub: String,
    pub role: Role,
    /// The login id, encoded as a decimal string.
    #[serde(rename = "UserId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub exp: usize,
}

impl Claims {
    /// The acting login id, if the token carries a well-formed one.
    pub fn actor_id(&self) -> Option<ActorId> {
        self.user_id.as_deref()?.trim().parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Verifies the signature and expiry of `token` and returns its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
