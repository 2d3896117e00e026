//! Signed session tokens.
//!
//! Tokens are HS256 JWTs. Everything needed to accept one lives in the
//! payload, so nothing is stored server side and a token stays valid until
//! it expires.

use crate::auth::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, accepted on protected routes.
    Access,
    /// Long-lived, only exchanged for new access tokens.
    Refresh,
}

/// Token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Role at issue time (access tokens only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Token kind.
    pub typ: TokenKind,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Unique token ID.
    pub jti: String,
}

impl Claims {
    /// Subject parsed back into a user ID.
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Malformed)
    }
}

/// Why a token was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not a JWT, bad encoding or missing claims.
    #[error("malformed token")]
    Malformed,
    /// Past its expiry.
    #[error("token expired")]
    Expired,
    /// Signed with another key or tampered with.
    #[error("invalid signature")]
    InvalidSignature,
    /// An access token where a refresh token was expected, or the reverse.
    #[error("wrong token type")]
    WrongKind,
    /// Signing failed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Issues and verifies tokens with a process-wide secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    /// Create a signer.
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue an access token carrying the user's role.
    pub fn issue_access(&self, user_id: i64, role: Role) -> Result<String, TokenError> {
        self.issue(user_id, Some(role), TokenKind::Access, self.access_ttl)
    }

    /// Issue a refresh token.
    pub fn issue_refresh(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue(user_id, None, TokenKind::Refresh, self.refresh_ttl)
    }

    pub(crate) fn issue(
        &self,
        user_id: i64,
        role: Option<Role>,
        typ: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            typ,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature, expiry and kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;

        if data.claims.typ != expected {
            return Err(TokenError::WrongKind);
        }

        Ok(data.claims)
    }
}
