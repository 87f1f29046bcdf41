//! JWT Token Service
//! Issues and verifies the HS256 bearer tokens handed out at login

use crate::auth::models::Role;
use crate::config::AuthConfig;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const TOKEN_ISSUER: &str = "school-canteen";

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
    iss: String,
}

/// Why a token was rejected. Never sent to clients.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
    #[error("token signature mismatch")]
    SignatureMismatch,
}

/// Verified identity carried by a token.
///
/// Only `TokenService::verify` builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    subject: String,
    role: Role,
    issued_at: i64,
    expires_at: i64,
}

impl IdentityClaim {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64, // seconds
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    /// Sign a token for `subject` carrying `role`.
    pub fn issue(&self, subject: &str, role: Role) -> Result<IssuedToken> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.ttl)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
        };

        debug!(subject, role = %role, ttl_hours = self.ttl.num_hours(), "Issuing JWT");

        let token = self.sign(&claims)?;
        Ok(IssuedToken {
            token,
            expires_in: self.ttl.num_seconds().max(0) as u64,
        })
    }

    /// Check signature, issuer and expiry, then hand back the claim.
    pub fn verify(&self, token: &str) -> Result<IdentityClaim, TokenError> {
        let decoded =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
                    _ => TokenError::Malformed,
                }
            })?;

        let claims = decoded.claims;
        if claims.sub.trim().is_empty() {
            return Err(TokenError::Malformed);
        }

        Ok(IdentityClaim {
            subject: claims.sub,
            role: claims.role,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .context("Failed to generate JWT")
    }
}
