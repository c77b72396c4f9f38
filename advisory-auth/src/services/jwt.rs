use chrono::Duration;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::clock::Clock;
use crate::config::JwtConfig;
use crate::models::{Identity, Role};

/// Access (short-lived) or refresh (long-lived).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (normalised email)
    pub sub: String,
    /// Identity ID
    pub uid: i64,
    pub role: Role,
    /// Display name
    pub name: String,
    pub token_type: TokenKind,
    /// Issued at (Unix timestamp, seconds)
    pub iat: i64,
    /// Issued at (Unix timestamp, milliseconds); compared against blanket revocations
    pub iat_ms: i64,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
    /// Token ID, unique per issued token
    pub jti: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Expected {expected} token, got {actual}")]
    WrongKind {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

/// Signs and verifies HS256 tokens. Knows nothing about revocation.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, anyhow::Error> {
        let secret = config.secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(anyhow::anyhow!("JWT secret must not be empty"));
        }

        tracing::info!("Token service initialized with HS256 key");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_ttl: Duration::minutes(config.access_token_expiry_minutes),
            refresh_token_ttl: Duration::days(config.refresh_token_expiry_days),
            clock,
        })
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_token_ttl,
            TokenKind::Refresh => self.refresh_token_ttl,
        }
    }

    /// Issue a token of `kind` for `identity`, valid for `ttl`.
    pub fn issue(
        &self,
        identity: &Identity,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = self.clock.now();
        let exp = now + ttl;

        let claims = TokenClaims {
            sub: identity.email.clone(),
            uid: identity.id,
            role: identity.role,
            name: identity.display_name.clone(),
            token_type: kind,
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Issue with the configured lifetime for `kind`.
    pub fn issue_default(
        &self,
        identity: &Identity,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        self.issue(identity, kind, self.ttl(kind))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// Expiry is checked against the injected clock with no leeway: a token
    /// is expired from the second named in `exp` onwards.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Signature and expiry check only; every failure is `false`.
    pub fn validate(&self, token: &str) -> bool {
        self.decode(token).is_ok()
    }

    /// Read one claim, propagating malformed and expired tokens as distinct errors.
    pub fn extract_claim<T>(
        &self,
        token: &str,
        claim: impl FnOnce(&TokenClaims) -> T,
    ) -> Result<T, TokenError> {
        self.decode(token).map(|claims| claim(&claims))
    }

    pub fn extract_email(&self, token: &str) -> Result<String, TokenError> {
        self.extract_claim(token, |claims| claims.sub.clone())
    }
}
