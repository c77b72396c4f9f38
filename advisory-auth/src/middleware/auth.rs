use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use std::fmt;

use crate::{
    models::Identity,
    services::{IdentityRepository, TokenClaims, TokenError, TokenKind, TokenManager},
    AppState,
};

/// Caller established by [`authentication_filter`] for the rest of the request.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub identity: Identity,
    pub claims: TokenClaims,
    /// Raw bearer token, kept so logout can revoke it.
    pub token: String,
}

/// Why a request continues unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoHeader,
    MalformedHeader,
    Blacklisted,
    Expired,
    InvalidToken,
    UnknownIdentity,
    InactiveIdentity,
    Internal,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NoHeader => "no_header",
            SkipReason::MalformedHeader => "malformed_header",
            SkipReason::Blacklisted => "blacklisted",
            SkipReason::Expired => "expired",
            SkipReason::InvalidToken => "invalid_token",
            SkipReason::UnknownIdentity => "unknown_identity",
            SkipReason::InactiveIdentity => "inactive_identity",
            SkipReason::Internal => "internal",
        };
        f.write_str(reason)
    }
}

/// The bearer token from `Authorization`, if the header is present.
fn bearer_token(headers: &HeaderMap) -> Result<&str, SkipReason> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(SkipReason::NoHeader)?;

    value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(SkipReason::MalformedHeader)
}

/// Run every check the filter applies to one request's headers.
pub async fn evaluate_bearer(
    tokens: &TokenManager,
    identities: &dyn IdentityRepository,
    headers: &HeaderMap,
) -> Result<AuthenticatedIdentity, SkipReason> {
    let token = bearer_token(headers)?;

    let claims = tokens
        .verify(token, TokenKind::Access)
        .map_err(|e| match e {
            TokenError::Revoked => SkipReason::Blacklisted,
            TokenError::Expired => SkipReason::Expired,
            TokenError::Invalid(_) | TokenError::WrongKind { .. } | TokenError::Encoding(_) => {
                SkipReason::InvalidToken
            }
        })?;

    let identity = identities
        .find_by_email(&claims.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Identity lookup failed during authentication");
            SkipReason::Internal
        })?
        .filter(|identity| identity.id == claims.uid)
        .ok_or(SkipReason::UnknownIdentity)?;

    if !identity.is_active() {
        return Err(SkipReason::InactiveIdentity);
    }

    Ok(AuthenticatedIdentity {
        identity,
        claims,
        token: token.to_string(),
    })
}

/// Establish the caller's identity when the bearer token is good. Never
/// rejects: on any failure the request continues without an identity and
/// protected handlers deny it through [`AuthUser`].
pub async fn authentication_filter(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match evaluate_bearer(&state.tokens, state.identities.as_ref(), req.headers()).await {
        Ok(authenticated) => {
            tracing::debug!(
                identity_id = authenticated.identity.id,
                role = %authenticated.identity.role,
                "Caller authenticated"
            );
            req.extensions_mut().insert(authenticated);
        }
        Err(SkipReason::NoHeader) => {}
        Err(reason) => {
            tracing::debug!(reason = %reason, "Bearer token not accepted");
        }
    }

    next.run(req).await
}

/// Extractor for handlers that need an authenticated caller.
pub struct AuthUser(pub AuthenticatedIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }
}
