use service_core::error::AppError;
use thiserror::Error;

use super::jwt::TokenError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    AuthenticationFailed,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ServiceError::TokenExpired,
            TokenError::Revoked => ServiceError::TokenRevoked,
            TokenError::Invalid(_) | TokenError::WrongKind { .. } => ServiceError::TokenInvalid,
            TokenError::Encoding(e) => {
                ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e))
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::AuthenticationFailed => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::TokenInvalid => {
                AppError::AuthError(anyhow::anyhow!("Invalid token, please log in again"))
            }
            ServiceError::TokenExpired => AppError::TokenExpired,
            ServiceError::TokenRevoked => {
                AppError::AuthError(anyhow::anyhow!("Token has been revoked"))
            }
            ServiceError::PermissionDenied(what) => {
                AppError::Forbidden(anyhow::anyhow!("Permission denied: {}", what))
            }
            ServiceError::NotFound(what) => {
                AppError::NotFound(anyhow::anyhow!("{} not found", what))
            }
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
