pub mod auth;
pub mod permission;

pub use auth::{authentication_filter, evaluate_bearer, AuthUser, AuthenticatedIdentity, SkipReason};
pub use permission::require_grant;
