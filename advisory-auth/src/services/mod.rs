//! Services layer for advisory-auth.
//!
//! Permission resolution and evaluation, the token lifecycle, and the
//! account operations built on top of them.

pub mod accounts;
pub mod auth;
pub mod authorization;
pub mod clock;
pub mod error;
mod identity_store;
mod jwt;
pub mod permissions;
pub mod revocation;
mod tokens;

pub use accounts::AccountService;
pub use auth::AuthService;
pub use authorization::PermissionEvaluator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ServiceError;
pub use identity_store::{IdentityChange, IdentityRepository, InMemoryIdentityRepository};
pub use jwt::{TokenClaims, TokenError, TokenKind, TokenService};
pub use permissions::RolePermissions;
pub use revocation::{
    spawn_compaction_task, token_fingerprint, CompactionStats, InMemoryRevocationStore,
    RevocationStore,
};
pub use tokens::{TokenManager, TokenResponse};
