//! HTTP handlers for advisory-auth.

pub mod admin;
pub mod auth;
pub mod authz;
pub mod user;

pub use admin::*;
pub use auth::*;
pub use authz::*;
pub use user::*;
