//! Domain models for advisory-auth.

pub mod grant;
pub mod identity;
pub mod resource;
pub mod role;

pub use grant::Grant;
pub use identity::{normalize_email, Identity, NewIdentity, SanitizedIdentity};
pub use resource::{Resource, ResourceRef};
pub use role::Role;
