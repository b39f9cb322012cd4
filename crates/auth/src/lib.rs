//! `antco-auth` — claims and authorization decisions for the portal client.
//!
//! Pure types and predicates: no HTTP, no storage. The client crate feeds the
//! authenticated user's profile in and routes on the answers.

pub mod authorize;
pub mod permissions;
pub mod profile;
pub mod roles;
pub mod tokens;

pub use authorize::{
    AccessRule, AuthorizationExplanation, AuthzError, DenialKind, DenialReason, authorize,
    explain_authorization,
};
pub use permissions::Permission;
pub use profile::{UserProfile, UserProfilePatch, UserStatus};
pub use roles::Role;
pub use tokens::TokenSet;
