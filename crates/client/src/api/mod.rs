//! Thin request builders per resource, layered on the shared [`HttpClient`].
//!
//! Each binding holds an `Arc` of the process-wide client, so every call made
//! here shares one token store and one refresh lock.
//!
//! [`HttpClient`]: crate::http::HttpClient

pub mod auth;
pub mod permissions;
pub mod roles;
pub mod users;

pub use auth::AuthApi;
pub use permissions::PermissionsApi;
pub use roles::RolesApi;
pub use users::UsersApi;
