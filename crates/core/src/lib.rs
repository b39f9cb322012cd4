//! `antco-core` — shared vocabulary for the admin portal client.
//!
//! Identifiers and pagination primitives used by both the Auth API and the
//! Admin API bindings. No I/O lives here.

pub mod error;
pub mod id;
pub mod page;

pub use error::{CoreError, CoreResult};
pub use id::{PermissionId, RoleId, UserId};
pub use page::{PageRequest, Paginated};
