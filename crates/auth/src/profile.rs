//! The authenticated user's profile as returned by `GET /auth/me` and login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use antco_core::UserId;

use crate::{Permission, Role};

/// Account status as reported by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    PendingVerification,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Inactive => "Inactive",
            UserStatus::Suspended => "Suspended",
            UserStatus::PendingVerification => "PendingVerification",
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity plus claims of the logged-in user.
///
/// Identity fields beyond `id` and `email` are optional on the wire; missing
/// ones decode to their defaults so an older Auth API build still logs in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub email_confirmed: bool,
    #[serde(default)]
    pub phone_number_confirmed: bool,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl UserProfile {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            full_name: String::new(),
            avatar: None,
            phone_number: None,
            status: UserStatus::Active,
            email_confirmed: false,
            phone_number_confirmed: false,
            two_factor_enabled: false,
            last_login_at: None,
            created_at: None,
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(resource, action))
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == name)
    }

    /// True if the user holds at least one of `names`.
    pub fn has_any_role<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().any(|n| self.has_role(n.as_ref()))
    }

    /// True iff the user holds every one of `names` (vacuously true for none).
    pub fn has_all_roles<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.has_role(n.as_ref()))
    }

    /// Shallow merge: every field present in `patch` replaces the current one.
    pub fn apply(&mut self, patch: UserProfilePatch) {
        let UserProfilePatch {
            email,
            first_name,
            last_name,
            full_name,
            avatar,
            phone_number,
            status,
            email_confirmed,
            phone_number_confirmed,
            two_factor_enabled,
            roles,
            permissions,
        } = patch;

        if let Some(v) = email {
            self.email = v;
        }
        if let Some(v) = first_name {
            self.first_name = v;
        }
        if let Some(v) = last_name {
            self.last_name = v;
        }
        if let Some(v) = full_name {
            self.full_name = v;
        }
        if let Some(v) = avatar {
            self.avatar = Some(v);
        }
        if let Some(v) = phone_number {
            self.phone_number = Some(v);
        }
        if let Some(v) = status {
            self.status = v;
        }
        if let Some(v) = email_confirmed {
            self.email_confirmed = v;
        }
        if let Some(v) = phone_number_confirmed {
            self.phone_number_confirmed = v;
        }
        if let Some(v) = two_factor_enabled {
            self.two_factor_enabled = v;
        }
        if let Some(v) = roles {
            self.roles = v;
        }
        if let Some(v) = permissions {
            self.permissions = v;
        }
    }
}

/// Partial update for [`UserProfile::apply`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfilePatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub phone_number: Option<String>,
    pub status: Option<UserStatus>,
    pub email_confirmed: Option<bool>,
    pub phone_number_confirmed: Option<bool>,
    pub two_factor_enabled: Option<bool>,
    pub roles: Option<Vec<Role>>,
    pub permissions: Option<Vec<Permission>>,
}
