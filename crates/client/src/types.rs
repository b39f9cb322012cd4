//! Wire types for the Auth API and the Admin API (camelCase JSON).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use antco_auth::{TokenSet, UserProfile, UserStatus};
use antco_core::{PermissionId, RoleId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Auth API
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Forwarded as-is; the client does not change token handling for it.
    #[serde(default)]
    pub remember_me: bool,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    pub fn remember_me(mut self, remember: bool) -> Self {
        self.remember_me = remember;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Token grant returned by login, register and SMS verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl LoginResponse {
    /// The granted pair. Without an absolute expiry, `expiresIn` (seconds)
    /// is counted from now; zero means unknown.
    pub fn token_set(&self) -> TokenSet {
        let set = TokenSet::new(self.access_token.clone(), self.refresh_token.clone());
        let expires_at = self.expires_at.or_else(|| {
            let secs = i64::try_from(self.expires_in).ok().filter(|s| *s > 0)?;
            Some(Utc::now() + Duration::seconds(secs))
        });
        match expires_at {
            Some(at) => set.with_expiry(at),
            None => set,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsCodeRequest {
    pub phone_number: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsCodeSent {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySmsCodeRequest {
    pub phone_number: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin API: users
// ─────────────────────────────────────────────────────────────────────────────

/// A user account as listed by the Admin API. Roles are names only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
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
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoles {
    pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilters {
    pub search_term: Option<String>,
    pub status: Option<UserStatus>,
}

impl UserFilters {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = search_pair(self.search_term.as_deref());
        if let Some(status) = self.status {
            pairs.push(("status".to_string(), status.as_str().to_string()));
        }
        pairs
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin API: roles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRole {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub type UpdateRole = CreateRole;

/// Body returned by role creation: the new role's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRole {
    pub value: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPermissions {
    pub permission_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFilters {
    pub search_term: Option<String>,
}

impl RoleFilters {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        search_pair(self.search_term.as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin API: permissions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionFilters {
    pub category: Option<String>,
}

impl PermissionFilters {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match self.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => vec![("category".to_string(), c.to_string())],
            _ => Vec::new(),
        }
    }
}

fn search_pair(term: Option<&str>) -> Vec<(String, String)> {
    match term.map(str::trim) {
        Some(t) if !t.is_empty() => vec![("searchTerm".to_string(), t.to_string())],
        _ => Vec::new(),
    }
}
