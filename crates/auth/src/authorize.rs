use serde::Serialize;
use thiserror::Error;

use crate::{Permission, Role, UserProfile};

/// Requirement guarding a permission-scoped region of the portal.
///
/// The permission (if any) is checked first, then the role list. With
/// `require_all` every listed role must be held, otherwise any one suffices.
/// An empty role list imposes no role requirement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessRule {
    pub permission: Option<Permission>,
    pub roles: Vec<Role>,
    pub require_all: bool,
}

impl AccessRule {
    /// Only authentication is required.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn permission(
        resource: impl Into<std::borrow::Cow<'static, str>>,
        action: impl Into<std::borrow::Cow<'static, str>>,
    ) -> Self {
        Self {
            permission: Some(Permission::new(resource, action)),
            ..Self::default()
        }
    }

    pub fn any_role(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            require_all: false,
            ..Self::default()
        }
    }

    pub fn all_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            require_all: true,
            ..Self::default()
        }
    }

    pub fn and_roles(mut self, roles: impl IntoIterator<Item = Role>, require_all: bool) -> Self {
        self.roles = roles.into_iter().collect();
        self.require_all = require_all;
        self
    }

    fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(Role::as_str).collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    MissingPermission(Permission),

    #[error("forbidden: missing roles {roles:?} (require_all = {require_all})")]
    MissingRoles { roles: Vec<Role>, require_all: bool },
}

/// Decide whether `user` satisfies `rule`.
///
/// - No IO
/// - No panics
/// - `None` (no logged-in user) is always `Unauthenticated`
pub fn authorize(user: Option<&UserProfile>, rule: &AccessRule) -> Result<(), AuthzError> {
    let Some(user) = user else {
        return Err(AuthzError::Unauthenticated);
    };

    if let Some(required) = &rule.permission {
        if !user.has_permission(&required.resource, &required.action) {
            return Err(AuthzError::MissingPermission(required.clone()));
        }
    }

    if !rule.roles.is_empty() {
        let names = rule.role_names();
        let held = if rule.require_all {
            user.has_all_roles(&names)
        } else {
            user.has_any_role(&names)
        };
        if !held {
            return Err(AuthzError::MissingRoles {
                roles: rule.roles.clone(),
                require_all: rule.require_all,
            });
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of a gate decision, shown on the unauthorized page and
/// written to the debug log.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub granted: bool,
    pub reason: String,
    pub required_permission: Option<String>,
    pub required_roles: Vec<String>,
    pub require_all: bool,
    pub held_roles: Vec<String>,
    pub held_permissions: Vec<String>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Unauthenticated,
    MissingPermission,
    MissingRoles,
}

/// Explain why [`authorize`] would allow or deny `user` for `rule`.
pub fn explain_authorization(
    user: Option<&UserProfile>,
    rule: &AccessRule,
) -> AuthorizationExplanation {
    let (held_roles, held_permissions) = match user {
        Some(u) => {
            let mut roles: Vec<String> = u.roles.iter().map(|r| r.to_string()).collect();
            let mut perms: Vec<String> = u.permissions.iter().map(|p| p.to_string()).collect();
            roles.sort();
            perms.sort();
            (roles, perms)
        }
        None => (Vec::new(), Vec::new()),
    };

    let mut explanation = AuthorizationExplanation {
        granted: false,
        reason: String::new(),
        required_permission: rule.permission.as_ref().map(|p| p.to_string()),
        required_roles: rule.roles.iter().map(|r| r.to_string()).collect(),
        require_all: rule.require_all,
        held_roles,
        held_permissions,
        denial_reason: None,
    };

    match authorize(user, rule) {
        Ok(()) => {
            explanation.granted = true;
            explanation.reason = match (&rule.permission, rule.roles.is_empty()) {
                (None, true) => "User is authenticated".to_string(),
                (Some(p), true) => format!("User holds permission '{p}'"),
                (None, false) => "User holds the required roles".to_string(),
                (Some(p), false) => format!("User holds permission '{p}' and the required roles"),
            };
        }
        Err(AuthzError::Unauthenticated) => {
            explanation.reason = "No user is logged in".to_string();
            explanation.denial_reason = Some(DenialReason {
                kind: DenialKind::Unauthenticated,
                message: "Authentication required".to_string(),
                suggestions: vec!["Log in and retry".to_string()],
            });
        }
        Err(AuthzError::MissingPermission(p)) => {
            explanation.reason = format!(
                "User does not have permission '{}'. Current permissions: {:?}",
                p, explanation.held_permissions
            );
            explanation.denial_reason = Some(DenialReason {
                kind: DenialKind::MissingPermission,
                message: format!("Missing required permission: '{p}'"),
                suggestions: vec![
                    format!("Assign a role that grants '{p}'"),
                    "Ask an administrator to review your role assignments".to_string(),
                ],
            });
        }
        Err(AuthzError::MissingRoles { roles, require_all }) => {
            let missing: Vec<String> = roles
                .iter()
                .map(|r| r.to_string())
                .filter(|r| !explanation.held_roles.contains(r))
                .collect();
            explanation.reason = format!(
                "User holds roles {:?}; {} of {:?} required",
                explanation.held_roles,
                if require_all { "all" } else { "one" },
                explanation.required_roles
            );
            explanation.denial_reason = Some(DenialReason {
                kind: DenialKind::MissingRoles,
                message: format!("Missing roles: {missing:?}"),
                suggestions: missing
                    .iter()
                    .map(|r| format!("Request the '{r}' role"))
                    .collect(),
            });
        }
    }

    explanation
}

#[cfg(test)]
mod tests {
    use super::*;
    use antco_core::UserId;
    use proptest::prelude::*;

    fn reader() -> UserProfile {
        UserProfile::new(UserId::new("u-1"), "a@b.com")
            .with_roles([Role::new("Editor"), Role::new("Viewer")])
            .with_permissions([Permission::new("users", "read")])
    }

    #[test]
    fn permission_rule() {
        let user = reader();
        assert_eq!(authorize(Some(&user), &AccessRule::permission("users", "read")), Ok(()));
        assert_eq!(
            authorize(Some(&user), &AccessRule::permission("users", "write")),
            Err(AuthzError::MissingPermission(Permission::new("users", "write")))
        );
    }

    #[test]
    fn require_all_toggles_and_vs_or() {
        let user = reader();
        let roles = [Role::new("Editor"), Role::new("Admin")];
        assert_eq!(authorize(Some(&user), &AccessRule::any_role(roles.clone())), Ok(()));
        assert!(matches!(
            authorize(Some(&user), &AccessRule::all_roles(roles)),
            Err(AuthzError::MissingRoles { require_all: true, .. })
        ));
    }

    #[test]
    fn permission_is_checked_before_roles() {
        let user = reader();
        let rule = AccessRule::permission("roles", "delete").and_roles([Role::new("Nobody")], false);
        assert!(matches!(
            authorize(Some(&user), &rule),
            Err(AuthzError::MissingPermission(_))
        ));
    }

    #[test]
    fn explanation_lists_missing_roles() {
        let user = reader();
        let rule = AccessRule::all_roles([Role::new("Editor"), Role::new("Admin")]);
        let explanation = explain_authorization(Some(&user), &rule);
        assert!(!explanation.granted);
        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingRoles);
        assert_eq!(denial.suggestions, vec!["Request the 'Admin' role".to_string()]);
    }

    #[test]
    fn explanation_for_granted_rule() {
        let user = reader();
        let explanation = explain_authorization(Some(&user), &AccessRule::permission("users", "read"));
        assert!(explanation.granted);
        assert_eq!(explanation.held_permissions, vec!["users.read".to_string()]);
        assert!(explanation.denial_reason.is_none());
    }

    proptest! {
        #[test]
        fn anonymous_is_always_unauthenticated(
            resource in "[a-z]{1,8}",
            action in "[a-z]{1,8}",
            roles in prop::collection::vec("[A-Z][a-z]{0,6}", 0..4),
            require_all in any::<bool>(),
        ) {
            let rule = AccessRule::permission(resource, action)
                .and_roles(roles.into_iter().map(Role::new), require_all);
            prop_assert_eq!(authorize(None, &rule), Err(AuthzError::Unauthenticated));
            prop_assert!(!explain_authorization(None, &rule).granted);
        }
    }
}
