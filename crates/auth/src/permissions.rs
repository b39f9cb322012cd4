use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission claim: an `action` allowed on a `resource` (e.g. `users` / `read`).
///
/// Matching is exact on both fields. There is no wildcard: the Auth API
/// expands grants before issuing the profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Cow<'static, str>,
    pub action: Cow<'static, str>,
}

impl Permission {
    pub fn new(
        resource: impl Into<Cow<'static, str>>,
        action: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}
