//! Navigation side effects and route constants.
//!
//! Soft (in-app) redirects are values the caller acts on. Hard redirects, used
//! only when the session is unrecoverable, go through a [`Navigator`].

use parking_lot::Mutex;

pub mod routes {
    pub const ROOT: &str = "/";
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const DASHBOARD: &str = "/dashboard";
    pub const USERS: &str = "/users";
    pub const ROLES: &str = "/roles";
    pub const PERMISSIONS: &str = "/permissions";
    pub const PROFILE: &str = "/profile";
    pub const SETTINGS: &str = "/settings";
    pub const UNAUTHORIZED: &str = "/unauthorized";
    pub const NOT_FOUND: &str = "/404";
}

/// Performs full-page navigation, discarding in-memory application state.
pub trait Navigator: Send + Sync {
    fn hard_redirect(&self, path: &str);
}

/// Navigator for headless embeddings: records the redirect in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn hard_redirect(&self, path: &str) {
        tracing::warn!(target: "antco_client::navigation", path, "hard redirect");
    }
}

/// Navigator that remembers every hard redirect, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn hard_redirect(&self, path: &str) {
        self.visits.lock().push(path.to_string());
    }
}

/// An in-app redirect: replace the current location with `to`, remembering
/// `from` so the user can be sent back after logging in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    pub from: Option<String>,
}

impl Redirect {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            to: path.into(),
            from: None,
        }
    }

    pub fn from_location(mut self, location: impl Into<String>) -> Self {
        self.from = Some(location.into());
        self
    }
}
