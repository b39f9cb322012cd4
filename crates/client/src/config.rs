//! Client configuration: backend origins, timeout, login entry point.

use std::time::Duration;

use crate::http::Service;
use crate::navigation::routes;

pub const AUTH_API_URL_ENV: &str = "ANTCO_AUTH_API_URL";
pub const ADMIN_API_URL_ENV: &str = "ANTCO_ADMIN_API_URL";
pub const DEFAULT_API_BASE_URL: &str = "https://api.example.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub auth_base_url: String,
    pub admin_base_url: String,
    /// Per-request timeout applied by the transport, refresh calls included.
    pub timeout: Duration,
    /// Where a failed refresh hard-redirects, and where the gate sends
    /// unauthenticated users.
    pub login_path: String,
}

impl ClientConfig {
    pub fn new(auth_base_url: impl Into<String>, admin_base_url: impl Into<String>) -> Self {
        Self {
            auth_base_url: normalize_base_url(auth_base_url.into()),
            admin_base_url: normalize_base_url(admin_base_url.into()),
            timeout: DEFAULT_TIMEOUT,
            login_path: routes::LOGIN.to_string(),
        }
    }

    /// Read both origins from the environment, falling back to the default
    /// origin with a warning.
    pub fn from_env() -> Self {
        let auth = std::env::var(AUTH_API_URL_ENV).unwrap_or_else(|_| {
            tracing::warn!("{AUTH_API_URL_ENV} not set; using {DEFAULT_API_BASE_URL}");
            DEFAULT_API_BASE_URL.to_string()
        });
        let admin = std::env::var(ADMIN_API_URL_ENV).unwrap_or_else(|_| {
            tracing::warn!("{ADMIN_API_URL_ENV} not set; using {DEFAULT_API_BASE_URL}");
            DEFAULT_API_BASE_URL.to_string()
        });
        Self::new(auth, admin)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth_base_url,
            Service::Admin => &self.admin_base_url,
        }
    }

    /// Join a service origin and an absolute API path.
    pub fn url(&self, service: Service, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url(service), path)
        } else {
            format!("{}/{}", self.base_url(service), path)
        }
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
