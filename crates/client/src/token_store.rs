//! Token Store: the only owner of the access/refresh token pair.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use antco_auth::TokenSet;

use crate::storage::Storage;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const TOKEN_EXPIRES_AT_KEY: &str = "token_expires_at";

/// Synchronous accessor for the persisted tokens.
///
/// Writes are visible to the next read immediately. Token contents are never
/// inspected; empty strings read back as absent.
#[derive(Debug, Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn has_tokens(&self) -> bool {
        self.access_token().is_some() || self.refresh_token().is_some()
    }

    /// Overwrite both tokens. Any stored expiry belonged to the previous pair
    /// and is dropped.
    pub fn set_tokens(&self, access: &str, refresh: &str) {
        self.storage.set(ACCESS_TOKEN_KEY, access);
        self.storage.set(REFRESH_TOKEN_KEY, refresh);
        self.storage.remove(TOKEN_EXPIRES_AT_KEY);
    }

    pub fn set_token_set(&self, tokens: &TokenSet) {
        self.set_tokens(&tokens.access_token, &tokens.refresh_token);
        if let Some(at) = tokens.expires_at {
            self.storage.set(TOKEN_EXPIRES_AT_KEY, &at.to_rfc3339());
        }
    }

    /// Both tokens plus the expiry, when a full pair is stored.
    pub fn token_set(&self) -> Option<TokenSet> {
        let access = self.access_token()?;
        let refresh = self.refresh_token()?;
        let expires_at = self
            .read(TOKEN_EXPIRES_AT_KEY)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc));
        Some(TokenSet {
            access_token: access,
            refresh_token: refresh,
            expires_at,
        })
    }

    pub fn clear_tokens(&self) {
        self.storage.remove(ACCESS_TOKEN_KEY);
        self.storage.remove(REFRESH_TOKEN_KEY);
        self.storage.remove(TOKEN_EXPIRES_AT_KEY);
    }

    fn read(&self, key: &str) -> Option<String> {
        self.storage.get(key).filter(|v| !v.is_empty())
    }
}
