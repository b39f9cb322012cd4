//! Session Store: who is logged in and what they may do.
//!
//! The store is the single source of truth for authorization decisions. Its
//! state changes only through the transitions below, each published on a
//! `watch` channel so gates and other views can re-evaluate.
//!
//! Only `{user, isAuthenticated}` survive a restart, under [`SESSION_STORAGE_KEY`].
//! Tokens live in the [`TokenStore`] and are never written here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use antco_auth::{UserProfile, UserProfilePatch};

use crate::api::AuthApi;
use crate::error::{ClientError, ClientResult};
use crate::http::SessionListener;
use crate::storage::Storage;
use crate::token_store::TokenStore;
use crate::types::{LoginRequest, LoginResponse, RegisterRequest, VerifySmsCodeRequest};

pub const SESSION_STORAGE_KEY: &str = "auth-storage";

/// Snapshot of the session. `is_authenticated` implies `user.is_some()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// The persisted subset of a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
}

impl Session {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn authenticated(user: UserProfile) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
            error: None,
        }
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            is_authenticated: self.is_authenticated,
        }
    }

    /// Rebuild a provisional session; the caller reconciles it with
    /// [`SessionStore::check_auth`]. A flag without a user is dropped.
    pub fn from_persisted(persisted: PersistedSession) -> Self {
        let is_authenticated = persisted.is_authenticated && persisted.user.is_some();
        Self {
            user: persisted.user,
            is_authenticated,
            is_loading: false,
            error: None,
        }
    }

    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.has_permission(resource, action))
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_role(name))
    }

    pub fn has_any_role<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_any_role(names))
    }

    pub fn has_all_roles<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_all_roles(names))
    }
}

pub struct SessionStore {
    auth: AuthApi,
    tokens: TokenStore,
    storage: Arc<dyn Storage>,
    state: watch::Sender<Session>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// A store that starts logged out, ignoring anything persisted.
    pub fn new(auth: AuthApi, tokens: TokenStore, storage: Arc<dyn Storage>) -> Self {
        let (state, _) = watch::channel(Session::logged_out());
        Self {
            auth,
            tokens,
            storage,
            state,
        }
    }

    /// A store seeded from the persisted session, as at application start.
    /// A persisted login without stored tokens cannot be resumed and is reset.
    pub fn restore(auth: AuthApi, tokens: TokenStore, storage: Arc<dyn Storage>) -> Self {
        let store = Self::new(auth, tokens, storage);
        let Some(persisted) = store.load_persisted() else {
            return store;
        };

        let session = Session::from_persisted(persisted);
        if session.is_authenticated && !store.tokens.has_tokens() {
            tracing::info!("persisted session has no tokens; starting logged out");
            store.reset_logged_out();
        } else {
            tracing::debug!(authenticated = session.is_authenticated, "restored persisted session");
            store.state.send_replace(session);
        }
        store
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user.clone()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Exchange credentials for a session. On failure the session records the
    /// message and the error is also returned so the caller can show it.
    pub async fn login(&self, credentials: LoginRequest) -> ClientResult<()> {
        self.begin_credential_exchange();
        let result = self.auth.login(&credentials).await;
        self.finish_credential_exchange(result, "Login failed").await
    }

    /// Create an account; the Auth API logs the new user straight in.
    pub async fn register(&self, data: RegisterRequest) -> ClientResult<()> {
        self.begin_credential_exchange();
        let result = self.auth.register(&data).await;
        self.finish_credential_exchange(result, "Registration failed").await
    }

    /// Complete an SMS-code login (the forgot-password flow).
    pub async fn verify_sms_code(&self, data: VerifySmsCodeRequest) -> ClientResult<()> {
        self.begin_credential_exchange();
        let result = self.auth.verify_sms_code(&data).await;
        self.finish_credential_exchange(result, "Verification failed").await
    }

    /// Always ends logged out with no tokens, whatever the server says.
    pub async fn logout(&self) {
        self.state.send_modify(|s| s.is_loading = true);

        if let Err(err) = self.auth.logout().await {
            tracing::warn!("server-side logout failed: {}", err.message());
        }

        self.tokens.clear_tokens();
        self.state.send_replace(Session::logged_out());
        self.persist();
        tracing::info!("logged out");
    }

    /// Reconcile the session with the server. Any failure means "not logged
    /// in": tokens are cleared and no error is recorded.
    pub async fn check_auth(&self) {
        if !self.tokens.has_tokens() {
            tracing::debug!("check_auth: no tokens stored");
            self.reset_logged_out();
            return;
        }

        self.state.send_modify(|s| s.is_loading = true);
        match self.auth.me().await {
            Ok(user) => {
                tracing::debug!(user = %user.id, "session validated");
                self.state.send_replace(Session::authenticated(user));
                self.persist();
            }
            Err(err) => {
                tracing::info!("session not valid ({}); logging out locally", err.message());
                self.tokens.clear_tokens();
                self.reset_logged_out();
            }
        }
    }

    /// Shallow-merge `patch` into the current user; no-op when logged out.
    pub fn update_user(&self, patch: UserProfilePatch) {
        let changed = self.state.send_if_modified(|s| match s.user.as_mut() {
            Some(user) => {
                user.apply(patch);
                true
            }
            None => false,
        });
        if changed {
            self.persist();
        }
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.state.borrow().has_permission(resource, action)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.state.borrow().has_role(name)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.state.borrow().has_any_role(names)
    }

    pub fn has_all_roles<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.state.borrow().has_all_roles(names)
    }

    fn begin_credential_exchange(&self) {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    async fn finish_credential_exchange(
        &self,
        result: ClientResult<LoginResponse>,
        fallback: &str,
    ) -> ClientResult<()> {
        let outcome = match result {
            Ok(grant) => self.establish(grant).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(user) => {
                tracing::info!(user = %user.id, "logged in");
                self.state.send_replace(Session::authenticated(user));
                self.persist();
                Ok(())
            }
            Err(err) => {
                let message = err.message();
                let message = if message.trim().is_empty() {
                    fallback.to_string()
                } else {
                    message
                };
                tracing::info!("credential exchange failed: {message}");
                self.state.send_replace(Session {
                    error: Some(message),
                    ..Session::logged_out()
                });
                self.persist();
                Err(err)
            }
        }
    }

    /// Store the granted tokens and resolve the user, fetching the profile
    /// when the grant does not carry it.
    async fn establish(&self, grant: LoginResponse) -> Result<UserProfile, ClientError> {
        self.tokens.set_token_set(&grant.token_set());
        match grant.user {
            Some(user) => Ok(user),
            None => match self.auth.me().await {
                Ok(user) => Ok(user),
                Err(err) => {
                    self.tokens.clear_tokens();
                    Err(err)
                }
            },
        }
    }

    fn reset_logged_out(&self) {
        self.state.send_replace(Session::logged_out());
        self.persist();
    }

    fn load_persisted(&self) -> Option<PersistedSession> {
        let raw = self.storage.get(SESSION_STORAGE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(persisted) => Some(persisted),
            Err(err) => {
                tracing::warn!("discarding unreadable persisted session: {err}");
                None
            }
        }
    }

    fn persist(&self) {
        let persisted = self.state.borrow().to_persisted();
        match serde_json::to_string(&persisted) {
            Ok(json) => self.storage.set(SESSION_STORAGE_KEY, &json),
            Err(err) => tracing::error!("failed to encode session for storage: {err}"),
        }
    }
}

/// A failed refresh has already cleared the tokens; drop the user too.
impl SessionListener for SessionStore {
    fn session_lost(&self) {
        tracing::info!("session lost after failed token refresh");
        self.reset_logged_out();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::api::UsersApi;
    use crate::error::AuthFailure;
    use crate::http::{HttpClient, REFRESH_TOKEN_PATH};
    use crate::navigation::RecordingNavigator;
    use crate::storage::MemoryStorage;
    use crate::testing::{Reply, ScriptedTransport};
    use antco_auth::{Permission, Role};
    use antco_core::UserId;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    struct Harness {
        store: Arc<SessionStore>,
        http: Arc<HttpClient>,
        transport: Arc<ScriptedTransport>,
        storage: Arc<MemoryStorage>,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness_with(storage: Arc<MemoryStorage>, transport: ScriptedTransport) -> Harness {
        let transport = Arc::new(transport);
        let navigator = Arc::new(RecordingNavigator::new());
        let tokens = TokenStore::new(storage.clone());
        let http = Arc::new(HttpClient::new(
            ClientConfig::new("http://auth.test", "http://admin.test"),
            transport.clone(),
            tokens.clone(),
            navigator.clone(),
        ));
        let store = Arc::new(SessionStore::restore(
            AuthApi::new(http.clone()),
            tokens,
            storage.clone(),
        ));
        let listener: std::sync::Weak<dyn SessionListener> = Arc::downgrade(&store) as std::sync::Weak<SessionStore>;
        http.on_session_lost(listener);
        Harness {
            store,
            http,
            transport,
            storage,
            navigator,
        }
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        harness_with(Arc::new(MemoryStorage::new()), transport)
    }

    fn profile_json() -> Value {
        json!({
            "id": "u-1",
            "email": "a@b.com",
            "fullName": "Ann Bee",
            "roles": [{"name": "Admin"}],
            "permissions": [{"resource": "users", "action": "read"}]
        })
    }

    fn auth_backend() -> ScriptedTransport {
        ScriptedTransport::new(|req| {
            let path = req.url.trim_start_matches("http://auth.test");
            match path {
                "/auth/login" => {
                    let body = req.body.clone().unwrap_or(Value::Null);
                    if body["password"] == "x" {
                        Reply::json(
                            200,
                            json!({
                                "accessToken": "a1",
                                "refreshToken": "r1",
                                "tokenType": "Bearer",
                                "expiresIn": 3600,
                                "user": profile_json()
                            }),
                        )
                    } else {
                        Reply::json(401, json!({"message": "Invalid email or password"}))
                    }
                }
                "/auth/me" if req.bearer_token() == Some("a1") => Reply::json(200, profile_json()),
                "/auth/me" => Reply::json(401, json!({"message": "expired"})),
                "/auth/logout" => Reply::json(204, Value::Null),
                _ => Reply::json(404, Value::Null),
            }
        })
    }

    #[tokio::test]
    async fn login_grants_permissions_from_profile() {
        let h = harness(auth_backend());
        h.store
            .login(LoginRequest::new("a@b.com", "x"))
            .await
            .unwrap();

        let session = h.store.snapshot();
        assert!(session.is_authenticated);
        assert!(!session.is_loading);
        assert_eq!(session.error, None);
        assert!(h.store.has_permission("users", "read"));
        assert!(!h.store.has_permission("users", "write"));
        assert!(h.store.has_role("Admin"));
        assert_eq!(h.store.tokens().access_token().as_deref(), Some("a1"));

        let persisted: PersistedSession =
            serde_json::from_str(&h.storage.get(SESSION_STORAGE_KEY).unwrap()).unwrap();
        assert!(persisted.is_authenticated);
        assert!(!h.storage.get(SESSION_STORAGE_KEY).unwrap().contains("a1"));
    }

    #[tokio::test]
    async fn failed_login_records_message_and_returns_error() {
        let h = harness(auth_backend());
        let err = h
            .store
            .login(LoginRequest::new("a@b.com", "wrong"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        let session = h.store.snapshot();
        assert!(!session.is_authenticated);
        assert!(session.user.is_none());
        assert_eq!(session.error.as_deref(), Some("Invalid email or password"));
        assert_eq!(h.transport.count_matching(REFRESH_TOKEN_PATH), 0);

        h.store.clear_error();
        assert_eq!(h.store.snapshot().error, None);
    }

    #[tokio::test]
    async fn login_without_user_in_grant_fetches_profile() {
        let h = harness(ScriptedTransport::new(|req| {
            if req.url.ends_with("/auth/login") {
                Reply::json(200, json!({"accessToken": "a1", "refreshToken": "r1"}))
            } else if req.url.ends_with("/auth/me") && req.bearer_token() == Some("a1") {
                Reply::json(200, profile_json())
            } else {
                Reply::json(500, Value::Null)
            }
        }));
        h.store.login(LoginRequest::new("a@b.com", "x")).await.unwrap();
        assert_eq!(h.store.user().unwrap().id, UserId::new("u-1"));
    }

    #[tokio::test]
    async fn logout_is_terminal_even_when_server_fails() {
        for server_ok in [true, false] {
            let h = harness(ScriptedTransport::new(move |req| {
                if req.url.ends_with("/auth/logout") {
                    if server_ok {
                        Reply::json(200, Value::Null)
                    } else {
                        Reply::Fail("connection reset".into())
                    }
                } else {
                    Reply::json(200, json!({"accessToken": "a1", "refreshToken": "r1", "user": profile_json()}))
                }
            }));
            h.store.login(LoginRequest::new("a@b.com", "x")).await.unwrap();

            h.store.logout().await;

            let session = h.store.snapshot();
            assert!(!session.is_authenticated);
            assert!(session.user.is_none());
            assert!(!session.is_loading);
            assert_eq!(h.store.tokens().access_token(), None);
            assert_eq!(h.store.tokens().refresh_token(), None);
            let persisted: PersistedSession =
                serde_json::from_str(&h.storage.get(SESSION_STORAGE_KEY).unwrap()).unwrap();
            assert_eq!(persisted, PersistedSession::default());
        }
    }

    #[tokio::test]
    async fn check_auth_with_expired_token_logs_out_silently() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("access_token", "stale");
        storage.set("refresh_token", "r-stale");
        storage.set(
            SESSION_STORAGE_KEY,
            &json!({"user": profile_json(), "isAuthenticated": true}).to_string(),
        );
        let h = harness_with(
            storage,
            ScriptedTransport::new(|req| {
                if req.url.ends_with(REFRESH_TOKEN_PATH) {
                    Reply::json(401, json!({"message": "refresh token revoked"}))
                } else {
                    Reply::json(401, json!({"message": "expired"}))
                }
            }),
        );
        assert!(h.store.is_authenticated(), "restored provisionally");

        h.store.check_auth().await;

        let session = h.store.snapshot();
        assert!(!session.is_authenticated);
        assert!(session.user.is_none());
        assert_eq!(session.error, None);
        assert!(!h.store.tokens().has_tokens());
        assert_eq!(h.navigator.visits(), vec!["/auth/login".to_string()]);
    }

    #[tokio::test]
    async fn failed_refresh_on_admin_call_ends_the_session() {
        let h = harness(ScriptedTransport::new(|req| {
            if req.url.ends_with("/auth/login") {
                Reply::json(200, json!({"accessToken": "a1", "refreshToken": "r1", "user": profile_json()}))
            } else if req.url.ends_with(REFRESH_TOKEN_PATH) {
                Reply::json(500, json!({"message": "refresh unavailable"}))
            } else {
                Reply::json(401, json!({"message": "token expired"}))
            }
        }));
        h.store.login(LoginRequest::new("a@b.com", "x")).await.unwrap();
        let rx = h.store.subscribe();

        let err = UsersApi::new(h.http.clone())
            .get(&UserId::new("u-2"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Auth(AuthFailure::RefreshFailed { status: Some(500), .. })
        ));
        assert!(rx.has_changed().unwrap());
        let session = h.store.snapshot();
        assert!(!session.is_authenticated);
        assert!(session.user.is_none());
        assert!(!h.store.tokens().has_tokens());
        let persisted: PersistedSession =
            serde_json::from_str(&h.storage.get(SESSION_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(persisted, PersistedSession::default());
        assert_eq!(h.navigator.visits(), vec!["/auth/login".to_string()]);
    }

    #[test]
    fn persisted_login_without_tokens_is_not_resumed() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(
            SESSION_STORAGE_KEY,
            &json!({"user": profile_json(), "isAuthenticated": true}).to_string(),
        );
        let h = harness_with(storage, auth_backend());

        assert!(!h.store.is_authenticated());
        assert!(h.store.user().is_none());
        let persisted: PersistedSession =
            serde_json::from_str(&h.storage.get(SESSION_STORAGE_KEY).unwrap()).unwrap();
        assert!(!persisted.is_authenticated);
    }

    #[tokio::test]
    async fn check_auth_without_tokens_skips_the_network() {
        let h = harness(auth_backend());
        h.store.check_auth().await;
        assert!(!h.store.is_authenticated());
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn check_auth_populates_user_from_server() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("access_token", "a1");
        storage.set("refresh_token", "r1");
        let h = harness_with(storage, auth_backend());
        assert!(!h.store.is_authenticated());

        h.store.check_auth().await;
        assert!(h.store.is_authenticated());
        assert!(h.store.has_role("Admin"));
    }

    #[tokio::test]
    async fn update_user_merges_and_is_noop_when_logged_out() {
        let h = harness(auth_backend());
        let mut rx = h.store.subscribe();
        h.store.update_user(UserProfilePatch {
            first_name: Some("Nobody".into()),
            ..Default::default()
        });
        assert!(h.store.user().is_none());
        assert!(!rx.has_changed().unwrap());

        h.store.login(LoginRequest::new("a@b.com", "x")).await.unwrap();
        h.store.update_user(UserProfilePatch {
            phone_number: Some("+84 900 000 000".into()),
            ..Default::default()
        });
        let user = h.store.user().unwrap();
        assert_eq!(user.phone_number.as_deref(), Some("+84 900 000 000"));
        assert_eq!(user.full_name, "Ann Bee");
    }

    #[test]
    fn from_persisted_drops_flag_without_user() {
        let session = Session::from_persisted(PersistedSession {
            user: None,
            is_authenticated: true,
        });
        assert!(!session.is_authenticated);
    }

    #[test]
    fn role_semantics_on_session() {
        let user = UserProfile::new(UserId::new("u"), "u@x").with_roles([Role::new("A"), Role::new("B")]);
        let session = Session::authenticated(user);
        assert!(session.has_all_roles(&["A", "B"]));
        assert!(!session.has_all_roles(&["A", "C"]));
        assert!(session.has_any_role(&["C", "A"]));
    }

    proptest! {
        #[test]
        fn predicates_are_false_without_user(
            resource in ".{0,12}",
            action in ".{0,12}",
            names in prop::collection::vec(".{0,8}", 0..5),
        ) {
            let session = Session::logged_out();
            prop_assert!(!session.has_permission(&resource, &action));
            prop_assert!(!session.has_role(names.first().map(String::as_str).unwrap_or("")));
            prop_assert!(!session.has_any_role(names.as_slice()));
            prop_assert!(!session.has_all_roles(names.as_slice()));
        }

        #[test]
        fn permission_match_is_exact(resource in "[a-z]{1,6}", action in "[a-z]{1,6}") {
            let user = UserProfile::new(UserId::new("u"), "u@x")
                .with_permissions([Permission::new(resource.clone(), action.clone())]);
            let session = Session::authenticated(user);
            prop_assert!(session.has_permission(&resource, &action));
            let other_action = format!("{action}x");
            prop_assert!(!session.has_permission(&resource, &other_action));
        }
    }
}
