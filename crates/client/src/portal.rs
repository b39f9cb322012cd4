//! Composition root: one shared HTTP core, the API bindings on top of it,
//! the session store and its gate.

use std::sync::{Arc, Weak};

use anyhow::Context;

use crate::api::{AuthApi, PermissionsApi, RolesApi, UsersApi};
use crate::config::ClientConfig;
use crate::gate::AuthGate;
use crate::http::{HttpClient, SessionListener};
use crate::navigation::{LogNavigator, Navigator};
use crate::session::SessionStore;
use crate::storage::{FileStorage, Storage};
use crate::token_store::TokenStore;
use crate::transport::{ReqwestTransport, Transport};

#[derive(Debug, Clone)]
pub struct AdminPortal {
    http: Arc<HttpClient>,
    auth: AuthApi,
    users: UsersApi,
    roles: RolesApi,
    permissions: PermissionsApi,
    session: Arc<SessionStore>,
    gate: AuthGate,
}

impl AdminPortal {
    /// Wire the client from its seams. The session is restored from `storage`
    /// provisionally; call [`SessionStore::check_auth`] (or enter a gate) to
    /// reconcile it with the server.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let tokens = TokenStore::new(storage.clone());
        let http = Arc::new(HttpClient::new(config, transport, tokens.clone(), navigator));
        let auth = AuthApi::new(http.clone());
        let session = Arc::new(SessionStore::restore(auth.clone(), tokens, storage));
        let listener: Weak<dyn SessionListener> = Arc::downgrade(&session) as Weak<SessionStore>;
        http.on_session_lost(listener);

        Self {
            users: UsersApi::new(http.clone()),
            roles: RolesApi::new(http.clone()),
            permissions: PermissionsApi::new(http.clone()),
            gate: AuthGate::new(session.clone()),
            auth,
            session,
            http,
        }
    }

    /// Production wiring: tracing, environment config, on-disk storage and
    /// the reqwest transport.
    pub fn bootstrap() -> anyhow::Result<Self> {
        antco_observability::init();

        let config = ClientConfig::from_env();
        let storage = FileStorage::open_default().context("opening client storage")?;
        tracing::info!(path = %storage.path().display(), "client storage opened");
        let transport =
            ReqwestTransport::new(config.timeout).context("building HTTP transport")?;

        Ok(Self::new(
            config,
            Arc::new(transport),
            Arc::new(storage),
            Arc::new(LogNavigator),
        ))
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn users(&self) -> &UsersApi {
        &self.users
    }

    pub fn roles(&self) -> &RolesApi {
        &self.roles
    }

    pub fn permissions(&self) -> &PermissionsApi {
        &self.permissions
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }
}
