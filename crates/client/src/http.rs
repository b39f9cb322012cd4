//! HTTP client core: bearer attachment and refresh-on-401 coordination.
//!
//! One [`HttpClient`] is built per process and shared (by `Arc`) by every API
//! module of both backends. It owns the refresh lock and the pending-request
//! queue:
//!
//! - A first-attempt request answered with 401 either starts a refresh (if
//!   none is running) or parks behind the running one.
//! - The task that started the refresh replays its own request and then every
//!   parked request, in arrival order, each exactly once with the new token.
//! - Replays are never retried again: a second 401 is final.
//! - A failed refresh clears the tokens, tells the registered
//!   [`SessionListener`] the session is gone, rejects every parked request
//!   with the same error and hard-redirects to the login page.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::oneshot;

use crate::config::ClientConfig;
use crate::error::{AuthFailure, ClientError, ClientResult, server_message};
use crate::navigation::Navigator;
use crate::token_store::TokenStore;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

pub const REFRESH_TOKEN_PATH: &str = "/auth/refresh-token";

/// Which backend a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    Admin,
}

/// A request as the API modules describe it, before token attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub service: Service,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Credential endpoints (login, register, SMS) answer 401 for bad
    /// credentials, not for an expired session; those 401s are final.
    pub recover_unauthorized: bool,
}

impl ApiRequest {
    pub fn new(service: Service, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            recover_unauthorized: true,
        }
    }

    pub fn get(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Get, path)
    }

    pub fn post(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Post, path)
    }

    pub fn put(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Put, path)
    }

    pub fn delete(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Delete, path)
    }

    pub fn with_query(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_body<T: serde::Serialize>(self, body: &T) -> ClientResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::Decode(format!("failed to encode request body: {e}")))?;
        Ok(self.with_json(value))
    }

    pub fn without_refresh(mut self) -> Self {
        self.recover_unauthorized = false;
        self
    }
}

/// A request parked behind an in-flight refresh.
struct Waiter {
    request: ApiRequest,
    reply: oneshot::Sender<ClientResult<Value>>,
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Waiter>,
}

/// Outcome of taking the refresh lock.
enum Turn {
    Lead(ApiRequest),
    Wait(oneshot::Receiver<ClientResult<Value>>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Told when a refresh fails and the session cannot be recovered.
pub trait SessionListener: Send + Sync {
    fn session_lost(&self);
}

pub struct HttpClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    refresh: Mutex<RefreshState>,
    listener: Mutex<Option<Weak<dyn SessionListener>>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: TokenStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            navigator,
            refresh: Mutex::new(RefreshState::default()),
            listener: Mutex::new(None),
        }
    }

    /// Register the owner of the session state. Held weakly; a later call
    /// replaces the earlier listener.
    pub fn on_session_lost(&self, listener: Weak<dyn SessionListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.lock().refreshing
    }

    /// Number of requests currently parked behind a refresh.
    pub fn pending(&self) -> usize {
        self.refresh.lock().queue.len()
    }

    /// Execute `request` and decode the response body into `T`.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let value = self.execute(request).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Execute `request`, ignoring any response body.
    pub async fn send_unit(&self, request: ApiRequest) -> ClientResult<()> {
        self.execute(request).await.map(|_| ())
    }

    /// Execute `request`, recovering from one expired access token.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<Value> {
        let response = self.dispatch(&request).await?;
        if response.status == 401 && request.recover_unauthorized {
            tracing::debug!(method = %request.method, path = %request.path, "401; entering refresh");
            return self.recover(request).await;
        }
        into_result(response)
    }

    async fn recover(&self, request: ApiRequest) -> ClientResult<Value> {
        let turn = {
            let mut state = self.refresh.lock();
            if state.refreshing {
                let (reply, rx) = oneshot::channel();
                state.queue.push_back(Waiter { request, reply });
                tracing::debug!(queued = state.queue.len(), "refresh in flight; request parked");
                Turn::Wait(rx)
            } else {
                state.refreshing = true;
                Turn::Lead(request)
            }
        };

        match turn {
            Turn::Wait(rx) => match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(AuthFailure::RefreshAborted.into()),
            },
            Turn::Lead(request) => self.lead_refresh(request).await,
        }
    }

    async fn lead_refresh(&self, request: ApiRequest) -> ClientResult<Value> {
        let guard = RefreshGuard {
            state: &self.refresh,
            settled: false,
        };
        let outcome = self.refresh_tokens().await;
        let parked = guard.settle();

        match outcome {
            Ok(()) => {
                tracing::debug!(replays = parked.len() + 1, "refresh succeeded; replaying");
                let own = self.replay(&request);
                let others = futures::future::join_all(parked.into_iter().map(|waiter| async move {
                    let result = self.replay(&waiter.request).await;
                    // The caller may have gone away; that is fine.
                    let _ = waiter.reply.send(result);
                }));
                let (own, _) = futures::join!(own, others);
                own
            }
            Err(err) => {
                tracing::warn!(rejected = parked.len() + 1, "token refresh failed: {err}");
                self.tokens.clear_tokens();
                self.notify_session_lost();
                for waiter in parked {
                    let _ = waiter.reply.send(Err(err.clone()));
                }
                self.navigator.hard_redirect(&self.config.login_path);
                Err(err)
            }
        }
    }

    fn notify_session_lost(&self) {
        let listener = self.listener.lock().as_ref().and_then(Weak::upgrade);
        match listener {
            Some(listener) => listener.session_lost(),
            None => tracing::debug!("session lost with no listener registered"),
        }
    }

    /// Exchange the stored refresh token for a new pair and persist it.
    async fn refresh_tokens(&self) -> ClientResult<()> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            return Err(AuthFailure::NoRefreshToken.into());
        };

        let mut request = HttpRequest::new(
            Method::Post,
            self.config.url(Service::Auth, REFRESH_TOKEN_PATH),
        );
        request.body = Some(json!({ "refreshToken": refresh_token }));

        let response = self.transport.send(request).await.map_err(|e| {
            ClientError::from(AuthFailure::RefreshFailed {
                status: None,
                message: e.to_string(),
            })
        })?;

        if !response.is_success() {
            let message = server_message(&response.body)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status code {}", response.status));
            return Err(AuthFailure::RefreshFailed {
                status: Some(response.status),
                message,
            }
            .into());
        }

        let pair: RefreshResponse = serde_json::from_value(response.body).map_err(|e| {
            ClientError::from(AuthFailure::RefreshFailed {
                status: Some(response.status),
                message: format!("malformed refresh response: {e}"),
            })
        })?;

        self.tokens.set_tokens(&pair.access_token, &pair.refresh_token);
        tracing::info!("access token refreshed");
        Ok(())
    }

    /// Second and last attempt: any non-2xx, 401 included, is final.
    async fn replay(&self, request: &ApiRequest) -> ClientResult<Value> {
        let response = self.dispatch(request).await?;
        into_result(response)
    }

    async fn dispatch(&self, request: &ApiRequest) -> ClientResult<HttpResponse> {
        let mut http = HttpRequest::new(request.method, self.config.url(request.service, &request.path));
        http.query = request.query.clone();
        http.body = request.body.clone();
        if let Some(token) = self.tokens.access_token() {
            http.headers
                .push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        tracing::debug!(method = %request.method, url = %http.url, "dispatch");
        self.transport
            .send(http)
            .await
            .map_err(|e| ClientError::Network(e.to_string()))
    }
}

fn into_result(response: HttpResponse) -> ClientResult<Value> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(ClientError::http(response.status, response.body))
    }
}

/// Releases the refresh lock even if the leading task is dropped mid-refresh.
/// Parked requests then observe `RefreshAborted`.
struct RefreshGuard<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl RefreshGuard<'_> {
    fn settle(mut self) -> VecDeque<Waiter> {
        self.settled = true;
        let mut state = self.state.lock();
        state.refreshing = false;
        std::mem::take(&mut state.queue)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.state.lock();
        state.refreshing = false;
        let abandoned = state.queue.len();
        state.queue.clear();
        tracing::warn!(abandoned, "refresh abandoned before settling");
    }
}
