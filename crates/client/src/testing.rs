//! Scripted transport for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::http::REFRESH_TOKEN_PATH;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

pub(crate) enum Reply {
    Status(u16, Value),
    Fail(String),
}

impl Reply {
    pub(crate) fn json(status: u16, body: Value) -> Self {
        Reply::Status(status, body)
    }
}

type Handler = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

/// Answers every request from a closure and records what it was sent.
///
/// With `hold_refresh`, calls to the refresh endpoint block until
/// `release_refresh` so tests can pile requests up behind a refresh.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
    hold_refresh: bool,
    refresh_gate: Semaphore,
}

impl ScriptedTransport {
    pub(crate) fn new(handler: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            hold_refresh: false,
            refresh_gate: Semaphore::new(0),
        }
    }

    pub(crate) fn hold_refresh(mut self) -> Self {
        self.hold_refresh = true;
        self
    }

    pub(crate) fn release_refresh(&self) {
        self.refresh_gate.add_permits(1024);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn count_matching(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    pub(crate) async fn wait_for_refresh_call(&self) {
        while self.count_matching(REFRESH_TOKEN_PATH) == 0 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        if self.hold_refresh && request.url.ends_with(REFRESH_TOKEN_PATH) {
            let permit = self
                .refresh_gate
                .acquire()
                .await
                .map_err(|e| TransportError::Other(e.to_string()))?;
            permit.forget();
        }

        match (self.handler)(&request) {
            Reply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::Fail(msg) => Err(TransportError::Connect(msg)),
        }
    }
}
