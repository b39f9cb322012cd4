use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use antco_client::types::{LoginRequest, UserFilters};
use antco_client::{
    AdminPortal, AuthFailure, ClientConfig, ClientError, MemoryStorage, RecordingNavigator,
    ReqwestTransport, Storage,
};
use antco_core::PageRequest;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// In-memory stand-in for the Auth and Admin APIs.
#[derive(Default)]
struct Backend {
    access: Mutex<String>,
    refresh: Mutex<String>,
    generation: AtomicUsize,
    refresh_calls: AtomicUsize,
    fail_refresh: AtomicBool,
}

impl Backend {
    fn issue(&self) -> Value {
        let n = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{n}");
        let refresh = format!("refresh-{n}");
        *self.access.lock() = access.clone();
        *self.refresh.lock() = refresh.clone();
        json!({"accessToken": access, "refreshToken": refresh, "tokenType": "Bearer", "expiresIn": 3600})
    }

    /// Invalidate the current access token; the refresh token stays good.
    fn expire_access(&self) {
        *self.access.lock() = "expired".to_string();
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access.lock());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

type Shared = Arc<Backend>;

fn profile() -> Value {
    json!({
        "id": "u-1",
        "email": "admin@antco.test",
        "fullName": "Admin",
        "roles": [{"name": "Admin"}],
        "permissions": [
            {"resource": "users", "action": "read"},
            {"resource": "users", "action": "write"}
        ]
    })
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})))
}

async fn login(State(b): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != "secret" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid email or password"})),
        );
    }
    let mut grant = b.issue();
    grant["user"] = profile();
    (StatusCode::OK, Json(grant))
}

async fn refresh_token(State(b): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    b.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Widen the window in which other 401s pile up behind this refresh.
    tokio::time::sleep(Duration::from_millis(50)).await;

    if b.fail_refresh.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "refresh unavailable"})),
        );
    }
    if body["refreshToken"].as_str() != Some(b.refresh.lock().as_str()) {
        return unauthorized();
    }
    (StatusCode::OK, Json(b.issue()))
}

async fn me(State(b): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !b.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(profile()))
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn list_users(
    State(b): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !b.authorized(&headers) {
        return unauthorized();
    }
    let matches = query
        .get("searchTerm")
        .is_none_or(|term| "admin@antco.test".contains(term.as_str()));
    let items: Vec<Value> = if matches {
        vec![json!({"id": "u-1", "email": "admin@antco.test", "roles": ["Admin"]})]
    } else {
        Vec::new()
    };
    (
        StatusCode::OK,
        Json(json!({
            "totalCount": items.len(),
            "items": items,
            "totalPages": 1,
            "pageNumber": query.get("pageNumber").and_then(|p| p.parse::<u32>().ok()),
            "pageSize": query.get("pageSize").and_then(|p| p.parse::<u32>().ok())
        })),
    )
}

struct TestServer {
    base_url: String,
    backend: Shared,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let backend: Shared = Arc::new(Backend::default());
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh-token", post(refresh_token))
            .route("/auth/me", get(me))
            .route("/auth/logout", post(logout))
            .route("/admin/users", get(list_users))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            backend,
            handle,
        }
    }

    fn portal(&self, storage: Arc<MemoryStorage>, navigator: Arc<RecordingNavigator>) -> AdminPortal {
        let config = ClientConfig::new(&self.base_url, format!("{}/", self.base_url));
        let transport = ReqwestTransport::new(config.timeout).expect("reqwest client");
        AdminPortal::new(config, Arc::new(transport), storage, navigator)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn logged_in(srv: &TestServer) -> (AdminPortal, Arc<MemoryStorage>, Arc<RecordingNavigator>) {
    let storage = Arc::new(MemoryStorage::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let portal = srv.portal(storage.clone(), navigator.clone());
    portal
        .session()
        .login(LoginRequest::new("admin@antco.test", "secret"))
        .await
        .unwrap();
    (portal, storage, navigator)
}

#[tokio::test]
async fn login_establishes_session_and_lists_users() {
    let srv = TestServer::spawn().await;
    let (portal, storage, _) = logged_in(&srv).await;

    assert!(portal.session().is_authenticated());
    assert!(portal.session().has_permission("users", "read"));
    assert_eq!(storage.get("access_token").as_deref(), Some("access-1"));

    let filters = UserFilters {
        search_term: Some("adm".into()),
        status: None,
    };
    let page = portal
        .users()
        .list(PageRequest::new(2, 25).unwrap(), &filters)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].roles, vec!["Admin".to_string()]);
    assert_eq!(page.page_number, Some(2));
    assert_eq!(page.page_size, Some(25));
}

#[tokio::test]
async fn wrong_password_is_reported_without_refresh() {
    let srv = TestServer::spawn().await;
    let navigator = Arc::new(RecordingNavigator::new());
    let portal = srv.portal(Arc::new(MemoryStorage::new()), navigator.clone());

    let err = portal
        .session()
        .login(LoginRequest::new("admin@antco.test", "nope"))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(
        portal.session().snapshot().error.as_deref(),
        Some("Invalid email or password")
    );
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(navigator.visits().is_empty());
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let srv = TestServer::spawn().await;
    let (portal, storage, navigator) = logged_in(&srv).await;
    srv.backend.expire_access();

    let calls = (0..4).map(|_| {
        let portal = portal.clone();
        async move {
            portal
                .users()
                .list(PageRequest::default(), &UserFilters::default())
                .await
        }
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        assert_eq!(result.unwrap().total_count, 1);
    }
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(storage.get("access_token").as_deref(), Some("access-2"));
    assert_eq!(storage.get("refresh_token").as_deref(), Some("refresh-2"));
    assert!(navigator.visits().is_empty());
    assert!(!portal.http().is_refreshing());
}

#[tokio::test]
async fn refresh_failure_rejects_all_and_redirects_to_login() {
    let srv = TestServer::spawn().await;
    let (portal, storage, navigator) = logged_in(&srv).await;
    srv.backend.expire_access();
    srv.backend.fail_refresh.store(true, Ordering::SeqCst);

    let list = || {
        let portal = portal.clone();
        async move {
            portal
                .users()
                .list(PageRequest::default(), &UserFilters::default())
                .await
        }
    };
    let (a, b) = tokio::join!(list(), list());

    for result in [a, b] {
        match result {
            Err(ClientError::Auth(AuthFailure::RefreshFailed { status, .. })) => {
                assert_eq!(status, Some(500));
            }
            other => panic!("expected refresh failure, got {other:?}"),
        }
    }
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(storage.get("access_token"), None);
    assert_eq!(storage.get("refresh_token"), None);
    assert_eq!(navigator.visits(), vec!["/auth/login".to_string()]);

    assert!(!portal.session().is_authenticated());
    assert!(portal.session().user().is_none());
    let persisted: Value = serde_json::from_str(&storage.get("auth-storage").unwrap()).unwrap();
    assert_eq!(persisted, json!({"user": null, "isAuthenticated": false}));

    let restarted = srv.portal(storage.clone(), Arc::new(RecordingNavigator::new()));
    assert!(!restarted.session().is_authenticated());
}

#[tokio::test]
async fn restart_restores_and_revalidates_session() {
    let srv = TestServer::spawn().await;
    let (portal, storage, _) = logged_in(&srv).await;
    drop(portal);

    let restarted = srv.portal(storage.clone(), Arc::new(RecordingNavigator::new()));
    assert!(restarted.session().is_authenticated(), "provisional restore");

    srv.backend.expire_access();
    restarted.session().check_auth().await;
    assert!(restarted.session().is_authenticated());
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);

    restarted.session().logout().await;
    assert!(!restarted.session().is_authenticated());
    assert_eq!(storage.get("access_token"), None);
}
