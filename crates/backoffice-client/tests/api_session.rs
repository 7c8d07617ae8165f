//! Integration tests for the authenticated request loop using a scripted
//! backend.

use std::sync::{Arc, Mutex, MutexGuard};

use backoffice_client::{ApiClient, ApiError, RefreshError};
use backoffice_protocol::{Role, Timestamp, User, UserId};
use backoffice_session::{MemoryNavigator, MemoryTokenStore, Navigator, Route, TokenStore};
use backoffice_transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use futures_util::future::join_all;
use serde_json::{json, Value};

// =========================================================================
// Mock backend: answers by path and bearer token, records every call.
// =========================================================================

#[derive(Debug, Default)]
struct BackendState {
    /// Access token the backend currently accepts.
    valid_token: String,
    /// Access tokens answered with `401 TOKEN_EXPIRED`.
    expired_tokens: Vec<String>,
    /// What the refresh endpoint hands out.
    refreshed_token: String,
    refreshed_expires_at: i64,
    rotated_refresh_token: Option<String>,
    /// When set, the refresh endpoint answers with this status.
    refresh_rejects_with: Option<u16>,
    /// The refresh endpoint waits until this many expired faults were
    /// served, so concurrent callers all hit the expiry first.
    hold_refresh_until: usize,
    expired_served: usize,
    /// Refresh tokens received by the refresh endpoint.
    refresh_calls: Vec<String>,
    logout_calls: usize,
    /// (path, bearer) for every non-auth call.
    calls: Vec<(String, Option<String>)>,
    /// Installed into the client's store on the next expired fault, as if
    /// a concurrent refresh had just finished.
    install_on_expiry: Option<(Arc<MemoryTokenStore>, String)>,
}

struct Backend {
    state: Mutex<BackendState>,
}

fn admin() -> User {
    User {
        id: UserId("u-1".into()),
        name: "Ops Admin".into(),
        email: "ops@shop.test".into(),
        role: Role::Admin,
    }
}

fn reply(status: u16, body: Value) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(status, body.to_string()))
}

impl Backend {
    fn new(state: BackendState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    fn refresh_calls(&self) -> Vec<String> {
        self.state().refresh_calls.clone()
    }

    fn calls_to(&self, path: &str) -> Vec<Option<String>> {
        self.state()
            .calls
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    /// Answers an authenticated call based on the bearer token.
    fn authorize(&self, request: &ApiRequest) -> Result<(), (u16, Value)> {
        let mut state = self.state();
        let bearer = request.bearer_token().map(str::to_string);
        match bearer {
            Some(token) if !state.valid_token.is_empty() && token == state.valid_token => Ok(()),
            Some(token) if state.expired_tokens.contains(&token) => {
                state.expired_served += 1;
                if let Some((store, newer)) = state.install_on_expiry.take() {
                    store.set("accessToken", &newer).unwrap();
                }
                Err((401, json!({"code": "TOKEN_EXPIRED", "message": "jwt expired"})))
            }
            _ => Err((401, json!({"code": "INVALID_TOKEN"}))),
        }
    }

    async fn refresh(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        loop {
            let ready = {
                let state = self.state();
                state.expired_served >= state.hold_refresh_until
            };
            if ready {
                break;
            }
            tokio::task::yield_now().await;
        }

        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or(b"{}")).unwrap();
        let mut state = self.state();
        state
            .refresh_calls
            .push(body["refreshToken"].as_str().unwrap_or_default().to_string());

        if let Some(status) = state.refresh_rejects_with {
            return reply(status, json!({"code": "INVALID_REFRESH_TOKEN"}));
        }

        state.valid_token = state.refreshed_token.clone();
        let mut body = json!({
            "token": state.refreshed_token,
            "expiresAt": state.refreshed_expires_at,
        });
        if let Some(rotated) = &state.rotated_refresh_token {
            body["refreshToken"] = json!(rotated);
            body["refreshTokenExpiresAt"] = json!("2999-01-01T00:00:00Z");
        }
        reply(200, body)
    }
}

impl Transport for Backend {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        match (request.method, request.path.as_str()) {
            (Method::Post, "/auth/admin/refresh-token") => return self.refresh(request).await,
            (Method::Post, "/auth/admin/login") => {
                let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or(b"{}")).unwrap();
                if body["password"] != "hunter2" {
                    return reply(401, json!({"code": "INVALID_CREDENTIALS"}));
                }
                self.state().valid_token = "T1".into();
                return reply(
                    200,
                    json!({
                        "user": admin(),
                        "token": "T1",
                        "expiresAt": 1_000,
                        "refreshToken": "R1",
                        "refreshTokenExpiresAt": "2999-01-01T00:00:00Z",
                    }),
                );
            }
            (_, "/auth/admin/logout") => {
                self.state().logout_calls += 1;
                return reply(200, json!({}));
            }
            _ => {}
        }

        self.state().calls.push((
            request.path.clone(),
            request.bearer_token().map(str::to_string),
        ));

        if request.path == "/always-expired" {
            self.state().expired_served += 1;
            return reply(401, json!({"code": "TOKEN_EXPIRED"}));
        }
        if let Err((status, body)) = self.authorize(request) {
            return reply(status, body);
        }

        match request.path.as_str() {
            "/auth/admin/check-session" => reply(200, json!({"user": admin(), "tokenExpires": 5_000})),
            "/admin/reports" => reply(403, json!({"code": "FORBIDDEN"})),
            "/orders/missing" => reply(404, json!({"code": "NOT_FOUND", "message": "no such order"})),
            path => reply(200, json!({ "path": path })),
        }
    }
}

// =========================================================================
// Harness
// =========================================================================

struct Harness {
    backend: Arc<Backend>,
    client: ApiClient<Arc<Backend>>,
    store: Arc<MemoryTokenStore>,
    nav: Arc<MemoryNavigator>,
}

fn harness(state: BackendState) -> Harness {
    let backend = Backend::new(state);
    let store = Arc::new(MemoryTokenStore::new());
    let nav = Arc::new(MemoryNavigator::new(Route::Path("/products".into())));
    let client = ApiClient::builder(Arc::clone(&backend))
        .token_store(store.clone())
        .navigator(nav.clone())
        .build();
    Harness {
        backend,
        client,
        store,
        nav,
    }
}

/// A backend that considers `T1` expired and refreshes to `newAccess123`.
fn expiring_backend() -> BackendState {
    BackendState {
        expired_tokens: vec!["T1".into()],
        refreshed_token: "newAccess123".into(),
        refreshed_expires_at: 1_700_000_000_000,
        ..BackendState::default()
    }
}

/// Puts the harness in the state a successful login leaves behind.
fn sign_in(h: &Harness, access: &str, refresh: Option<&str>) {
    if let Some(refresh) = refresh {
        h.store.set("refreshToken", refresh).unwrap();
    }
    h.client
        .session()
        .login_success(admin(), access.into(), Timestamp::from_millis(1_000))
        .unwrap();
}

fn assert_logged_out(h: &Harness) {
    assert!(!h.client.session().is_authenticated());
    assert_eq!(h.client.session().snapshot().user, None);
    assert!(h.store.is_empty(), "every persisted token is removed");
    assert_eq!(h.nav.current(), Route::Login);
}

// =========================================================================
// Single-flight refresh
// =========================================================================

#[tokio::test]
async fn test_five_concurrent_expiries_share_one_refresh() {
    let h = harness(BackendState {
        hold_refresh_until: 5,
        ..expiring_backend()
    });
    sign_in(&h, "T1", Some("R1"));

    let results = join_all((1..=5).map(|_| h.client.get("/products"))).await;

    for result in &results {
        let response = result.as_ref().expect("request should succeed after refresh");
        assert_eq!(response.status, 200);
    }
    assert_eq!(h.backend.refresh_calls(), vec!["R1".to_string()]);
    assert_eq!(h.client.refresh_coordinator().exchange_count(), 1);
    assert!(!h.client.refresh_coordinator().is_refreshing());

    let calls = h.backend.calls_to("/products");
    assert_eq!(calls.len(), 10);
    assert!(calls[..5].iter().all(|b| b.as_deref() == Some("T1")));
    assert!(calls[5..].iter().all(|b| b.as_deref() == Some("newAccess123")));
}

#[tokio::test]
async fn test_refresh_updates_token_and_keeps_user() {
    let h = harness(expiring_backend());
    sign_in(&h, "T1", Some("R1"));
    let before = h.client.session().snapshot();

    h.client.get("/products").await.unwrap();

    let after = h.client.session().snapshot();
    assert_eq!(after.access_token.as_deref(), Some("newAccess123"));
    assert_eq!(after.access_token_expires_at, Some(Timestamp::from_millis(1_700_000_000_000)));
    assert_eq!(after.user, before.user);
    assert!(after.authenticated);
    assert_eq!(h.store.get("accessToken").as_deref(), Some("newAccess123"));
    // No rotation: the original refresh token stays.
    assert_eq!(h.store.get("refreshToken").as_deref(), Some("R1"));
    assert_eq!(h.nav.history(), Vec::<Route>::new());
}

#[tokio::test]
async fn test_rotated_refresh_token_is_persisted() {
    let h = harness(BackendState {
        rotated_refresh_token: Some("R2".into()),
        ..expiring_backend()
    });
    sign_in(&h, "T1", Some("R1"));

    h.client.get("/products").await.unwrap();

    assert_eq!(h.store.get("refreshToken").as_deref(), Some("R2"));
    let expiry = h.store.get("refreshTokenExpiresAt").unwrap();
    assert_eq!(
        Timestamp::parse(&expiry).unwrap(),
        Timestamp::parse("2999-01-01T00:00:00Z").unwrap()
    );
}

#[tokio::test]
async fn test_later_expiry_starts_a_new_refresh() {
    let h = harness(expiring_backend());
    sign_in(&h, "T1", Some("R1"));
    h.client.get("/products").await.unwrap();

    // The backend expires the refreshed token as well.
    {
        let mut state = h.backend.state();
        state.valid_token.clear();
        state.expired_tokens.push("newAccess123".into());
        state.refreshed_token = "T3".into();
    }
    h.client.get("/products").await.unwrap();

    assert_eq!(h.backend.refresh_calls().len(), 2);
    assert_eq!(h.client.session().access_token().as_deref(), Some("T3"));
}

// =========================================================================
// Failure paths
// =========================================================================

#[tokio::test]
async fn test_replayed_request_is_not_retried_twice() {
    let h = harness(expiring_backend());
    sign_in(&h, "T1", Some("R1"));

    let err = h.client.get("/always-expired").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(h.backend.calls_to("/always-expired").len(), 2);
    assert_eq!(h.backend.refresh_calls().len(), 1);
    assert_logged_out(&h);
}

#[tokio::test]
async fn test_replay_with_newer_token_counts_as_the_retry() {
    let h = harness(BackendState {
        expired_tokens: vec!["T1".into(), "T2".into()],
        refreshed_token: "T3".into(),
        ..BackendState::default()
    });
    sign_in(&h, "T1", Some("R1"));
    h.backend.state().install_on_expiry = Some((h.store.clone(), "T2".into()));

    let err = h.client.get("/products").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(
        h.backend.calls_to("/products"),
        vec![Some("T1".to_string()), Some("T2".to_string())]
    );
    assert!(h.backend.refresh_calls().is_empty());
    assert_logged_out(&h);
}

#[tokio::test]
async fn test_invalid_token_forces_logout_without_refresh() {
    let h = harness(expiring_backend());
    sign_in(&h, "GARBAGE", Some("R1"));

    let err = h.client.get("/products").await.unwrap_err();

    assert!(matches!(&err, ApiError::Status { status: 401, code: Some(c), .. } if c == "INVALID_TOKEN"));
    assert!(err.is_auth_failure());
    assert!(h.backend.refresh_calls().is_empty());
    assert_logged_out(&h);
}

#[tokio::test]
async fn test_forbidden_forces_logout_without_refresh() {
    let h = harness(BackendState {
        valid_token: "T1".into(),
        ..BackendState::default()
    });
    sign_in(&h, "T1", Some("R1"));

    let err = h.client.get("/admin/reports").await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert!(h.backend.refresh_calls().is_empty());
    assert_eq!(h.client.refresh_coordinator().exchange_count(), 0);
    assert_logged_out(&h);
}

#[tokio::test]
async fn test_missing_refresh_token_short_circuits() {
    let h = harness(expiring_backend());
    sign_in(&h, "T1", None);

    let err = h.client.get("/products").await.unwrap_err();

    assert!(matches!(err, ApiError::Refresh(RefreshError::MissingRefreshToken)));
    assert!(h.backend.refresh_calls().is_empty());
    assert_eq!(h.client.refresh_coordinator().exchange_count(), 0);
    assert_logged_out(&h);
}

#[tokio::test]
async fn test_expired_refresh_token_short_circuits() {
    let h = harness(expiring_backend());
    sign_in(&h, "T1", Some("R1"));
    h.store
        .set("refreshTokenExpiresAt", "2020-01-01T00:00:00Z")
        .unwrap();

    let err = h.client.get("/products").await.unwrap_err();

    assert!(matches!(err, ApiError::Refresh(RefreshError::RefreshTokenExpired)));
    assert!(h.backend.refresh_calls().is_empty());
    assert_logged_out(&h);
}

#[tokio::test]
async fn test_rejected_refresh_fails_every_waiter() {
    let h = harness(BackendState {
        refresh_rejects_with: Some(401),
        hold_refresh_until: 3,
        ..expiring_backend()
    });
    sign_in(&h, "T1", Some("R1"));

    let results = join_all((1..=3).map(|_| h.client.get("/products"))).await;

    for result in results {
        match result {
            Err(ApiError::Refresh(RefreshError::Rejected { status, code })) => {
                assert_eq!(status, 401);
                assert_eq!(code.as_deref(), Some("INVALID_REFRESH_TOKEN"));
            }
            other => panic!("expected rejected refresh, got {other:?}"),
        }
    }
    assert_eq!(h.backend.refresh_calls().len(), 1);
    assert_logged_out(&h);
    assert_eq!(h.nav.history(), vec![Route::Login]);
}

#[tokio::test]
async fn test_business_error_keeps_session() {
    let h = harness(BackendState {
        valid_token: "T1".into(),
        ..BackendState::default()
    });
    sign_in(&h, "T1", Some("R1"));

    let err = h.client.get("/orders/missing").await.unwrap_err();

    match err {
        ApiError::Status { status, code, message } => {
            assert_eq!(status, 404);
            assert_eq!(code.as_deref(), Some("NOT_FOUND"));
            assert_eq!(message.as_deref(), Some("no such order"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.client.session().is_authenticated());
    assert_eq!(h.nav.current(), Route::Path("/products".into()));
}

// =========================================================================
// Session flows
// =========================================================================

#[tokio::test]
async fn test_login_persists_tokens_and_authenticates() {
    let h = harness(BackendState::default());

    let user = h.client.login("ops@shop.test", "hunter2").await.unwrap();

    assert_eq!(user, admin());
    let session = h.client.session().snapshot();
    assert!(session.authenticated);
    assert_eq!(session.access_token.as_deref(), Some("T1"));
    assert_eq!(session.access_token_expires_at, Some(Timestamp::from_millis(1_000)));
    assert_eq!(h.store.get("accessToken").as_deref(), Some("T1"));
    assert_eq!(h.store.get("refreshToken").as_deref(), Some("R1"));
    assert!(h.store.get("refreshTokenExpiresAt").is_some());

    let response = h.client.get("/products").await.unwrap();
    assert_eq!(h.backend.calls_to("/products"), vec![Some("T1".to_string())]);
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_wrong_password_is_a_business_error() {
    let h = harness(BackendState::default());

    let err = h.client.login("ops@shop.test", "wrong").await.unwrap_err();

    assert!(matches!(&err, ApiError::Status { status: 401, code: Some(c), .. } if c == "INVALID_CREDENTIALS"));
    assert!(!h.client.session().is_authenticated());
    assert!(h.backend.refresh_calls().is_empty());
    // Not a session fault: no redirect.
    assert_eq!(h.nav.history(), Vec::<Route>::new());
}

#[tokio::test]
async fn test_check_session_refreshes_expired_token_first() {
    let h = harness(expiring_backend());
    h.store.set("accessToken", "T1").unwrap();
    h.store.set("refreshToken", "R1").unwrap();

    let checked = h.client.check_session().await.unwrap();

    assert_eq!(checked.user, admin());
    assert_eq!(checked.token_expires, Timestamp::from_millis(5_000));
    assert_eq!(h.backend.refresh_calls(), vec!["R1".to_string()]);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let h = harness(BackendState {
        valid_token: "T1".into(),
        ..BackendState::default()
    });
    sign_in(&h, "T1", Some("R1"));

    h.client.logout().await;
    assert_logged_out(&h);

    h.client.logout().await;
    assert_logged_out(&h);
    assert_eq!(h.nav.history(), vec![Route::Login]);
    assert_eq!(h.backend.state().logout_calls, 2);
}

#[tokio::test]
async fn test_custom_request_middleware_runs_on_replays() {
    use backoffice_client::RequestMiddleware;

    struct Tenant;
    impl RequestMiddleware for Tenant {
        fn name(&self) -> &'static str {
            "tenant"
        }
        fn on_request(&self, mut request: ApiRequest) -> ApiRequest {
            request.set_header("x-tenant", "shop-1");
            request
        }
    }

    let backend = Backend::new(expiring_backend());
    let store = Arc::new(MemoryTokenStore::new());
    store.set("accessToken", "T1").unwrap();
    store.set("refreshToken", "R1").unwrap();
    let client = ApiClient::builder(Arc::clone(&backend))
        .token_store(store)
        .request_middleware(Arc::new(Tenant))
        .build();

    let response = client.get_json::<Value>("/products").await.unwrap();

    assert_eq!(response["path"], "/products");
    assert_eq!(client.middleware().request_names(), vec!["bearer-auth", "tenant"]);
}
