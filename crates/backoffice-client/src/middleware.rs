//! The request/response middleware chain.
//!
//! Every API call flows through a fixed, ordered chain built when the
//! client is constructed:
//!
//! ```text
//! ApiRequest ─→ [RequestMiddleware…] ─→ Transport ─→ [ResponseMiddleware…] ─→ caller
//!                                                        │
//!                                                        └─ Replay(request) ─→ back to the top
//! ```
//!
//! Request middleware is synchronous and infallible: `(request) -> request`.
//! Response middleware is async and may ask for the request to be sent
//! again ([`Disposition::Replay`]), which is how a token refresh becomes
//! invisible to the caller.

use std::sync::Arc;

use backoffice_session::TokenStore;
use backoffice_transport::{ApiRequest, ApiResponse};
use futures_util::future::BoxFuture;

use crate::ApiError;

/// What a response middleware decided.
#[derive(Debug)]
pub enum Disposition {
    /// Hand the response to the next middleware (or the caller).
    Pass(ApiResponse),
    /// Discard the response and send this request instead.
    Replay(ApiRequest),
}

/// Rewrites outgoing requests. Must never block or fail.
pub trait RequestMiddleware: Send + Sync + 'static {
    /// Short name, for logs and chain introspection.
    fn name(&self) -> &'static str;

    fn on_request(&self, request: ApiRequest) -> ApiRequest;
}

/// Inspects responses and decides their fate.
pub trait ResponseMiddleware: Send + Sync + 'static {
    /// Short name, for logs and chain introspection.
    fn name(&self) -> &'static str;

    fn on_response<'a>(
        &'a self,
        request: &'a ApiRequest,
        response: ApiResponse,
    ) -> BoxFuture<'a, Result<Disposition, ApiError>>;
}

// ---------------------------------------------------------------------------
// MiddlewareChain
// ---------------------------------------------------------------------------

/// An ordered list of request and response middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    request: Vec<Arc<dyn RequestMiddleware>>,
    response: Vec<Arc<dyn ResponseMiddleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request middleware; it runs after those already added.
    pub fn with_request(mut self, middleware: Arc<dyn RequestMiddleware>) -> Self {
        self.request.push(middleware);
        self
    }

    /// Appends a response middleware; it runs after those already added.
    pub fn with_response(mut self, middleware: Arc<dyn ResponseMiddleware>) -> Self {
        self.response.push(middleware);
        self
    }

    /// Names of the request middleware, in order.
    pub fn request_names(&self) -> Vec<&'static str> {
        self.request.iter().map(|m| m.name()).collect()
    }

    /// Names of the response middleware, in order.
    pub fn response_names(&self) -> Vec<&'static str> {
        self.response.iter().map(|m| m.name()).collect()
    }

    /// Runs every request middleware in order.
    pub fn apply_request(&self, request: ApiRequest) -> ApiRequest {
        self.request
            .iter()
            .fold(request, |req, middleware| middleware.on_request(req))
    }

    /// Runs response middleware in order until one asks for a replay or
    /// fails.
    pub async fn apply_response(
        &self,
        request: &ApiRequest,
        mut response: ApiResponse,
    ) -> Result<Disposition, ApiError> {
        for middleware in &self.response {
            match middleware.on_response(request, response).await? {
                Disposition::Pass(passed) => response = passed,
                Disposition::Replay(next) => {
                    tracing::debug!(
                        request_id = %request.id(),
                        middleware = middleware.name(),
                        "replay requested"
                    );
                    return Ok(Disposition::Replay(next));
                }
            }
        }
        Ok(Disposition::Pass(response))
    }
}

// ---------------------------------------------------------------------------
// BearerAuth
// ---------------------------------------------------------------------------

/// Attaches the current access token as `Authorization: Bearer …`.
///
/// Reads the token from the [`TokenStore`] on every request, so a request
/// sent after a refresh always carries the newest token. With no token
/// stored the request goes out as-is and the backend decides.
pub struct BearerAuth {
    tokens: Arc<dyn TokenStore>,
    key: String,
}

impl BearerAuth {
    pub fn new(tokens: Arc<dyn TokenStore>, key: impl Into<String>) -> Self {
        Self {
            tokens,
            key: key.into(),
        }
    }
}

impl RequestMiddleware for BearerAuth {
    fn name(&self) -> &'static str {
        "bearer-auth"
    }

    fn on_request(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(token) = self.tokens.get(&self.key) {
            if !token.is_empty() {
                request.set_bearer(&token);
            }
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_session::MemoryTokenStore;

    // =====================================================================
    // Helpers
    // =====================================================================

    struct Tag(&'static str);

    impl RequestMiddleware for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn on_request(&self, mut request: ApiRequest) -> ApiRequest {
            let trail = request.header("x-trail").unwrap_or("").to_string();
            request.set_header("x-trail", format!("{trail}{}", self.0));
            request
        }
    }

    /// Replays every non-2xx response once, marking the replay.
    struct ReplayOnce;

    impl ResponseMiddleware for ReplayOnce {
        fn name(&self) -> &'static str {
            "replay-once"
        }

        fn on_response<'a>(
            &'a self,
            request: &'a ApiRequest,
            response: ApiResponse,
        ) -> BoxFuture<'a, Result<Disposition, ApiError>> {
            Box::pin(async move {
                if response.is_success() || request.retried {
                    return Ok(Disposition::Pass(response));
                }
                let mut again = request.clone();
                again.retried = true;
                Ok(Disposition::Replay(again))
            })
        }
    }

    /// Panics if reached: proves the chain stops at a replay.
    struct Unreachable;

    impl ResponseMiddleware for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn on_response<'a>(
            &'a self,
            _request: &'a ApiRequest,
            response: ApiResponse,
        ) -> BoxFuture<'a, Result<Disposition, ApiError>> {
            Box::pin(async move {
                assert!(response.is_success(), "should not see failed responses");
                Ok(Disposition::Pass(response))
            })
        }
    }

    // =====================================================================
    // MiddlewareChain
    // =====================================================================

    #[test]
    fn test_request_middleware_runs_in_order() {
        let chain = MiddlewareChain::new()
            .with_request(Arc::new(Tag("a")))
            .with_request(Arc::new(Tag("b")));

        let req = chain.apply_request(ApiRequest::get("/x"));

        assert_eq!(req.header("x-trail"), Some("ab"));
        assert_eq!(chain.request_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = MiddlewareChain::new();
        let original = ApiRequest::get("/x");
        let id = original.id();

        let req = chain.apply_request(original);

        assert_eq!(req.id(), id);
        assert!(req.headers.is_empty());
    }

    #[tokio::test]
    async fn test_response_chain_passes_success_through() {
        let chain = MiddlewareChain::new()
            .with_response(Arc::new(ReplayOnce))
            .with_response(Arc::new(Unreachable));
        let req = ApiRequest::get("/x");

        let result = chain
            .apply_response(&req, ApiResponse::new(200, "ok"))
            .await
            .unwrap();

        assert!(matches!(result, Disposition::Pass(r) if r.text() == "ok"));
    }

    #[tokio::test]
    async fn test_response_chain_stops_at_replay() {
        let chain = MiddlewareChain::new()
            .with_response(Arc::new(ReplayOnce))
            .with_response(Arc::new(Unreachable));
        let req = ApiRequest::get("/x");

        let result = chain
            .apply_response(&req, ApiResponse::new(500, ""))
            .await
            .unwrap();

        match result {
            Disposition::Replay(again) => {
                assert_eq!(again.id(), req.id());
                assert!(again.retried);
            }
            Disposition::Pass(_) => panic!("expected a replay"),
        }
        assert_eq!(chain.response_names(), vec!["replay-once", "unreachable"]);
    }

    // =====================================================================
    // BearerAuth
    // =====================================================================

    #[test]
    fn test_bearer_auth_attaches_stored_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store.set("accessToken", "T1").unwrap();
        let auth = BearerAuth::new(store, "accessToken");

        let req = auth.on_request(ApiRequest::get("/products"));

        assert_eq!(req.bearer_token(), Some("T1"));
    }

    #[test]
    fn test_bearer_auth_reads_latest_token_each_time() {
        let store = Arc::new(MemoryTokenStore::new());
        store.set("accessToken", "T1").unwrap();
        let auth = BearerAuth::new(store.clone(), "accessToken");
        let first = auth.on_request(ApiRequest::get("/products"));

        store.set("accessToken", "T2").unwrap();
        let second = auth.on_request(ApiRequest::get("/products"));

        assert_eq!(first.bearer_token(), Some("T1"));
        assert_eq!(second.bearer_token(), Some("T2"));
    }

    #[test]
    fn test_bearer_auth_without_token_leaves_request_alone() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = BearerAuth::new(store, "accessToken");

        let req = auth.on_request(ApiRequest::get("/public/catalog"));

        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn test_bearer_auth_keeps_existing_header_when_store_empty() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = BearerAuth::new(store, "accessToken");
        let mut req = ApiRequest::get("/products");
        req.set_bearer("resolved-by-refresh");

        let req = auth.on_request(req);

        assert_eq!(req.bearer_token(), Some("resolved-by-refresh"));
    }
}
