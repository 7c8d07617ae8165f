//! `ApiClient` builder and the authenticated request loop.
//!
//! This is the entry point for talking to the back-office API. It ties
//! together all the layers: transport → middleware chain → session.

use std::sync::Arc;

use backoffice_protocol::{
    CheckSessionResponse, Codec, ErrorBody, JsonCodec, LoginRequest, LoginResponse, User,
};
use backoffice_session::{
    MemoryNavigator, MemoryTokenStore, Navigator, SessionConfig, SessionState, TokenStore,
};
use backoffice_transport::{ApiRequest, ApiResponse, Method, Transport};
use serde::{de::DeserializeOwned, Serialize};

use crate::fault::AuthFaultHandler;
use crate::middleware::{BearerAuth, Disposition, MiddlewareChain, RequestMiddleware};
use crate::{ApiError, ClientConfig, ForcedLogout, RefreshCoordinator};

/// State shared by every clone of an [`ApiClient`].
struct ClientInner<T, C> {
    transport: Arc<T>,
    codec: C,
    config: ClientConfig,
    session: Arc<SessionState>,
    navigator: Arc<dyn Navigator>,
    logout: ForcedLogout,
    refresh: Arc<RefreshCoordinator<T, C>>,
    chain: MiddlewareChain,
}

/// Builder for configuring an [`ApiClient`].
///
/// # Example
///
/// ```rust,ignore
/// use backoffice_client::{ApiClient, ClientConfig};
/// use backoffice_transport::ReqwestTransport;
///
/// let config = ClientConfig::from_json_file("backoffice.json")?;
/// let client = ApiClient::builder(ReqwestTransport::new(&config.base_url))
///     .config(config)
///     .build();
/// let user = client.login("admin@shop.test", "hunter2").await?;
/// ```
pub struct ApiClientBuilder<T> {
    transport: T,
    config: ClientConfig,
    session_config: SessionConfig,
    tokens: Option<Arc<dyn TokenStore>>,
    session: Option<Arc<SessionState>>,
    navigator: Option<Arc<dyn Navigator>>,
    request_middleware: Vec<Arc<dyn RequestMiddleware>>,
}

impl<T: Transport> ApiClientBuilder<T> {
    /// Creates a builder with default settings over `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
            session_config: SessionConfig::default(),
            tokens: None,
            session: None,
            navigator: None,
            request_middleware: Vec::new(),
        }
    }

    /// Sets the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the storage key names. Ignored when [`session`](Self::session)
    /// is supplied.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the durable token store. Defaults to a [`MemoryTokenStore`].
    /// Ignored when [`session`](Self::session) is supplied.
    pub fn token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Shares an existing session instead of creating one.
    pub fn session(mut self, session: Arc<SessionState>) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets where forced logouts redirect. Defaults to a
    /// [`MemoryNavigator`] starting at the home route.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Adds a request middleware. It runs after the bearer authenticator.
    pub fn request_middleware(mut self, middleware: Arc<dyn RequestMiddleware>) -> Self {
        self.request_middleware.push(middleware);
        self
    }

    /// Builds the client with the JSON codec.
    pub fn build(self) -> ApiClient<T, JsonCodec> {
        self.build_with_codec(JsonCodec)
    }

    /// Builds the client with a custom body codec.
    pub fn build_with_codec<C: Codec + Clone>(self, codec: C) -> ApiClient<T, C> {
        let session = self.session.unwrap_or_else(|| {
            let tokens = self
                .tokens
                .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
            Arc::new(SessionState::new(tokens, self.session_config))
        });
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(MemoryNavigator::default()));
        let transport = Arc::new(self.transport);
        let logout = ForcedLogout::new(Arc::clone(&session), Arc::clone(&navigator));

        let refresh = Arc::new(RefreshCoordinator::new(
            Arc::clone(&transport),
            codec.clone(),
            Arc::clone(&session),
            logout.clone(),
            self.config.endpoints.refresh.clone(),
        ));

        let faults = AuthFaultHandler::new(
            Arc::clone(&refresh),
            logout.clone(),
            Arc::clone(&session),
            codec.clone(),
            self.config.expired_token_code.clone(),
            self.config.fault_exempt_paths(),
        );

        let mut chain = MiddlewareChain::new().with_request(Arc::new(BearerAuth::new(
            Arc::clone(session.tokens()),
            session.keys().access_token.clone(),
        )));
        for middleware in self.request_middleware {
            chain = chain.with_request(middleware);
        }
        let chain = chain.with_response(Arc::new(faults));

        tracing::debug!(
            request = ?chain.request_names(),
            response = ?chain.response_names(),
            "api client built"
        );

        ApiClient {
            inner: Arc::new(ClientInner {
                transport,
                codec,
                config: self.config,
                session,
                navigator,
                logout,
                refresh,
                chain,
            }),
        }
    }
}

/// An authenticated client for the back-office API.
///
/// Cheap to clone; clones share the session, the refresh coordinator and
/// the transport.
pub struct ApiClient<T, C = JsonCodec> {
    inner: Arc<ClientInner<T, C>>,
}

impl<T, C> Clone for ApiClient<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> ApiClient<T, JsonCodec> {
    /// Creates a new builder.
    pub fn builder(transport: T) -> ApiClientBuilder<T> {
        ApiClientBuilder::new(transport)
    }
}

impl<T, C> ApiClient<T, C>
where
    T: Transport,
    C: Codec + Clone,
{
    pub fn session(&self) -> &Arc<SessionState> {
        &self.inner.session
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator<T, C> {
        &self.inner.refresh
    }

    /// The middleware chain every request goes through.
    pub fn middleware(&self) -> &MiddlewareChain {
        &self.inner.chain
    }

    // -----------------------------------------------------------------------
    // Request loop
    // -----------------------------------------------------------------------

    /// Sends a request through the full chain.
    ///
    /// Returns the 2xx response, transparently refreshing the access token
    /// if it expired. Any other outcome is an error: non-2xx statuses
    /// become [`ApiError::Status`], a failed refresh becomes
    /// [`ApiError::Refresh`].
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let inner = &*self.inner;
        let mut request = request;

        loop {
            let outgoing = inner.chain.apply_request(request);
            tracing::debug!(
                request_id = %outgoing.id(),
                method = %outgoing.method,
                path = %outgoing.path,
                retried = outgoing.retried,
                "sending request"
            );

            let response = inner.transport.send(&outgoing).await?;

            match inner.chain.apply_response(&outgoing, response).await? {
                Disposition::Replay(next) => request = next,
                Disposition::Pass(response) if response.is_success() => {
                    return Ok(response);
                }
                Disposition::Pass(response) => return Err(self.status_error(&response)),
            }
        }
    }

    fn status_error(&self, response: &ApiResponse) -> ApiError {
        let body: ErrorBody = self.inner.codec.decode(&response.body).unwrap_or_default();
        ApiError::Status {
            status: response.status,
            code: body.code,
            message: body.message,
        }
    }

    fn request_with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ApiRequest, ApiError> {
        let codec = &self.inner.codec;
        let bytes = codec.encode(body)?;
        Ok(ApiRequest::new(method, path).with_body(codec.content_type(), bytes))
    }

    fn decode<R: DeserializeOwned>(&self, response: &ApiResponse) -> Result<R, ApiError> {
        Ok(self.inner.codec.decode(&response.body)?)
    }

    // -----------------------------------------------------------------------
    // Business endpoints
    // -----------------------------------------------------------------------

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::new(Method::Delete, path)).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.execute(self.request_with_body(Method::Post, path, body)?)
            .await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.execute(self.request_with_body(Method::Put, path, body)?)
            .await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.execute(self.request_with_body(Method::Patch, path, body)?)
            .await
    }

    /// `GET` and decode the response body.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let response = self.get(path).await?;
        self.decode(&response)
    }

    /// `POST` a body and decode the response body.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        self.decode(&response)
    }

    // -----------------------------------------------------------------------
    // Session flows
    // -----------------------------------------------------------------------

    /// Exchanges credentials for a token pair and starts the session.
    ///
    /// A rejected password comes back as [`ApiError::Status`] and leaves
    /// the current session untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let inner = &*self.inner;
        let credentials = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let login: LoginResponse = self
            .post_json(&inner.config.endpoints.login, &credentials)
            .await?;

        let tokens = inner.session.tokens();
        let keys = inner.session.keys();
        tokens.set(&keys.refresh_token, &login.refresh_token)?;
        match login.refresh_token_expires_at {
            Some(expires_at) => {
                tokens.set(&keys.refresh_token_expires_at, &expires_at.to_string())?
            }
            None => tokens.clear(&keys.refresh_token_expires_at)?,
        }
        inner
            .session
            .login_success(login.user.clone(), login.token, login.expires_at)?;

        Ok(login.user)
    }

    /// Asks the backend whether the stored access token is still good.
    ///
    /// Goes through the full chain, so an expired token is refreshed
    /// first. Does not modify the session on success; that is the
    /// caller's decision.
    pub async fn check_session(&self) -> Result<CheckSessionResponse, ApiError> {
        self.get_json(&self.inner.config.endpoints.check_session)
            .await
    }

    /// Ends the session on the server (best effort) and locally.
    ///
    /// The server call carries the current access token but bypasses the
    /// fault handler; whatever it returns, the local session is cleared
    /// and the user is sent to the login screen.
    pub async fn logout(&self) {
        let inner = &*self.inner;
        let endpoints = &inner.config.endpoints;
        let request = inner.chain.apply_request(ApiRequest::new(
            endpoints.logout_method.into(),
            endpoints.logout.as_str(),
        ));

        match inner.transport.send(&request).await {
            Ok(response) if response.is_success() => {
                tracing::debug!("server-side logout acknowledged");
            }
            Ok(response) => {
                tracing::warn!(status = response.status, "server-side logout rejected");
            }
            Err(e) => tracing::warn!(error = %e, "server-side logout failed"),
        }

        inner.logout.trigger("user logout");
    }

    /// Terminates the session without contacting the server.
    pub fn force_logout(&self, reason: &str) {
        self.inner.logout.trigger(reason);
    }
}
