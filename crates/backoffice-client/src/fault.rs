//! The response fault handler: turns auth failures into refreshes or
//! logouts.

use std::sync::Arc;

use backoffice_protocol::{Codec, ErrorBody};
use backoffice_session::SessionState;
use backoffice_transport::{ApiRequest, ApiResponse, Transport};
use futures_util::future::BoxFuture;

use crate::middleware::{Disposition, ResponseMiddleware};
use crate::{ApiError, ForcedLogout, RefreshCoordinator};

/// How a response relates to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 2xx.
    Success,
    /// 401 carrying the expired-token code: refreshable.
    ExpiredToken,
    /// Any other 401, or a 403: the session is unusable.
    InvalidCredentials,
    /// Everything else; a business error for the caller.
    Other,
}

/// Classifies a response. Pure: no I/O, no state.
pub fn classify(status: u16, body: &ErrorBody, expired_code: &str) -> Fault {
    match status {
        200..=299 => Fault::Success,
        401 if body.has_code(expired_code) => Fault::ExpiredToken,
        401 | 403 => Fault::InvalidCredentials,
        _ => Fault::Other,
    }
}

/// Response middleware recovering from an expired access token.
///
/// - `401 TOKEN_EXPIRED` on a first attempt: obtain a fresh token (through
///   the single-flight coordinator) and replay the request once with it.
/// - `401 TOKEN_EXPIRED` on a replay, any other 401, or a 403: forced
///   logout, then the response passes through to the caller.
/// - Anything else passes through untouched.
pub struct AuthFaultHandler<T, C> {
    refresh: Arc<RefreshCoordinator<T, C>>,
    logout: ForcedLogout,
    session: Arc<SessionState>,
    codec: C,
    expired_code: String,
    exempt_paths: Vec<String>,
}

impl<T, C> AuthFaultHandler<T, C>
where
    T: Transport,
    C: Codec,
{
    pub fn new(
        refresh: Arc<RefreshCoordinator<T, C>>,
        logout: ForcedLogout,
        session: Arc<SessionState>,
        codec: C,
        expired_code: impl Into<String>,
        exempt_paths: Vec<String>,
    ) -> Self {
        Self {
            refresh,
            logout,
            session,
            codec,
            expired_code: expired_code.into(),
            exempt_paths,
        }
    }

    fn is_exempt(&self, request: &ApiRequest) -> bool {
        let path = request
            .path
            .split_once('?')
            .map_or(request.path.as_str(), |(path, _)| path);
        self.exempt_paths.iter().any(|exempt| exempt == path)
    }

    /// The token another request already installed, if the failed request
    /// went out with an older one.
    fn newer_token(&self, request: &ApiRequest) -> Option<String> {
        let stored = self
            .session
            .tokens()
            .get(&self.session.keys().access_token)
            .filter(|t| !t.is_empty())?;
        (request.bearer_token() != Some(stored.as_str())).then_some(stored)
    }

    async fn handle(
        &self,
        request: &ApiRequest,
        response: ApiResponse,
    ) -> Result<Disposition, ApiError> {
        if response.is_success() || self.is_exempt(request) {
            return Ok(Disposition::Pass(response));
        }

        let body: ErrorBody = self.codec.decode(&response.body).unwrap_or_default();
        let request_id = request.id();

        match classify(response.status, &body, &self.expired_code) {
            Fault::ExpiredToken if !request.retried => {
                // A refresh that settled while this request was in flight
                // already left a usable token behind. This replay is the
                // request's one retry.
                if let Some(token) = self.newer_token(request) {
                    tracing::debug!(%request_id, "replaying with newer token");
                    let mut replay = request.clone();
                    replay.retried = true;
                    replay.set_bearer(&token);
                    return Ok(Disposition::Replay(replay));
                }

                tracing::debug!(%request_id, "access token expired");
                let token = self.refresh.refreshed_token(request_id).await?;

                let mut replay = request.clone();
                replay.retried = true;
                replay.set_bearer(&token);
                Ok(Disposition::Replay(replay))
            }
            Fault::ExpiredToken => {
                tracing::warn!(%request_id, "token expired again after refresh");
                self.logout.trigger("token rejected after refresh");
                Ok(Disposition::Pass(response))
            }
            Fault::InvalidCredentials => {
                tracing::warn!(
                    %request_id,
                    status = response.status,
                    code = body.code.as_deref().unwrap_or(""),
                    "credentials rejected"
                );
                self.logout.trigger("credentials rejected");
                Ok(Disposition::Pass(response))
            }
            Fault::Success | Fault::Other => Ok(Disposition::Pass(response)),
        }
    }
}

impl<T, C> ResponseMiddleware for AuthFaultHandler<T, C>
where
    T: Transport,
    C: Codec,
{
    fn name(&self) -> &'static str {
        "auth-faults"
    }

    fn on_response<'a>(
        &'a self,
        request: &'a ApiRequest,
        response: ApiResponse,
    ) -> BoxFuture<'a, Result<Disposition, ApiError>> {
        Box::pin(self.handle(request, response))
    }
}
