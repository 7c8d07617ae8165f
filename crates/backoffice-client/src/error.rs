//! Error types for the client layer.

use backoffice_protocol::ProtocolError;
use backoffice_session::SessionError;
use backoffice_transport::TransportError;

/// Why a token refresh did not produce a new access token.
///
/// `Clone` because one failure is delivered to every request that was
/// queued behind the refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// No refresh token is stored; nothing was sent.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The stored refresh token is past its recorded expiry; nothing was
    /// sent.
    #[error("refresh token expired")]
    RefreshTokenExpired,

    /// The backend answered the refresh call with a non-2xx status.
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16, code: Option<String> },

    /// The refresh call produced no response.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refresh response could not be encoded or decoded.
    #[error("refresh response invalid: {0}")]
    Protocol(String),

    /// The new tokens could not be persisted.
    #[error("storing refreshed tokens failed: {0}")]
    Storage(String),

    /// The task driving the refresh went away before it settled.
    #[error("refresh abandoned before completion")]
    Abandoned,
}

/// Errors returned by [`ApiClient`](crate::ApiClient) calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was obtained from the backend.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A body could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The backend answered with a non-2xx status. Business errors
    /// (validation, not found, conflict) all arrive here.
    #[error("request failed with status {status}{}", code_suffix(.code))]
    Status {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    /// The access token expired and could not be refreshed. The session
    /// has already been terminated.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Persisting session data failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

impl ApiError {
    /// The HTTP status, for errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// `true` if this error ended (or stems from) the session: a 401/403,
    /// or a failed refresh.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Refresh(_))
            || matches!(self.status(), Some(401 | 403))
    }
}
