//! Unified error type for the back-office stack.

use backoffice_client::{ApiError, RefreshError};
use backoffice_protocol::ProtocolError;
use backoffice_session::SessionError;
use backoffice_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `backoffice` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BackofficeError {
    /// No response from the backend.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A body could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Token storage failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An API call failed (business error, auth failure, config).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The access token could not be refreshed.
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

impl BackofficeError {
    /// `true` if the session was terminated by this error.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Api(e) => e.is_auth_failure(),
            Self::Refresh(_) => true,
            _ => false,
        }
    }
}
