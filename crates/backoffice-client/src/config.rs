//! Client configuration: where the backend is and how its auth endpoints
//! are named.

use std::path::Path;

use backoffice_protocol::TOKEN_EXPIRED;
use backoffice_transport::Method;
use serde::{Deserialize, Serialize};

use crate::ApiError;

// ---------------------------------------------------------------------------
// AuthEndpoints
// ---------------------------------------------------------------------------

/// How the server-side logout endpoint is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogoutMethod {
    #[default]
    Post,
    Get,
}

impl From<LogoutMethod> for Method {
    fn from(method: LogoutMethod) -> Self {
        match method {
            LogoutMethod::Post => Method::Post,
            LogoutMethod::Get => Method::Get,
        }
    }
}

/// Paths of the auth endpoints, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthEndpoints {
    pub login: String,
    pub refresh: String,
    pub check_session: String,
    pub logout: String,
    pub logout_method: LogoutMethod,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/admin/login".to_string(),
            refresh: "/auth/admin/refresh-token".to_string(),
            check_session: "/auth/admin/check-session".to_string(),
            logout: "/auth/admin/logout".to_string(),
            logout_method: LogoutMethod::Post,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://api.shop.test/v1`.
    pub base_url: String,

    pub endpoints: AuthEndpoints,

    /// The 401 body code meaning "access token expired, refresh me".
    pub expired_token_code: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4000".to_string(),
            endpoints: AuthEndpoints::default(),
            expired_token_code: TOKEN_EXPIRED.to_string(),
        }
    }
}

impl ClientConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// [`ApiError::Config`] if the file can't be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            ApiError::Config(format!("{}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::Config(format!("{}: {e}", path.display()))
        })
    }

    /// Paths whose responses bypass the fault handler. A 401 from the
    /// login endpoint is a wrong password, and a 401 from the refresh
    /// endpoint is handled by the refresh coordinator itself.
    pub(crate) fn fault_exempt_paths(&self) -> Vec<String> {
        vec![self.endpoints.login.clone(), self.endpoints.refresh.clone()]
    }
}
