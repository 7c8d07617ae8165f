//! Request and response bodies of the auth endpoints.
//!
//! Field names follow the backend's camelCase JSON. Everything optional on
//! the wire is `Option` here so a leaner backend response still decodes.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, User};

/// Error code the backend puts in a 401 body when the access token is
/// merely expired (and a refresh may fix it).
pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";

/// Body of `POST /auth/.../login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login: the user plus a fresh access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    pub expires_at: Timestamp,
    pub refresh_token: String,
    #[serde(default)]
    pub refresh_token_expires_at: Option<Timestamp>,
}

/// Body of `POST /auth/.../refresh-token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful refresh. The refresh token is only present when the backend
/// rotates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub expires_at: Timestamp,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_token_expires_at: Option<Timestamp>,
}

/// Successful `GET /auth/.../check-session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSessionResponse {
    pub user: User,
    pub token_expires: Timestamp,
}

/// The JSON body the backend sends with a non-2xx status.
///
/// Every field is optional: proxies and crashed handlers send bodies that
/// are empty, HTML, or carry only a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Returns `true` if the body carries the given error code.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}
