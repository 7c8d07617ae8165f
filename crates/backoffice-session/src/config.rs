//! Session configuration.

use serde::{Deserialize, Serialize};

/// The keys under which tokens are persisted in the [`TokenStore`].
///
/// Defaults match what the web dashboard writes to local storage, so a
/// token file can be inspected with the same names.
///
/// [`TokenStore`]: crate::TokenStore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_expires_at: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            access_token: "accessToken".to_string(),
            refresh_token: "refreshToken".to_string(),
            refresh_token_expires_at: "refreshTokenExpiresAt".to_string(),
        }
    }
}

/// Configuration for session storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Storage key names.
    pub keys: StorageKeys,
}
