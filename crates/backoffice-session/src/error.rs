//! Error types for the session layer.

/// Errors that can occur while persisting or loading session data.
///
/// In-memory session transitions never fail; only the durable storage
/// behind them can.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the token file failed.
    #[error("token storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The token file exists but is not a JSON object of strings.
    #[error("token storage is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}
