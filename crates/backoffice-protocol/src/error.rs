//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means a body could not be turned into a Rust
//! value (or back), never that the network or the session misbehaved.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of a request body failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A response body was malformed, truncated, or had the wrong shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A timestamp was neither epoch milliseconds nor an RFC 3339 string.
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}
