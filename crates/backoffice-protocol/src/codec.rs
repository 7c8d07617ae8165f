//! Codec trait and implementations for request and response bodies.
//!
//! The client never calls `serde_json` directly. It goes through a
//! [`Codec`], so the body format of the backend is a single swap point.
//! [`JsonCodec`] is the only format the admin API speaks today.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values into HTTP bodies and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// request the client sends, from whichever task sends it.
pub trait Codec: Send + Sync + 'static {
    /// The `Content-Type` header value matching [`encode`](Self::encode).
    fn content_type(&self) -> &'static str;

    /// Serializes a value into a request body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes a response body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match `T`.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for `application/json` bodies.
///
/// ## Example
///
/// ```rust
/// use backoffice_protocol::{Codec, JsonCodec, RefreshRequest};
///
/// let codec = JsonCodec;
/// let body = codec
///     .encode(&RefreshRequest { refresh_token: "r1".into() })
///     .unwrap();
/// assert_eq!(body, br#"{"refreshToken":"r1"}"#);
///
/// let back: RefreshRequest = codec.decode(&body).unwrap();
/// assert_eq!(back.refresh_token, "r1");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
