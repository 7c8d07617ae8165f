/// Errors that can occur in the transport layer.
///
/// A transport error means no HTTP response was obtained at all. A
/// response with a 4xx/5xx status is *not* a transport error; it comes
/// back as an [`ApiResponse`](crate::ApiResponse) for the layers above to
/// classify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The response started but its body could not be read.
    #[error("reading response body failed: {0}")]
    ReadFailed(String),
}
