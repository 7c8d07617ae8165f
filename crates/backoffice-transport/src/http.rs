//! HTTP transport implementation using `reqwest`.

use std::collections::BTreeMap;

use crate::{ApiRequest, ApiResponse, Method, Transport, TransportError};

/// A [`Transport`] that talks to the real backend over HTTP(S).
///
/// Request paths are joined onto `base_url`; a path that is already an
/// absolute `http(s)://` URL is sent as-is. Timeouts are whatever the
/// wrapped `reqwest::Client` enforces.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a transport around a preconfigured client (timeouts,
    /// proxies, custom roots).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!(%base_url, "HTTP transport configured");
        Self { client, base_url }
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path);
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let http_request = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;

        tracing::trace!(
            request_id = %request.id(),
            method = %request.method,
            path = %request.path,
            status,
            "HTTP exchange complete"
        );

        Ok(ApiResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
