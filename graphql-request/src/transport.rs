//! Fetch-style transport abstraction and the default reqwest binding.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::request::RequestDescriptor;

/// A function compatible with the fetch contract: takes a finished request,
/// returns the response or fails.
///
/// Implementations own cancellation: when [`TransportOptions::signal`] fires
/// they should stop and return [`TransportError::Aborted`].
///
/// [`TransportOptions::signal`]: crate::TransportOptions::signal
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request.
    async fn fetch(&self, request: RequestDescriptor) -> Result<FetchResponse, TransportError>;
}

#[async_trait]
impl<F, Fut> Transport for F
where
    F: Fn(RequestDescriptor) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchResponse, TransportError>> + Send,
{
    async fn fetch(&self, request: RequestDescriptor) -> Result<FetchResponse, TransportError> {
        (self)(request).await
    }
}

/// Response returned by a [`Transport`].
#[derive(Debug, Clone)]
pub struct FetchResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl FetchResponse {
    /// Create a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Create a JSON response with the given status.
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self::new(status, headers, body.to_string())
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Check if the status is in the success range (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value. Lookup is case-insensitive.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// Get the body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Get the body as text. Invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Configuration for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct ReqwestTransportConfig {
    /// Default request timeout.
    pub timeout: Option<Duration>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for ReqwestTransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("graphql-request/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
        }
    }
}

impl ReqwestTransportConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ReqwestTransportConfigBuilder {
        ReqwestTransportConfigBuilder::default()
    }
}

/// Builder for [`ReqwestTransportConfig`].
#[derive(Debug, Default)]
pub struct ReqwestTransportConfigBuilder {
    config: ReqwestTransportConfig,
}

impl ReqwestTransportConfigBuilder {
    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip decompression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ReqwestTransportConfig {
        self.config
    }
}

/// Default transport backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport from configuration.
    pub fn new(config: ReqwestTransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(config.gzip);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    async fn send(&self, request: RequestDescriptor) -> Result<FetchResponse, TransportError> {
        let url = url::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", request.url, e)))?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        trace!(status = %status, bytes = body.len(), "Received response body");

        Ok(FetchResponse::new(status, headers, body))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, mut request: RequestDescriptor) -> Result<FetchResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "Sending HTTP request");

        match request.options.signal.take() {
            Some(signal) => {
                let url = request.url.clone();
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => {
                        debug!(url = %url, "Request aborted by signal");
                        Err(TransportError::Aborted)
                    }
                    result = self.send(request) => result,
                }
            }
            None => self.send(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_response_accessors() {
        let response = FetchResponse::json(StatusCode::OK, &json!({"data": {"ok": true}}));
        assert!(response.ok());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.text(), r#"{"data":{"ok":true}}"#);
    }

    #[test]
    fn test_fetch_response_not_ok() {
        let response = FetchResponse::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), "oops");
        assert!(!response.ok());
        assert!(response.content_type().is_none());
        assert_eq!(response.bytes().as_ref(), b"oops");
    }

    #[test]
    fn test_transport_config_builder() {
        let config = ReqwestTransportConfig::builder()
            .timeout(Duration::from_secs(5))
            .user_agent("tests/1.0")
            .gzip(false)
            .build();

        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.user_agent, "tests/1.0");
        assert!(!config.gzip);
        assert!(ReqwestTransport::new(config).is_ok());
    }
}
