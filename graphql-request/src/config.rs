//! GraphQL client configuration.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::headers::HeadersConfig;
use crate::middleware::{RequestMiddleware, ResponseMiddleware};
use crate::request::{HttpMethod, TransportOptions};
use crate::serializer::{DefaultJsonSerializer, JsonSerializer};
use crate::transport::{ReqwestTransport, Transport};

/// How server-reported errors affect a single-operation call that also has data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Any reported error fails the call.
    #[default]
    None,
    /// Errors are returned next to the data.
    All,
    /// Errors are dropped from the result.
    Ignore,
}

impl ErrorPolicy {
    /// Check if reported errors leave the call successful.
    pub fn tolerates_errors(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// GraphQL client configuration.
#[derive(Clone)]
pub struct GraphQLClientConfig {
    /// HTTP method for every call.
    pub method: HttpMethod,
    /// Error policy for single-operation calls.
    pub error_policy: ErrorPolicy,
    /// Default headers, static or produced per call.
    pub headers: Option<HeadersConfig>,
    /// Serializer for bodies, query-string values and responses.
    pub json_serializer: Arc<dyn JsonSerializer>,
    /// Hook run on the built request before dispatch.
    pub request_middleware: Option<Arc<dyn RequestMiddleware>>,
    /// Hook observing every outcome.
    pub response_middleware: Option<Arc<dyn ResponseMiddleware>>,
    /// Fetch-style transport.
    pub transport: Arc<dyn Transport>,
    /// Options passed through to the transport.
    pub transport_options: TransportOptions,
}

impl Default for GraphQLClientConfig {
    fn default() -> Self {
        Self {
            method: HttpMethod::default(),
            error_policy: ErrorPolicy::default(),
            headers: None,
            json_serializer: Arc::new(DefaultJsonSerializer),
            request_middleware: None,
            response_middleware: None,
            transport: Arc::new(ReqwestTransport::default()),
            transport_options: TransportOptions::default(),
        }
    }
}

impl std::fmt::Debug for GraphQLClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClientConfig")
            .field("method", &self.method)
            .field("error_policy", &self.error_policy)
            .field("headers", &self.headers)
            .field("request_middleware", &self.request_middleware.is_some())
            .field("response_middleware", &self.response_middleware.is_some())
            .field("transport_options", &self.transport_options)
            .finish_non_exhaustive()
    }
}

impl GraphQLClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GraphQLClientConfigBuilder {
        GraphQLClientConfigBuilder::default()
    }
}

/// Builder for GraphQL client configuration.
#[derive(Debug, Default)]
pub struct GraphQLClientConfigBuilder {
    config: GraphQLClientConfig,
}

impl GraphQLClientConfigBuilder {
    /// Set the HTTP method.
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.config.method = method;
        self
    }

    /// Set the error policy.
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.config.error_policy = policy;
        self
    }

    /// Set the default headers.
    pub fn headers(mut self, headers: impl Into<HeadersConfig>) -> Self {
        self.config.headers = Some(headers.into());
        self
    }

    /// Produce the default headers on every call.
    pub fn headers_fn<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> crate::HeadersInit + Send + Sync + 'static,
    {
        self.config.headers = Some(HeadersConfig::producer(producer));
        self
    }

    /// Set the JSON serializer.
    pub fn json_serializer(mut self, serializer: impl JsonSerializer + 'static) -> Self {
        self.config.json_serializer = Arc::new(serializer);
        self
    }

    /// Set the request middleware.
    pub fn request_middleware(mut self, middleware: impl RequestMiddleware + 'static) -> Self {
        self.config.request_middleware = Some(Arc::new(middleware));
        self
    }

    /// Set the response middleware.
    pub fn response_middleware(mut self, middleware: impl ResponseMiddleware + 'static) -> Self {
        self.config.response_middleware = Some(Arc::new(middleware));
        self
    }

    /// Set the transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.config.transport = Arc::new(transport);
        self
    }

    /// Set a shared transport.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = transport;
        self
    }

    /// Set the per-request timeout passed to the transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.transport_options.timeout = Some(timeout);
        self
    }

    /// Set a cancellation signal shared by every call.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.config.transport_options.signal = Some(signal);
        self
    }

    /// Attach a typed option for custom transports.
    pub fn transport_extension<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.config.transport_options.extensions.insert(value);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GraphQLClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphQLClientConfig::default();
        assert_eq!(config.method, HttpMethod::Post);
        assert_eq!(config.error_policy, ErrorPolicy::None);
        assert!(config.headers.is_none());
        assert!(config.request_middleware.is_none());
        assert!(config.transport_options.timeout.is_none());
    }

    #[test]
    fn test_builder() {
        #[derive(Clone, Debug, PartialEq)]
        struct Tenant(&'static str);

        let config = GraphQLClientConfig::builder()
            .method(HttpMethod::Get)
            .error_policy(ErrorPolicy::All)
            .headers([("authorization", "Bearer x")])
            .timeout(Duration::from_secs(5))
            .transport_extension(Tenant("acme"))
            .build();

        assert_eq!(config.method, HttpMethod::Get);
        assert!(config.error_policy.tolerates_errors());
        assert!(config.headers.is_some());
        assert_eq!(config.transport_options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(
            config.transport_options.extensions.get::<Tenant>(),
            Some(&Tenant("acme"))
        );
    }

    #[test]
    fn test_error_policy_tolerance() {
        assert!(!ErrorPolicy::None.tolerates_errors());
        assert!(ErrorPolicy::All.tolerates_errors());
        assert!(ErrorPolicy::Ignore.tolerates_errors());
    }
}
