//! Request and response middleware hooks.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::batch::BatchResponse;
use crate::request::RequestDescriptor;
use crate::response::GraphQLClientResponse;
use crate::{GraphQLError, Result};

/// Call details handed to request middleware next to the built descriptor.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Endpoint URL the request was built for.
    pub url: String,
    /// Resolved operation name, single requests only.
    pub operation_name: Option<String>,
    /// Variables as passed by the caller.
    pub variables: Option<Value>,
}

/// Rewrites the outbound request before it is dispatched.
///
/// The returned descriptor replaces the built one entirely, URL included.
/// Called exactly once per call.
#[async_trait]
pub trait RequestMiddleware: Send + Sync {
    /// Transform the descriptor.
    async fn handle(
        &self,
        request: RequestDescriptor,
        context: RequestContext,
    ) -> Result<RequestDescriptor>;
}

#[async_trait]
impl<F, Fut> RequestMiddleware for F
where
    F: Fn(RequestDescriptor, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestDescriptor>> + Send,
{
    async fn handle(
        &self,
        request: RequestDescriptor,
        context: RequestContext,
    ) -> Result<RequestDescriptor> {
        self(request, context).await
    }
}

/// What a call produced, as seen by response middleware.
#[derive(Debug, Clone, Copy)]
pub enum ResponseOutcome<'a> {
    /// A successful single operation.
    Single(&'a GraphQLClientResponse<Value>),
    /// A successful batch.
    Batch(&'a BatchResponse),
    /// The error about to be returned to the caller.
    Error(&'a GraphQLError),
}

impl ResponseOutcome<'_> {
    /// Check if the call failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Get the error, if the call failed.
    pub fn error(&self) -> Option<&GraphQLError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Observes every call outcome. Cannot change it.
pub trait ResponseMiddleware: Send + Sync {
    /// Observe the outcome.
    fn on_response(&self, outcome: ResponseOutcome<'_>);
}

impl<F> ResponseMiddleware for F
where
    F: for<'a> Fn(ResponseOutcome<'a>) + Send + Sync,
{
    fn on_response(&self, outcome: ResponseOutcome<'_>) {
        self(outcome)
    }
}

/// Request middleware that adds a fixed header to every request.
pub struct HeaderMiddleware {
    name: http::HeaderName,
    value: http::HeaderValue,
}

impl HeaderMiddleware {
    /// Create a new header middleware.
    pub fn new(name: &str, value: &str) -> Result<Self> {
        let name = http::HeaderName::try_from(name)
            .map_err(|e| GraphQLError::InvalidArgument(format!("invalid header name: {}", e)))?;
        let value = http::HeaderValue::try_from(value)
            .map_err(|e| GraphQLError::InvalidArgument(format!("invalid header value: {}", e)))?;
        Ok(Self { name, value })
    }
}

#[async_trait]
impl RequestMiddleware for HeaderMiddleware {
    async fn handle(
        &self,
        mut request: RequestDescriptor,
        _context: RequestContext,
    ) -> Result<RequestDescriptor> {
        request.headers.insert(self.name.clone(), self.value.clone());
        Ok(request)
    }
}

/// Response middleware that logs each outcome.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

impl ResponseMiddleware for LoggingMiddleware {
    fn on_response(&self, outcome: ResponseOutcome<'_>) {
        match outcome {
            ResponseOutcome::Single(response) => tracing::debug!(
                status = %response.status,
                has_errors = response.has_errors(),
                "GraphQL response"
            ),
            ResponseOutcome::Batch(batch) => tracing::debug!(
                status = %batch.status(),
                count = batch.len(),
                "GraphQL batch response"
            ),
            ResponseOutcome::Error(err) => tracing::warn!(error = %err, "GraphQL call failed"),
        }
    }
}
