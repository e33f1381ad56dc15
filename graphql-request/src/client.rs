//! GraphQL client implementation.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::args::{
    BatchRequestArgs, CanonicalRequest, RequestArgs, parse_batch_request_args, parse_request_args,
};
use crate::error::GraphQLRequestContext;
use crate::headers::{HeadersConfig, HeadersInit, resolve_headers};
use crate::middleware::{RequestContext, ResponseOutcome};
use crate::request::{BuildParams, append_query_string, build_request};
use crate::response::{GraphQLClientResponse, Interpreted, interpret, read_body};
use crate::{BatchResponse, GraphQLClientConfig, GraphQLError, Result};

/// GraphQL client.
///
/// Every call reads the configuration as it is at call time, so concurrent
/// calls on clones of one client never interfere.
#[derive(Debug, Clone)]
pub struct GraphQLClient {
    url: String,
    config: Arc<GraphQLClientConfig>,
}

impl GraphQLClient {
    /// Create a new GraphQL client with the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(url, GraphQLClientConfig::default())
    }

    /// Create a new GraphQL client with custom configuration.
    pub fn with_config(url: impl Into<String>, config: GraphQLClientConfig) -> Self {
        Self {
            url: url.into(),
            config: Arc::new(config),
        }
    }

    /// Get the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the configuration.
    pub fn config(&self) -> &GraphQLClientConfig {
        &self.config
    }

    /// Replace the endpoint URL.
    pub fn set_endpoint(&mut self, url: impl Into<String>) -> &mut Self {
        self.url = url.into();
        self
    }

    /// Replace the default headers.
    pub fn set_headers(&mut self, headers: impl Into<HeadersConfig>) -> &mut Self {
        Arc::make_mut(&mut self.config).headers = Some(headers.into());
        self
    }

    /// Set one default header, keeping the others.
    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        let config = Arc::make_mut(&mut self.config);
        config
            .headers
            .get_or_insert_with(|| HeadersConfig::Static(HeadersInit::default()))
            .set(name, value)?;
        Ok(self)
    }

    /// Execute one operation and deserialize its `data`.
    pub async fn request<T: DeserializeOwned>(&self, args: impl Into<RequestArgs>) -> Result<T> {
        let response = self.raw_request(args).await?;
        let data = response.data.ok_or(GraphQLError::MissingData)?;
        Ok(serde_json::from_value(data)?)
    }

    /// Execute one operation and return the full result with HTTP metadata.
    pub async fn raw_request(
        &self,
        args: impl Into<RequestArgs>,
    ) -> Result<GraphQLClientResponse<Value>> {
        let canonical = parse_request_args(args).into_canonical();
        match self.execute(canonical).await? {
            Interpreted::Single(response) => Ok(response),
            Interpreted::Batch(_) => Err(GraphQLError::MissingData),
        }
    }

    /// Execute several operations in one transport call.
    pub async fn batch_requests(&self, args: impl Into<BatchRequestArgs>) -> Result<BatchResponse> {
        let canonical = parse_batch_request_args(args).into_canonical();
        match self.execute(canonical).await? {
            Interpreted::Batch(batch) => Ok(batch),
            Interpreted::Single(_) => Err(GraphQLError::MissingData),
        }
    }

    /// Run the pipeline, then let response middleware observe the outcome.
    async fn execute(&self, request: CanonicalRequest) -> Result<Interpreted> {
        let result = self.dispatch(request).await;

        if let Some(middleware) = &self.config.response_middleware {
            let outcome = match &result {
                Ok(Interpreted::Single(response)) => ResponseOutcome::Single(response),
                Ok(Interpreted::Batch(batch)) => ResponseOutcome::Batch(batch),
                Err(err) => ResponseOutcome::Error(err),
            };
            middleware.on_response(outcome);
        }

        result
    }

    async fn dispatch(&self, request: CanonicalRequest) -> Result<Interpreted> {
        let CanonicalRequest {
            query,
            variables,
            operation_name,
            request_headers,
            signal,
        } = request;
        let config = &self.config;
        let serializer = config.json_serializer.as_ref();

        let headers = resolve_headers(config.headers.as_ref(), request_headers.as_ref())?;

        let mut options = config.transport_options.clone();
        if signal.is_some() {
            options.signal = signal;
        }

        let params = BuildParams {
            query: &query,
            variables: variables.as_ref(),
            operation_name: operation_name.as_deref(),
            serializer,
        };
        let (mut descriptor, query_string) =
            build_request(config.method, &self.url, headers, params, options)?;

        if let Some(middleware) = &config.request_middleware {
            let context = RequestContext {
                url: self.url.clone(),
                operation_name: operation_name.clone(),
                variables: variables.clone(),
            };
            descriptor = middleware.handle(descriptor, context).await?;
            debug!(url = %descriptor.url, "Request middleware applied");
        }

        descriptor.url = append_query_string(&descriptor.url, &query_string);

        let batch = query.is_batch();
        debug!(
            method = %descriptor.method,
            url = %descriptor.url,
            operation = operation_name.as_deref().unwrap_or(""),
            batch,
            "Executing GraphQL request"
        );

        let response = config.transport.fetch(descriptor).await?;
        debug!(
            status = %response.status(),
            content_type = response.content_type().unwrap_or(""),
            "Received GraphQL response"
        );

        let body = read_body(&response, serializer)?;
        interpret(
            &response,
            body,
            config.error_policy,
            batch,
            GraphQLRequestContext { query, variables },
        )
    }
}
