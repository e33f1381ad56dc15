//! GraphQL client error types.

use http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use thiserror::Error;

use crate::request::RequestQuery;
use crate::response::GraphQLResponseError;

/// Result type for GraphQL client operations.
pub type Result<T> = std::result::Result<T, GraphQLError>;

/// GraphQL client errors.
#[derive(Debug, Error)]
pub enum GraphQLError {
    /// The call arguments had an unsupported shape. Raised before any network activity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The server response failed the success conditions.
    #[error("{0}")]
    Client(Box<ClientError>),

    /// The transport failed. Passed through as produced by the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request middleware rejected the request.
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// WebSocket error (for subscriptions).
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Subscription error.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// GraphQL errors delivered over a subscription.
    #[error("GraphQL errors: {0:?}")]
    GraphQL(Vec<GraphQLResponseError>),

    /// A response envelope carried no data.
    #[error("Response contained no data")]
    MissingData,
}

impl GraphQLError {
    /// Check if this is a response-classification failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Client(_))
    }

    /// Check if this error came from the transport.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::WebSocket(_))
    }

    /// Check if the transport aborted the call.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Aborted))
    }

    /// Get the client error, if this is one.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::Client(err) => Some(err),
            _ => None,
        }
    }

    /// Get GraphQL errors reported by the server, if any.
    pub fn graphql_errors(&self) -> Option<&[GraphQLResponseError]> {
        match self {
            Self::Client(err) => err.response.errors.as_deref(),
            Self::GraphQL(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ClientError> for GraphQLError {
    fn from(err: ClientError) -> Self {
        Self::Client(Box::new(err))
    }
}

/// Errors produced by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cancellation signal fired before the response was received.
    #[error("Request aborted")]
    Aborted,

    /// The descriptor could not be turned into a request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error from a custom transport.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap an arbitrary error from a custom transport.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }
}

/// The server side of a failed call.
#[derive(Debug, Clone)]
pub struct ClientErrorResponse {
    /// `data` of a single response.
    pub data: Option<Value>,
    /// `errors` of a single response.
    pub errors: Option<Vec<GraphQLResponseError>>,
    /// `extensions` of a single response.
    pub extensions: Option<Value>,
    /// Body text when the response was not JSON.
    pub error: Option<String>,
    /// Raw entries of a batch response.
    pub batch: Option<Vec<Value>>,
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

/// The request that produced a failed call.
#[derive(Debug, Clone)]
pub struct GraphQLRequestContext {
    /// Query text, one per operation in batch mode.
    pub query: RequestQuery,
    /// Variables as sent.
    pub variables: Option<Value>,
}

/// Raised when a response fails the status, data, or error-policy check.
#[derive(Debug, Clone)]
pub struct ClientError {
    /// What the server returned.
    pub response: ClientErrorResponse,
    /// What was sent.
    pub request: GraphQLRequestContext,
}

impl ClientError {
    /// Create a new client error.
    pub fn new(response: ClientErrorResponse, request: GraphQLRequestContext) -> Self {
        Self { response, request }
    }

    /// First server error message, or a generic message with the status code.
    pub fn message(&self) -> String {
        self.response
            .errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|error| error.message.clone())
            .unwrap_or_else(|| format!("GraphQL Error (Code: {})", self.response.status.as_u16()))
    }

    /// HTTP status of the failed response.
    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    fn context_json(&self) -> Value {
        let response = &self.response;
        json!({
            "response": {
                "data": response.data,
                "errors": response.errors,
                "extensions": response.extensions,
                "error": response.error,
                "batch": response.batch,
                "status": response.status.as_u16(),
            },
            "request": {
                "query": self.request.query,
                "variables": self.request.variables,
            },
        })
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.message(), self.context_json())
    }
}

impl std::error::Error for ClientError {}
