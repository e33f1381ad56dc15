//! # graphql-request
//!
//! A minimal GraphQL client: one request pipeline over an injectable
//! fetch-style transport.
//!
//! ## Features
//!
//! - **GET and POST**: JSON bodies or query-string encoding, including batches
//! - **Batching**: several operations in one transport call, results in order
//! - **Error policies**: fail on any server error, keep errors, or drop them
//! - **Middleware**: rewrite outgoing requests, observe every outcome
//! - **Pluggable transport**: reqwest by default, any async function works
//! - **Subscriptions**: `graphql-transport-ws` WebSocket client
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graphql_request::GraphQLClient;
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct GetUserResponse {
//!     user: User,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GraphQLClient::new("https://api.example.com/graphql");
//!
//!     let response: GetUserResponse = client
//!         .request((
//!             "query GetUser($id: ID!) { user(id: $id) { name } }",
//!             json!({"id": "123"}),
//!         ))
//!         .await?;
//!
//!     println!("User: {}", response.user.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Subscriptions
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use graphql_request::{GraphQLWebSocketClient, WebSocketOptions};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client =
//!         GraphQLWebSocketClient::connect("wss://api.example.com/graphql", WebSocketOptions::default())
//!             .await?;
//!
//!     let mut messages = client.subscribe::<Value>("subscription { messageAdded { id } }", None)?;
//!     while let Some(result) = messages.next().await {
//!         println!("Received: {:?}", result?);
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod batch;
mod client;
mod config;
mod document;
mod error;
mod headers;
mod middleware;
mod request;
mod response;
mod serializer;
mod subscription;
mod transport;

pub use args::{
    BatchRequestArgs, BatchRequestDocument, BatchRequestExtendedArgs, BatchRequestOptions,
    RequestArgs, RequestExtendedArgs, RequestOptions, parse_batch_request_args,
    parse_batch_request_extended_args, parse_request_args, parse_request_extended_args,
};
pub use batch::{BatchRequest, BatchResponse};
pub use client::GraphQLClient;
pub use config::{ErrorPolicy, GraphQLClientConfig, GraphQLClientConfigBuilder};
pub use document::{
    DocumentNode, RequestDocument, ResolvedDocument, extract_operation_name,
    resolve_request_document,
};
pub use error::{
    ClientError, ClientErrorResponse, GraphQLError, GraphQLRequestContext, Result, TransportError,
};
pub use headers::{HeadersConfig, HeadersInit, HeadersProducer};
pub use middleware::{
    HeaderMiddleware, LoggingMiddleware, RequestContext, RequestMiddleware, ResponseMiddleware,
    ResponseOutcome,
};
pub use request::{
    GraphQLRequest, HttpMethod, RequestDescriptor, RequestQuery, TransportOptions, clean_query,
};
pub use response::{
    ErrorLocation, GraphQLClientResponse, GraphQLResponse, GraphQLResponseError, PathSegment,
    format_path, is_json_content_type,
};
pub use serializer::{DefaultJsonSerializer, JsonSerializer};
pub use subscription::{
    GRAPHQL_TRANSPORT_WS_PROTOCOL, GraphQLWebSocketClient, RawSubscription, SubscriptionStream,
    WebSocketOptions,
};
pub use transport::{
    FetchResponse, ReqwestTransport, ReqwestTransportConfig, ReqwestTransportConfigBuilder,
    Transport,
};

// Re-export common types
pub use serde_json::Value as JsonValue;
pub use tokio_util::sync::CancellationToken;

use serde::de::DeserializeOwned;

/// Send one operation to `url` with a default client and return its `data`.
pub async fn request<T: DeserializeOwned>(args: impl Into<RequestExtendedArgs>) -> Result<T> {
    let (url, options) = parse_request_extended_args(args);
    GraphQLClient::new(url).request(options).await
}

/// Send one operation to `url` with a default client and return the full result.
pub async fn raw_request(
    args: impl Into<RequestExtendedArgs>,
) -> Result<GraphQLClientResponse<JsonValue>> {
    let (url, options) = parse_request_extended_args(args);
    GraphQLClient::new(url).raw_request(options).await
}

/// Send a batch to `url` with a default client.
pub async fn batch_requests(args: impl Into<BatchRequestExtendedArgs>) -> Result<BatchResponse> {
    let (url, options) = parse_batch_request_extended_args(args);
    GraphQLClient::new(url).batch_requests(options).await
}
