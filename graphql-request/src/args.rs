//! Argument normalization.
//!
//! Every call shape (positional document/variables/headers tuples or an
//! options value) is turned into one canonical request before anything is
//! built or sent.

use graphql_client::QueryBody;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::document::{DocumentNode, RequestDocument};
use crate::headers::HeadersInit;
use crate::request::RequestQuery;
use crate::{GraphQLError, Result};

/// Options for a single operation.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// The document to execute.
    pub document: RequestDocument,
    /// Variables for the operation.
    pub variables: Option<Value>,
    /// Headers for this call only. They override client headers.
    pub request_headers: Option<HeadersInit>,
    /// Cancellation signal forwarded to the transport.
    pub signal: Option<CancellationToken>,
}

impl RequestOptions {
    /// Create options for a document.
    pub fn new(document: impl Into<RequestDocument>) -> Self {
        Self {
            document: document.into(),
            variables: None,
            request_headers: None,
            signal: None,
        }
    }

    /// Set variables.
    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Set variables from any serializable value.
    pub fn try_variables<T: Serialize>(mut self, variables: T) -> Result<Self> {
        self.variables = Some(serde_json::to_value(variables)?);
        Ok(self)
    }

    /// Add a header for this call.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.request_headers
            .get_or_insert_with(HeadersInit::default)
            .set(name, value)?;
        Ok(self)
    }

    /// Replace the headers for this call.
    pub fn request_headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.request_headers = Some(headers.into());
        self
    }

    /// Set the cancellation signal.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub(crate) fn into_canonical(self) -> CanonicalRequest {
        let resolved = self.document.resolve();
        CanonicalRequest {
            query: RequestQuery::Single(resolved.query),
            variables: self.variables,
            operation_name: resolved.operation_name,
            request_headers: self.request_headers,
            signal: self.signal,
        }
    }
}

impl<V: Serialize> TryFrom<QueryBody<V>> for RequestOptions {
    type Error = GraphQLError;

    fn try_from(body: QueryBody<V>) -> Result<Self> {
        RequestOptions::new(body.query).try_variables(body.variables)
    }
}

/// Supported call shapes for single and raw requests.
#[derive(Debug, Clone)]
pub enum RequestArgs {
    /// `(document)`
    Document(RequestDocument),
    /// `(document, variables)`
    WithVariables(RequestDocument, Value),
    /// `(document, variables, headers)`
    WithHeaders(RequestDocument, Value, HeadersInit),
    /// A full options value.
    Options(RequestOptions),
}

/// Collapse any single-request call shape into options.
pub fn parse_request_args(args: impl Into<RequestArgs>) -> RequestOptions {
    match args.into() {
        RequestArgs::Document(document) => RequestOptions::new(document),
        RequestArgs::WithVariables(document, variables) => {
            RequestOptions::new(document).variables(variables)
        }
        RequestArgs::WithHeaders(document, variables, headers) => RequestOptions::new(document)
            .variables(variables)
            .request_headers(headers),
        RequestArgs::Options(options) => options,
    }
}

impl From<RequestDocument> for RequestArgs {
    fn from(document: RequestDocument) -> Self {
        Self::Document(document)
    }
}

impl From<&str> for RequestArgs {
    fn from(text: &str) -> Self {
        Self::Document(text.into())
    }
}

impl From<String> for RequestArgs {
    fn from(text: String) -> Self {
        Self::Document(text.into())
    }
}

impl From<DocumentNode> for RequestArgs {
    fn from(document: DocumentNode) -> Self {
        Self::Document(document.into())
    }
}

impl<D: Into<RequestDocument>> From<(D, Value)> for RequestArgs {
    fn from((document, variables): (D, Value)) -> Self {
        Self::WithVariables(document.into(), variables)
    }
}

impl<D, H> From<(D, Value, H)> for RequestArgs
where
    D: Into<RequestDocument>,
    H: Into<HeadersInit>,
{
    fn from((document, variables, headers): (D, Value, H)) -> Self {
        Self::WithHeaders(document.into(), variables, headers.into())
    }
}

impl From<RequestOptions> for RequestArgs {
    fn from(options: RequestOptions) -> Self {
        Self::Options(options)
    }
}

/// One operation inside a batch.
#[derive(Debug, Clone)]
pub struct BatchRequestDocument {
    /// The document to execute.
    pub document: RequestDocument,
    /// Variables for this operation.
    pub variables: Option<Value>,
}

impl BatchRequestDocument {
    /// Create an entry without variables.
    pub fn new(document: impl Into<RequestDocument>) -> Self {
        Self {
            document: document.into(),
            variables: None,
        }
    }

    /// Set variables.
    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

impl<D: Into<RequestDocument>> From<(D, Value)> for BatchRequestDocument {
    fn from((document, variables): (D, Value)) -> Self {
        Self::new(document).variables(variables)
    }
}

/// Options for a batch of operations.
#[derive(Debug, Clone, Default)]
pub struct BatchRequestOptions {
    /// Operations, sent and answered in this order.
    pub documents: Vec<BatchRequestDocument>,
    /// Headers for this call only.
    pub request_headers: Option<HeadersInit>,
    /// Cancellation signal forwarded to the transport.
    pub signal: Option<CancellationToken>,
}

impl BatchRequestOptions {
    /// Create options for the given documents.
    pub fn new(documents: Vec<BatchRequestDocument>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    /// Replace the headers for this call.
    pub fn request_headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.request_headers = Some(headers.into());
        self
    }

    /// Set the cancellation signal.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub(crate) fn into_canonical(self) -> CanonicalRequest {
        let has_variables = self.documents.iter().any(|entry| entry.variables.is_some());
        let (queries, variables): (Vec<String>, Vec<Value>) = self
            .documents
            .into_iter()
            .map(|entry| {
                (
                    entry.document.resolve().query,
                    entry.variables.unwrap_or(Value::Null),
                )
            })
            .unzip();

        CanonicalRequest {
            query: RequestQuery::Batch(queries),
            variables: has_variables.then_some(Value::Array(variables)),
            operation_name: None,
            request_headers: self.request_headers,
            signal: self.signal,
        }
    }
}

/// Supported call shapes for batch requests.
#[derive(Debug, Clone)]
pub enum BatchRequestArgs {
    /// `(documents)`
    Documents(Vec<BatchRequestDocument>),
    /// `(documents, headers)`
    WithHeaders(Vec<BatchRequestDocument>, HeadersInit),
    /// A full options value.
    Options(BatchRequestOptions),
}

/// Collapse any batch call shape into options.
pub fn parse_batch_request_args(args: impl Into<BatchRequestArgs>) -> BatchRequestOptions {
    match args.into() {
        BatchRequestArgs::Documents(documents) => BatchRequestOptions::new(documents),
        BatchRequestArgs::WithHeaders(documents, headers) => {
            BatchRequestOptions::new(documents).request_headers(headers)
        }
        BatchRequestArgs::Options(options) => options,
    }
}

impl From<Vec<BatchRequestDocument>> for BatchRequestArgs {
    fn from(documents: Vec<BatchRequestDocument>) -> Self {
        Self::Documents(documents)
    }
}

impl<H: Into<HeadersInit>> From<(Vec<BatchRequestDocument>, H)> for BatchRequestArgs {
    fn from((documents, headers): (Vec<BatchRequestDocument>, H)) -> Self {
        Self::WithHeaders(documents, headers.into())
    }
}

impl From<BatchRequestOptions> for BatchRequestArgs {
    fn from(options: BatchRequestOptions) -> Self {
        Self::Options(options)
    }
}

/// Single-request arguments with the endpoint, for the free functions.
#[derive(Debug, Clone)]
pub struct RequestExtendedArgs {
    /// Endpoint URL.
    pub url: String,
    /// Request arguments.
    pub args: RequestArgs,
}

impl RequestExtendedArgs {
    /// Create extended arguments from a URL and any request call shape.
    pub fn new(url: impl Into<String>, args: impl Into<RequestArgs>) -> Self {
        Self {
            url: url.into(),
            args: args.into(),
        }
    }
}

/// Split extended arguments into the endpoint and options.
pub fn parse_request_extended_args(args: impl Into<RequestExtendedArgs>) -> (String, RequestOptions) {
    let RequestExtendedArgs { url, args } = args.into();
    (url, parse_request_args(args))
}

impl<U, D> From<(U, D)> for RequestExtendedArgs
where
    U: Into<String>,
    D: Into<RequestDocument>,
{
    fn from((url, document): (U, D)) -> Self {
        Self::new(url, RequestArgs::Document(document.into()))
    }
}

impl<U, D> From<(U, D, Value)> for RequestExtendedArgs
where
    U: Into<String>,
    D: Into<RequestDocument>,
{
    fn from((url, document, variables): (U, D, Value)) -> Self {
        Self::new(url, RequestArgs::WithVariables(document.into(), variables))
    }
}

impl<U, D, H> From<(U, D, Value, H)> for RequestExtendedArgs
where
    U: Into<String>,
    D: Into<RequestDocument>,
    H: Into<HeadersInit>,
{
    fn from((url, document, variables, headers): (U, D, Value, H)) -> Self {
        Self::new(
            url,
            RequestArgs::WithHeaders(document.into(), variables, headers.into()),
        )
    }
}

/// Batch arguments with the endpoint, for the free functions.
#[derive(Debug, Clone)]
pub struct BatchRequestExtendedArgs {
    /// Endpoint URL.
    pub url: String,
    /// Batch arguments.
    pub args: BatchRequestArgs,
}

impl BatchRequestExtendedArgs {
    /// Create extended arguments from a URL and any batch call shape.
    pub fn new(url: impl Into<String>, args: impl Into<BatchRequestArgs>) -> Self {
        Self {
            url: url.into(),
            args: args.into(),
        }
    }
}

/// Split extended batch arguments into the endpoint and options.
pub fn parse_batch_request_extended_args(
    args: impl Into<BatchRequestExtendedArgs>,
) -> (String, BatchRequestOptions) {
    let BatchRequestExtendedArgs { url, args } = args.into();
    (url, parse_batch_request_args(args))
}

impl<U: Into<String>> From<(U, Vec<BatchRequestDocument>)> for BatchRequestExtendedArgs {
    fn from((url, documents): (U, Vec<BatchRequestDocument>)) -> Self {
        Self::new(url, BatchRequestArgs::Documents(documents))
    }
}

impl<U, H> From<(U, Vec<BatchRequestDocument>, H)> for BatchRequestExtendedArgs
where
    U: Into<String>,
    H: Into<HeadersInit>,
{
    fn from((url, documents, headers): (U, Vec<BatchRequestDocument>, H)) -> Self {
        Self::new(url, BatchRequestArgs::WithHeaders(documents, headers.into()))
    }
}

/// The single canonical form every call is reduced to.
#[derive(Debug, Clone)]
pub(crate) struct CanonicalRequest {
    pub query: RequestQuery,
    pub variables: Option<Value>,
    pub operation_name: Option<String>,
    pub request_headers: Option<HeadersInit>,
    pub signal: Option<CancellationToken>,
}
