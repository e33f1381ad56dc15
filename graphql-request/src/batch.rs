//! GraphQL request batching.

use http::{HeaderMap, StatusCode};
use serde_json::Value;

use crate::args::{BatchRequestArgs, BatchRequestDocument, BatchRequestOptions};
use crate::document::RequestDocument;
use crate::headers::HeadersInit;
use crate::{GraphQLResponse, GraphQLResponseError};

/// A batch of GraphQL operations sent in one transport call.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    documents: Vec<BatchRequestDocument>,
    request_headers: Option<HeadersInit>,
}

impl BatchRequest {
    /// Create a new batch request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the batch.
    pub fn with_document(mut self, document: BatchRequestDocument) -> Self {
        self.documents.push(document);
        self
    }

    /// Add an operation without variables.
    pub fn query(self, document: impl Into<RequestDocument>) -> Self {
        self.with_document(BatchRequestDocument::new(document))
    }

    /// Add an operation with variables.
    pub fn query_with_variables(self, document: impl Into<RequestDocument>, variables: Value) -> Self {
        self.with_document(BatchRequestDocument::new(document).variables(variables))
    }

    /// Set per-call headers.
    pub fn request_headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.request_headers = Some(headers.into());
        self
    }

    /// Get the number of operations in the batch.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Get the entries.
    pub fn documents(&self) -> &[BatchRequestDocument] {
        &self.documents
    }
}

impl From<BatchRequest> for BatchRequestOptions {
    fn from(batch: BatchRequest) -> Self {
        let options = BatchRequestOptions::new(batch.documents);
        match batch.request_headers {
            Some(headers) => options.request_headers(headers),
            None => options,
        }
    }
}

impl From<BatchRequest> for BatchRequestArgs {
    fn from(batch: BatchRequest) -> Self {
        Self::Options(batch.into())
    }
}

/// A successful batch: one envelope per operation, in request order.
#[derive(Debug, Clone)]
pub struct BatchResponse {
    responses: Vec<GraphQLResponse<Value>>,
    status: StatusCode,
    headers: HeaderMap,
}

impl BatchResponse {
    /// Create a new batch response.
    pub fn new(responses: Vec<GraphQLResponse<Value>>, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            responses,
            status,
            headers,
        }
    }

    /// Get the number of responses.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Get a specific response by index.
    pub fn get(&self, index: usize) -> Option<&GraphQLResponse<Value>> {
        self.responses.get(index)
    }

    /// Get the responses.
    pub fn responses(&self) -> &[GraphQLResponse<Value>] {
        &self.responses
    }

    /// Consume and return the responses.
    pub fn into_responses(self) -> Vec<GraphQLResponse<Value>> {
        self.responses
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Check if any response has errors.
    pub fn has_errors(&self) -> bool {
        self.responses.iter().any(|r| r.has_errors())
    }

    /// Get all errors from all responses.
    pub fn all_errors(&self) -> Vec<&GraphQLResponseError> {
        self.responses
            .iter()
            .filter_map(|r| r.errors.as_ref())
            .flatten()
            .collect()
    }
}

impl IntoIterator for BatchResponse {
    type Item = GraphQLResponse<Value>;
    type IntoIter = std::vec::IntoIter<GraphQLResponse<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.into_iter()
    }
}

impl<'a> IntoIterator for &'a BatchResponse {
    type Item = &'a GraphQLResponse<Value>;
    type IntoIter = std::slice::Iter<'a, GraphQLResponse<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.iter()
    }
}
