//! GraphQL response types and response interpretation.

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::batch::BatchResponse;
use crate::config::ErrorPolicy;
use crate::error::{ClientError, ClientErrorResponse, GraphQLRequestContext};
use crate::headers::{CONTENT_TYPE_GQL, CONTENT_TYPE_JSON};
use crate::serializer::JsonSerializer;
use crate::transport::FetchResponse;
use crate::Result;

/// GraphQL response envelope from the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphQLResponse<T = Value> {
    /// The data returned by the query/mutation.
    #[serde(default)]
    pub data: Option<T>,
    /// Errors returned by the server.
    #[serde(
        default,
        deserialize_with = "deserialize_errors",
        skip_serializing_if = "Option::is_none"
    )]
    pub errors: Option<Vec<GraphQLResponseError>>,
    /// Extensions (for tracing, caching info, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl<T> GraphQLResponse<T> {
    /// Check if the response has errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Get the data, returning an error if there are GraphQL errors.
    pub fn into_result(self) -> crate::Result<T> {
        if let Some(errors) = self.errors
            && !errors.is_empty()
        {
            return Err(crate::GraphQLError::GraphQL(errors));
        }
        self.data.ok_or(crate::GraphQLError::MissingData)
    }

    /// Get the data, ignoring any errors.
    pub fn data(self) -> Option<T> {
        self.data
    }

    /// Get the errors.
    pub fn errors(&self) -> Option<&[GraphQLResponseError]> {
        self.errors.as_deref()
    }
}

/// A successful single-operation call: the envelope plus HTTP metadata.
#[derive(Debug, Clone)]
pub struct GraphQLClientResponse<T = Value> {
    /// The data returned by the operation.
    pub data: Option<T>,
    /// Errors, kept only under the `all` error policy.
    pub errors: Option<Vec<GraphQLResponseError>>,
    /// Extensions.
    pub extensions: Option<Value>,
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

impl<T> GraphQLClientResponse<T> {
    /// Check if the response has errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Drop the HTTP metadata.
    pub fn into_envelope(self) -> GraphQLResponse<T> {
        GraphQLResponse {
            data: self.data,
            errors: self.errors,
            extensions: self.extensions,
        }
    }
}

/// A GraphQL error from the server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GraphQLResponseError {
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Locations in the query where the error occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ErrorLocation>>,
    /// Path to the field that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Additional error extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLResponseError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }

    /// Build an error from whatever the server put in the `errors` list.
    ///
    /// Entries that do not fit the usual shape keep their raw JSON in
    /// `extensions` and take their message from a `message` field or the
    /// value itself.
    pub fn from_value(value: Value) -> Self {
        if let Ok(error) = serde_json::from_value::<Self>(value.clone()) {
            return error;
        }
        let message = match &value {
            Value::String(message) => message.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        };
        Self {
            message,
            locations: None,
            path: None,
            extensions: Some(value),
        }
    }
}

/// Parse an `errors` member. A lone error object counts as a list of one.
pub(crate) fn parse_errors(value: Value) -> Option<Vec<GraphQLResponseError>> {
    match value {
        Value::Null => None,
        Value::Array(entries) => Some(
            entries
                .into_iter()
                .map(GraphQLResponseError::from_value)
                .collect(),
        ),
        other => Some(vec![GraphQLResponseError::from_value(other)]),
    }
}

fn deserialize_errors<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<GraphQLResponseError>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(parse_errors))
}

impl std::fmt::Display for GraphQLResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(locations) = &self.locations
            && !locations.is_empty()
        {
            write!(f, " at ")?;
            for (i, loc) in locations.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}:{}", loc.line, loc.column)?;
            }
        }
        Ok(())
    }
}

/// Location in the GraphQL query.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorLocation {
    /// Line number (1-indexed).
    #[serde(default)]
    pub line: u32,
    /// Column number (1-indexed).
    #[serde(default)]
    pub column: u32,
}

/// Path segment in a GraphQL error.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Field name.
    Field(String),
    /// Array index.
    Index(usize),
    /// Anything else a server put in the path.
    Other(Value),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{}", name),
            Self::Index(idx) => write!(f, "[{}]", idx),
            Self::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Format a path as a string.
pub fn format_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Deserialized response body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResponseBody {
    /// Body parsed as JSON.
    Json(Value),
    /// Body kept as text.
    Text(String),
}

/// Check whether a content type is one we parse as JSON.
pub fn is_json_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains(CONTENT_TYPE_GQL) || content_type.contains(CONTENT_TYPE_JSON)
}

/// Read the body, parsing it only when the content type is JSON.
pub(crate) fn read_body(
    response: &FetchResponse,
    serializer: &dyn JsonSerializer,
) -> Result<ResponseBody> {
    let text = response.text();
    match response.content_type() {
        Some(content_type) if is_json_content_type(content_type) => {
            Ok(ResponseBody::Json(serializer.parse(&text)?))
        }
        _ => Ok(ResponseBody::Text(text)),
    }
}

/// Outcome of a call that passed every success condition.
#[derive(Debug, Clone)]
pub(crate) enum Interpreted {
    Single(GraphQLClientResponse<Value>),
    Batch(BatchResponse),
}

fn has_data(entry: &Value) -> bool {
    entry.get("data").is_some_and(|data| !data.is_null())
}

fn has_errors(entry: &Value) -> bool {
    match entry.get("errors") {
        None | Some(Value::Null) => false,
        Some(Value::Array(errors)) => !errors.is_empty(),
        Some(_) => true,
    }
}

/// Decide success or failure for a received response.
///
/// Success needs a 2xx status, data in every envelope and, for single
/// operations, no errors unless the policy is `all` or `ignore`.
pub(crate) fn interpret(
    response: &FetchResponse,
    body: ResponseBody,
    policy: ErrorPolicy,
    batch: bool,
    request: GraphQLRequestContext,
) -> Result<Interpreted> {
    let ok = response.ok();
    let status = response.status();

    match (batch, &body) {
        (true, ResponseBody::Json(Value::Array(entries))) if ok && entries.iter().all(has_data) => {
            let envelopes = entries
                .iter()
                .cloned()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<GraphQLResponse<Value>>, _>>()?;
            debug!(status = %status, count = envelopes.len(), "Batch request succeeded");
            return Ok(Interpreted::Batch(BatchResponse::new(
                envelopes,
                status,
                response.headers().clone(),
            )));
        }
        (false, ResponseBody::Json(value @ Value::Object(_))) if ok && has_data(value) => {
            if !has_errors(value) || policy.tolerates_errors() {
                let mut value = value.clone();
                if policy == ErrorPolicy::Ignore
                    && let Some(object) = value.as_object_mut()
                {
                    object.remove("errors");
                }
                let envelope: GraphQLResponse<Value> = serde_json::from_value(value)?;
                debug!(status = %status, "Request succeeded");
                return Ok(Interpreted::Single(GraphQLClientResponse {
                    data: envelope.data,
                    errors: envelope.errors,
                    extensions: envelope.extensions,
                    status,
                    headers: response.headers().clone(),
                }));
            }
        }
        _ => {}
    }

    warn!(status = %status, batch, "Request failed");
    Err(ClientError::new(error_response(body, response), request).into())
}

fn error_response(body: ResponseBody, response: &FetchResponse) -> ClientErrorResponse {
    let mut error = ClientErrorResponse {
        data: None,
        errors: None,
        extensions: None,
        error: None,
        batch: None,
        status: response.status(),
        headers: response.headers().clone(),
    };

    match body {
        ResponseBody::Json(Value::Object(mut object)) => {
            error.data = object.remove("data").filter(|v| !v.is_null());
            error.errors = object.remove("errors").and_then(parse_errors);
            error.extensions = object.remove("extensions").filter(|v| !v.is_null());
        }
        ResponseBody::Json(Value::Array(entries)) => error.batch = Some(entries),
        ResponseBody::Json(other) => error.error = Some(other.to_string()),
        ResponseBody::Text(text) => error.error = Some(text),
    }

    error
}
