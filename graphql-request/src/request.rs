//! Wire-level request construction: POST bodies, GET query strings, descriptors.

use http::{HeaderMap, HeaderValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::headers::{ACCEPT_HEADER, CONTENT_TYPE_HEADER, CONTENT_TYPE_JSON};
use crate::serializer::JsonSerializer;
use crate::{GraphQLError, Result};

/// Default Accept value: the GraphQL response media type, then generic JSON.
const ACCEPT_VALUE: &str = "application/graphql-response+json, application/json";

/// Runs of whitespace, commas and `#` comments.
static INSIGNIFICANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\s,]|#[^\n\r]+)+").expect("static regex is valid"));

/// HTTP method used to send operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    /// Operation encoded in the query string.
    Get,
    /// Operation encoded in a JSON body.
    #[default]
    Post,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
        }
    }
}

/// Query text of one call: a single operation or a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestQuery {
    /// One operation.
    Single(String),
    /// Several operations sent in one transport call.
    Batch(Vec<String>),
}

impl RequestQuery {
    /// Check if this is a batch.
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }
}

/// Options handed to the transport untouched.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Cancellation signal. The transport aborts when it fires.
    pub signal: Option<CancellationToken>,
    /// Arbitrary typed options for custom transports.
    pub extensions: http::Extensions,
}

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Target URL, including any query string.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Outgoing headers.
    pub headers: HeaderMap,
    /// JSON body for POST; `None` for GET.
    pub body: Option<String>,
    /// Pass-through transport options.
    pub options: TransportOptions,
}

/// JSON payload of one operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    /// The GraphQL document.
    pub query: String,
    /// Variables for the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Operation name (for documents with multiple operations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

/// Normalized input shared by the POST and GET builders.
#[derive(Clone, Copy)]
pub(crate) struct BuildParams<'a> {
    pub query: &'a RequestQuery,
    pub variables: Option<&'a Value>,
    pub operation_name: Option<&'a str>,
    pub serializer: &'a dyn JsonSerializer,
}

/// Collapse whitespace, commas and comments to single spaces for GET transmission.
pub fn clean_query(query: &str) -> String {
    INSIGNIFICANT.replace_all(query, " ").trim().to_string()
}

/// Check that the variables shape matches the query shape.
///
/// Single operations take an object (or nothing); batches take an array with
/// one entry per operation (or nothing).
pub(crate) fn validate_variables(query: &RequestQuery, variables: Option<&Value>) -> Result<()> {
    match (query, variables) {
        (_, None) | (_, Some(Value::Null)) => Ok(()),
        (RequestQuery::Single(_), Some(Value::Array(_))) => Err(GraphQLError::InvalidArgument(
            "variables must not be an array for a single operation".to_string(),
        )),
        (RequestQuery::Single(_), Some(_)) => Ok(()),
        (RequestQuery::Batch(queries), Some(Value::Array(variables))) => {
            if variables.len() == queries.len() {
                Ok(())
            } else {
                Err(GraphQLError::InvalidArgument(format!(
                    "batch has {} operations but {} variable sets",
                    queries.len(),
                    variables.len()
                )))
            }
        }
        (RequestQuery::Batch(_), Some(_)) => Err(GraphQLError::InvalidArgument(
            "cannot send batch with given variable type, array expected".to_string(),
        )),
    }
}

fn batch_variables<'a>(variables: Option<&'a Value>, index: usize) -> Option<&'a Value> {
    variables
        .and_then(|v| v.get(index))
        .filter(|v| !v.is_null())
}

/// Serialize the POST body.
pub(crate) fn create_request_body(params: BuildParams<'_>) -> Result<String> {
    validate_variables(params.query, params.variables)?;

    let payload = match params.query {
        RequestQuery::Single(query) => serde_json::to_value(GraphQLRequest {
            query: query.clone(),
            variables: params.variables.filter(|v| !v.is_null()).cloned(),
            operation_name: params.operation_name.map(str::to_string),
        })?,
        RequestQuery::Batch(queries) => {
            let entries = queries
                .iter()
                .enumerate()
                .map(|(index, query)| GraphQLRequest {
                    query: query.clone(),
                    variables: batch_variables(params.variables, index).cloned(),
                    operation_name: None,
                })
                .collect::<Vec<_>>();
            serde_json::to_value(entries)?
        }
    };

    Ok(params.serializer.stringify(&payload)?)
}

/// Build the GET query string (without the leading `?`).
pub(crate) fn build_query_string(params: BuildParams<'_>) -> Result<String> {
    validate_variables(params.query, params.variables)?;

    match params.query {
        RequestQuery::Single(query) => {
            let mut search = vec![format!("query={}", urlencoding::encode(&clean_query(query)))];
            if let Some(variables) = params.variables.filter(|v| !v.is_null()) {
                let json = params.serializer.stringify(variables)?;
                search.push(format!("variables={}", urlencoding::encode(&json)));
            }
            if let Some(operation_name) = params.operation_name {
                search.push(format!("operationName={}", urlencoding::encode(operation_name)));
            }
            Ok(search.join("&"))
        }
        RequestQuery::Batch(queries) => {
            let mut payload = Vec::with_capacity(queries.len());
            for (index, query) in queries.iter().enumerate() {
                let mut entry = serde_json::Map::new();
                entry.insert("query".to_string(), Value::String(clean_query(query)));
                if let Some(variables) = batch_variables(params.variables, index) {
                    let json = params.serializer.stringify(variables)?;
                    entry.insert("variables".to_string(), Value::String(json));
                }
                payload.push(Value::Object(entry));
            }
            let json = params.serializer.stringify(&Value::Array(payload))?;
            Ok(format!("query={}", urlencoding::encode(&json)))
        }
    }
}

/// Append a query string to a URL.
pub(crate) fn append_query_string(url: &str, query_string: &str) -> String {
    if query_string.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query_string)
}

/// Build the descriptor for `method`.
///
/// Returns the descriptor and, for GET, the query string to append to the
/// final URL after request middleware has run.
pub(crate) fn build_request(
    method: HttpMethod,
    url: &str,
    mut headers: HeaderMap,
    params: BuildParams<'_>,
    options: TransportOptions,
) -> Result<(RequestDescriptor, String)> {
    if !headers.contains_key(ACCEPT_HEADER) {
        headers.insert(
            http::header::ACCEPT,
            HeaderValue::from_static(ACCEPT_VALUE),
        );
    }

    let (body, query_string) = match method {
        HttpMethod::Post => {
            let body = create_request_body(params)?;
            if !headers.contains_key(CONTENT_TYPE_HEADER) {
                headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static(CONTENT_TYPE_JSON),
                );
            }
            (Some(body), String::new())
        }
        HttpMethod::Get => (None, build_query_string(params)?),
    };

    let descriptor = RequestDescriptor {
        url: url.to_string(),
        method,
        headers,
        body,
        options,
    };

    Ok((descriptor, query_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::DefaultJsonSerializer;
    use serde_json::json;

    fn params<'a>(
        query: &'a RequestQuery,
        variables: Option<&'a Value>,
        operation_name: Option<&'a str>,
    ) -> BuildParams<'a> {
        BuildParams {
            query,
            variables,
            operation_name,
            serializer: &DefaultJsonSerializer,
        }
    }

    fn decode_pairs(query_string: &str) -> Vec<(String, String)> {
        url::form_urlencoded::parse(query_string.as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn test_clean_query_strips_comments_and_whitespace() {
        let query = "\n  # fetch the viewer\n  query Me {\n    me {\n      id,\n      name\n    }\n  }\n";
        assert_eq!(clean_query(query), "query Me { me { id name } }");
    }

    #[test]
    fn test_clean_query_is_idempotent() {
        let query = "{ a #c\n  b }";
        let once = clean_query(query);
        assert_eq!(once, "{ a b }");
        assert_eq!(clean_query(&once), once);
    }

    #[test]
    fn test_post_body_single() {
        let query = RequestQuery::Single("query Me { me { id } }".to_string());
        let variables = json!({"id": "1"});
        let body = create_request_body(params(&query, Some(&variables), Some("Me"))).unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!({"query": "query Me { me { id } }", "variables": {"id": "1"}, "operationName": "Me"})
        );
    }

    #[test]
    fn test_post_body_omits_absent_fields() {
        let query = RequestQuery::Single("{ me { id } }".to_string());
        let body = create_request_body(params(&query, None, None)).unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"query": "{ me { id } }"}));
    }

    #[test]
    fn test_post_body_batch() {
        let query = RequestQuery::Batch(vec!["{ a }".to_string(), "{ b }".to_string()]);
        let variables = json!([{"x": 1}, null]);
        let body = create_request_body(params(&query, Some(&variables), None)).unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!([{"query": "{ a }", "variables": {"x": 1}}, {"query": "{ b }"}])
        );
    }

    #[test]
    fn test_variable_shape_is_checked_for_both_methods() {
        let batch = RequestQuery::Batch(vec!["{ a }".to_string()]);
        let object = json!({"x": 1});
        assert!(matches!(
            create_request_body(params(&batch, Some(&object), None)),
            Err(GraphQLError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_query_string(params(&batch, Some(&object), None)),
            Err(GraphQLError::InvalidArgument(_))
        ));

        let too_many = json!([{}, {}]);
        assert!(create_request_body(params(&batch, Some(&too_many), None)).is_err());
        assert!(build_query_string(params(&batch, Some(&too_many), None)).is_err());

        let single = RequestQuery::Single("{ a }".to_string());
        let array = json!([{"x": 1}]);
        assert!(create_request_body(params(&single, Some(&array), None)).is_err());
        assert!(build_query_string(params(&single, Some(&array), None)).is_err());
    }

    #[test]
    fn test_query_string_single() {
        let query = RequestQuery::Single("query Me($id: ID!) {\n  # c\n  user(id: $id) { id }\n}".to_string());
        let variables = json!({"id": "1"});
        let qs = build_query_string(params(&query, Some(&variables), Some("Me"))).unwrap();
        assert!(qs.starts_with("query=query%20Me"));

        let pairs = decode_pairs(&qs);
        assert_eq!(
            pairs,
            vec![
                ("query".to_string(), "query Me($id: ID!) { user(id: $id) { id } }".to_string()),
                ("variables".to_string(), r#"{"id":"1"}"#.to_string()),
                ("operationName".to_string(), "Me".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_string_is_deterministic() {
        let query = RequestQuery::Single("{  me  #x\n { id } }".to_string());
        let variables = json!({"b": 1, "a": 2});
        let first = build_query_string(params(&query, Some(&variables), None)).unwrap();
        let second = build_query_string(params(&query, Some(&variables), None)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_query_string_batch_packs_single_parameter() {
        let query = RequestQuery::Batch(vec!["{ a }".to_string(), "{\n  b\n}".to_string()]);
        let variables = json!([{"x": 1}, null]);
        let qs = build_query_string(params(&query, Some(&variables), None)).unwrap();

        let pairs = decode_pairs(&qs);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "query");
        let payload: Value = serde_json::from_str(&pairs[0].1).unwrap();
        assert_eq!(
            payload,
            json!([{"query": "{ a }", "variables": "{\"x\":1}"}, {"query": "{ b }"}])
        );
    }

    #[test]
    fn test_build_request_sets_default_headers() {
        let query = RequestQuery::Single("{ a }".to_string());
        let (descriptor, qs) = build_request(
            HttpMethod::Post,
            "https://api.example/graphql",
            HeaderMap::new(),
            params(&query, None, None),
            TransportOptions::default(),
        )
        .unwrap();

        assert!(qs.is_empty());
        assert_eq!(descriptor.method, HttpMethod::Post);
        assert_eq!(
            descriptor.headers.get("accept").unwrap(),
            "application/graphql-response+json, application/json"
        );
        assert_eq!(descriptor.headers.get("content-type").unwrap(), "application/json");
        assert!(descriptor.body.is_some());
    }

    #[test]
    fn test_build_request_keeps_caller_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers.insert("content-type", HeaderValue::from_static("application/vnd.custom+json"));

        let query = RequestQuery::Single("{ a }".to_string());
        let (descriptor, _) = build_request(
            HttpMethod::Post,
            "https://api.example/graphql",
            headers,
            params(&query, None, None),
            TransportOptions::default(),
        )
        .unwrap();

        assert_eq!(descriptor.headers.get("accept").unwrap(), "application/json");
        assert_eq!(
            descriptor.headers.get("content-type").unwrap(),
            "application/vnd.custom+json"
        );
    }

    #[test]
    fn test_build_request_get_has_no_body() {
        let query = RequestQuery::Single("{ a }".to_string());
        let (descriptor, qs) = build_request(
            HttpMethod::Get,
            "https://api.example/graphql",
            HeaderMap::new(),
            params(&query, None, None),
            TransportOptions::default(),
        )
        .unwrap();

        assert!(descriptor.body.is_none());
        assert!(descriptor.headers.get("content-type").is_none());
        assert_eq!(qs, "query=%7B%20a%20%7D");
    }

    #[test]
    fn test_append_query_string() {
        assert_eq!(append_query_string("https://a/graphql", "query=x"), "https://a/graphql?query=x");
        assert_eq!(
            append_query_string("https://a/graphql?v=1", "query=x"),
            "https://a/graphql?v=1&query=x"
        );
        assert_eq!(append_query_string("https://a/graphql", ""), "https://a/graphql");
    }
}
