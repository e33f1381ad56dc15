//! Integration tests for the HTTP pipeline over the default reqwest transport.

use graphql_request::*;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, header, headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// POST
// =============================================================================

#[tokio::test]
async fn test_post_query_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("content-type", "application/json"))
        .and(headers(
            "accept",
            vec!["application/graphql-response+json", "application/json"],
        ))
        .and(body_json(json!({
            "query": "query Me { me { id } }",
            "operationName": "Me",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"me": {"id": "1"}}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphQLClient::new(format!("{}/graphql", server.uri()));
    let data: Value = client.request("query Me { me { id } }").await.unwrap();
    assert_eq!(data, json!({"me": {"id": "1"}}));

    server.verify().await;
}

#[tokio::test]
async fn test_free_function_with_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
        .expect(1)
        .mount(&server)
        .await;

    let response = raw_request((
        server.uri(),
        "{ ok }",
        json!({}),
        [("authorization", "Bearer token")],
    ))
    .await
    .unwrap();

    assert_eq!(response.data, Some(json!({"ok": true})));
    assert_eq!(response.status, http::StatusCode::OK);

    server.verify().await;
}

#[tokio::test]
async fn test_graphql_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"errors": [{"message": "boom"}]})),
        )
        .mount(&server)
        .await;

    let err = request::<Value>((server.uri(), "{ me { id } }"))
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(err.client_error().unwrap().message(), "boom");
    assert_eq!(err.graphql_errors().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_json_failure_keeps_body_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(502)
                .insert_header("content-type", "text/plain")
                .set_body_string("bad gateway"),
        )
        .mount(&server)
        .await;

    let err = request::<Value>((server.uri(), "{ a }")).await.unwrap_err();
    let client_error = err.client_error().unwrap();
    assert_eq!(client_error.message(), "GraphQL Error (Code: 502)");
    assert_eq!(client_error.response.error.as_deref(), Some("bad gateway"));
}

#[tokio::test]
async fn test_batch_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!([
            {"query": "{ a }"},
            {"query": "{ b }", "variables": {"x": 1}},
        ])))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"data": {"a": 1}}, {"data": {"b": 2}}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let batch = BatchRequest::new()
        .query("{ a }")
        .query_with_variables("{ b }", json!({"x": 1}));
    let response = GraphQLClient::new(server.uri())
        .batch_requests(batch)
        .await
        .unwrap();

    assert_eq!(response.len(), 2);
    assert_eq!(response.get(1).unwrap().data, Some(json!({"b": 2})));

    server.verify().await;
}

// =============================================================================
// GET
// =============================================================================

#[tokio::test]
async fn test_get_query_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .and(query_param("query", "query Q($id: ID) { node(id: $id) { id } }"))
        .and(query_param("variables", "{\"id\":\"1\"}"))
        .and(query_param("operationName", "Q"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"node": {"id": "1"}}})))
        .expect(1)
        .mount(&server)
        .await;

    let config = GraphQLClientConfig::builder()
        .method(HttpMethod::Get)
        .build();
    let client = GraphQLClient::with_config(format!("{}/graphql", server.uri()), config);

    let data: Value = client
        .request((
            "query Q($id: ID) {\n  # fetch one\n  node(id: $id) { id }\n}",
            json!({"id": "1"}),
        ))
        .await
        .unwrap();
    assert_eq!(data, json!({"node": {"id": "1"}}));

    server.verify().await;
}

// =============================================================================
// Transport behavior
// =============================================================================

#[tokio::test]
async fn test_signal_aborts_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"data": {"a": 1}})),
        )
        .mount(&server)
        .await;

    let signal = CancellationToken::new();
    let cancel = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let client = GraphQLClient::new(server.uri());
    let err = client
        .request::<Value>(RequestOptions::new("{ a }").signal(signal))
        .await
        .unwrap_err();
    assert!(err.is_aborted());
}

#[tokio::test]
async fn test_custom_reqwest_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("user-agent", "graphql-request-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"a": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(
        ReqwestTransportConfig::builder()
            .user_agent("graphql-request-tests")
            .timeout(Duration::from_secs(5))
            .build(),
    )
    .unwrap();
    let config = GraphQLClientConfig::builder().transport(transport).build();
    let client = GraphQLClient::with_config(server.uri(), config);

    let data: Value = client.request("{ a }").await.unwrap();
    assert_eq!(data, json!({"a": 1}));

    server.verify().await;
}

#[tokio::test]
async fn test_invalid_url_is_a_transport_error() {
    let err = request::<Value>(("not a url", "{ a }")).await.unwrap_err();
    assert!(err.is_transport_error());
}
