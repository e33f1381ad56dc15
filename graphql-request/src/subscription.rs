//! GraphQL over WebSocket using the `graphql-transport-ws` protocol.

use futures::Stream;
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, info, trace, warn};

use crate::document::RequestDocument;
use crate::headers::HeadersInit;
use crate::{GraphQLError, GraphQLResponse, GraphQLResponseError, Result};

use self::protocol::{ClientMessage, ServerMessage, SubscribePayload};

/// WebSocket subprotocol spoken by the client.
pub const GRAPHQL_TRANSPORT_WS_PROTOCOL: &str = "graphql-transport-ws";

type Event = Result<GraphQLResponse<Value>>;

/// A typed GraphQL subscription stream.
pub struct SubscriptionStream<T = Value> {
    inner: Pin<Box<dyn Stream<Item = Result<GraphQLResponse<T>>> + Send>>,
}

impl<T> SubscriptionStream<T> {
    /// Create a new subscription stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<GraphQLResponse<T>>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl<T> Stream for SubscriptionStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .as_mut()
            .poll_next(cx)
            .map(|item| item.map(|result| result.and_then(GraphQLResponse::into_result)))
    }
}

/// Untyped results of one operation. Dropping it completes the operation.
pub struct RawSubscription {
    id: String,
    events: mpsc::UnboundedReceiver<Event>,
    commands: mpsc::UnboundedSender<Command>,
}

impl RawSubscription {
    /// Operation id on the socket.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for RawSubscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for RawSubscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Complete(self.id.clone()));
    }
}

/// Connection options.
#[derive(Debug, Clone)]
pub struct WebSocketOptions {
    /// Payload of `connection_init`.
    pub connection_params: Option<Value>,
    /// Extra handshake headers.
    pub headers: Option<HeadersInit>,
    /// How long to wait for `connection_ack`.
    pub ack_timeout: Duration,
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            connection_params: None,
            headers: None,
            ack_timeout: Duration::from_secs(10),
        }
    }
}

impl WebSocketOptions {
    /// Set the `connection_init` payload.
    pub fn connection_params(mut self, params: Value) -> Self {
        self.connection_params = Some(params);
        self
    }

    /// Set handshake headers.
    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Set the acknowledgement timeout.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }
}

enum Command {
    Subscribe {
        id: String,
        payload: SubscribePayload,
        events: mpsc::UnboundedSender<Event>,
    },
    Complete(String),
    Ping {
        payload: Option<Value>,
        reply: oneshot::Sender<Option<Value>>,
    },
    Close,
}

/// Multiplexing GraphQL WebSocket client.
pub struct GraphQLWebSocketClient {
    commands: mpsc::UnboundedSender<Command>,
    next_id: AtomicU64,
    task: JoinHandle<()>,
}

impl GraphQLWebSocketClient {
    /// Open a socket, send `connection_init` and wait for `connection_ack`.
    pub async fn connect(url: &str, options: WebSocketOptions) -> Result<Self> {
        let mut request = url.into_client_request().map_err(ws_error)?;
        if let Some(headers) = &options.headers {
            headers.apply_to(request.headers_mut())?;
        }
        request.headers_mut().insert(
            http::header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(GRAPHQL_TRANSPORT_WS_PROTOCOL),
        );

        info!(url = %url, "Connecting GraphQL WebSocket");
        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(ws_error)?;
        let (mut sink, mut stream) = socket.split();

        let init = ClientMessage::ConnectionInit {
            payload: options.connection_params,
        };
        sink.send(encode(&init)?).await.map_err(ws_error)?;

        let acknowledged = tokio::time::timeout(options.ack_timeout, async {
            while let Some(message) = stream.next().await {
                match message.map_err(ws_error)? {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text)? {
                        ServerMessage::ConnectionAck { payload } => {
                            debug!(payload = ?payload, "Received connection_ack");
                            return Ok(());
                        }
                        ServerMessage::Ping { payload } => {
                            sink.send(encode(&ClientMessage::Pong { payload })?)
                                .await
                                .map_err(ws_error)?;
                        }
                        other => {
                            return Err(GraphQLError::WebSocket(format!(
                                "expected connection_ack, got {:?}",
                                other
                            )));
                        }
                    },
                    Message::Close(frame) => {
                        return Err(GraphQLError::WebSocket(format!(
                            "closed during handshake: {:?}",
                            frame
                        )));
                    }
                    _ => continue,
                }
            }
            Err(GraphQLError::WebSocket("closed during handshake".to_string()))
        })
        .await
        .map_err(|_| GraphQLError::WebSocket("timed out waiting for connection_ack".to_string()))?;
        acknowledged?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(sink, stream, receiver));

        Ok(Self {
            commands,
            next_id: AtomicU64::new(1),
            task,
        })
    }

    /// Start an operation and stream its raw results.
    pub fn raw_subscribe(
        &self,
        document: impl Into<RequestDocument>,
        variables: Option<Value>,
    ) -> Result<RawSubscription> {
        let resolved = document.into().resolve();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (events, receiver) = mpsc::unbounded_channel();

        self.command(Command::Subscribe {
            id: id.clone(),
            payload: SubscribePayload {
                query: resolved.query,
                operation_name: resolved.operation_name,
                variables,
                extensions: None,
            },
            events,
        })?;

        Ok(RawSubscription {
            id,
            events: receiver,
            commands: self.commands.clone(),
        })
    }

    /// Start an operation and stream its `data`, deserialized into `T`.
    pub fn subscribe<T>(
        &self,
        document: impl Into<RequestDocument>,
        variables: Option<Value>,
    ) -> Result<SubscriptionStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let raw = self.raw_subscribe(document, variables)?;
        Ok(SubscriptionStream::new(raw.map(|event| event.and_then(typed))))
    }

    /// Run an operation and return its first result.
    pub async fn request<T>(
        &self,
        document: impl Into<RequestDocument>,
        variables: Option<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut stream = self.subscribe::<T>(document, variables)?;
        stream.next().await.unwrap_or_else(|| {
            Err(GraphQLError::Subscription(
                "operation completed without a result".to_string(),
            ))
        })
    }

    /// Send `ping` and wait for the matching `pong` payload.
    pub async fn ping(&self, payload: Option<Value>) -> Result<Option<Value>> {
        let (reply, receiver) = oneshot::channel();
        self.command(Command::Ping { payload, reply })?;
        receiver
            .await
            .map_err(|_| GraphQLError::WebSocket("connection closed".to_string()))
    }

    /// Close the socket and wait for the connection task to finish.
    pub async fn close(self) -> Result<()> {
        let _ = self.commands.send(Command::Close);
        self.task
            .await
            .map_err(|e| GraphQLError::WebSocket(e.to_string()))
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| GraphQLError::WebSocket("connection closed".to_string()))
    }
}

fn typed<T: DeserializeOwned>(response: GraphQLResponse<Value>) -> Result<GraphQLResponse<T>> {
    let data = match response.data {
        Some(Value::Null) | None => None,
        Some(data) => Some(serde_json::from_value(data)?),
    };
    Ok(GraphQLResponse {
        data,
        errors: response.errors,
        extensions: response.extensions,
    })
}

fn encode(message: &ClientMessage) -> Result<Message> {
    Ok(Message::Text(serde_json::to_string(message)?.into()))
}

fn ws_error(err: impl std::fmt::Display) -> GraphQLError {
    GraphQLError::WebSocket(err.to_string())
}

async fn run_connection<W, R>(
    mut sink: W,
    mut stream: R,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    W: futures::Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
    R: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut operations: HashMap<String, mpsc::UnboundedSender<Event>> = HashMap::new();
    let mut pings: VecDeque<oneshot::Sender<Option<Value>>> = VecDeque::new();

    loop {
        let outgoing = tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Subscribe { id, payload, events }) => {
                    debug!(id = %id, operation = ?payload.operation_name, "Subscribing");
                    operations.insert(id.clone(), events);
                    Some(ClientMessage::Subscribe { id, payload })
                }
                Some(Command::Complete(id)) => operations
                    .remove(&id)
                    .map(|_| ClientMessage::Complete { id }),
                Some(Command::Ping { payload, reply }) => {
                    pings.push_back(reply);
                    Some(ClientMessage::Ping { payload })
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    trace!(message = %text, "Received WebSocket message");
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => handle_server_message(message, &mut operations, &mut pings),
                        Err(err) => {
                            warn!(error = %err, "Unrecognized server message");
                            None
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "Server closed WebSocket");
                    break;
                }
                Some(Ok(_)) => None,
                Some(Err(err)) => {
                    warn!(error = %err, "WebSocket read failed");
                    fail_all(&mut operations, &err.to_string());
                    break;
                }
                None => break,
            },
        };

        if let Some(message) = outgoing {
            let sent = match encode(&message) {
                Ok(frame) => sink.send(frame).await.map_err(ws_error),
                Err(err) => Err(err),
            };
            if let Err(err) = sent {
                warn!(error = %err, "WebSocket write failed");
                fail_all(&mut operations, &err.to_string());
                break;
            }
        }
    }

    debug!(open_operations = operations.len(), "WebSocket connection finished");
}

fn handle_server_message(
    message: ServerMessage,
    operations: &mut HashMap<String, mpsc::UnboundedSender<Event>>,
    pings: &mut VecDeque<oneshot::Sender<Option<Value>>>,
) -> Option<ClientMessage> {
    match message {
        ServerMessage::Next { id, payload } => {
            if let Some(events) = operations.get(&id) {
                let event = serde_json::from_value(payload).map_err(GraphQLError::from);
                let _ = events.send(event);
            }
            None
        }
        ServerMessage::Error { id, payload } => {
            if let Some(events) = operations.remove(&id) {
                let errors = payload
                    .into_iter()
                    .map(GraphQLResponseError::from_value)
                    .collect();
                let _ = events.send(Err(GraphQLError::GraphQL(errors)));
            }
            None
        }
        ServerMessage::Complete { id } => {
            operations.remove(&id);
            None
        }
        ServerMessage::Ping { payload } => Some(ClientMessage::Pong { payload }),
        ServerMessage::Pong { payload } => {
            if let Some(reply) = pings.pop_front() {
                let _ = reply.send(payload);
            }
            None
        }
        ServerMessage::ConnectionAck { .. } => None,
    }
}

fn fail_all(operations: &mut HashMap<String, mpsc::UnboundedSender<Event>>, reason: &str) {
    for (_, events) in operations.drain() {
        let _ = events.send(Err(GraphQLError::WebSocket(reason.to_string())));
    }
}

/// graphql-transport-ws protocol messages.
pub mod protocol {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    /// Client to server message types.
    #[derive(Debug, Clone, Serialize)]
    #[serde(tag = "type")]
    pub enum ClientMessage {
        /// Initialize connection.
        #[serde(rename = "connection_init")]
        ConnectionInit {
            #[serde(skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
        /// Start an operation.
        #[serde(rename = "subscribe")]
        Subscribe { id: String, payload: SubscribePayload },
        /// Stop an operation.
        #[serde(rename = "complete")]
        Complete { id: String },
        /// Ping for keep-alive.
        #[serde(rename = "ping")]
        Ping {
            #[serde(skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
        /// Pong response.
        #[serde(rename = "pong")]
        Pong {
            #[serde(skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
    }

    /// Subscribe payload.
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SubscribePayload {
        pub query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub operation_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub variables: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub extensions: Option<Value>,
    }

    /// Server to client message types.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(tag = "type")]
    pub enum ServerMessage {
        /// Connection acknowledged.
        #[serde(rename = "connection_ack")]
        ConnectionAck {
            #[serde(default)]
            payload: Option<Value>,
        },
        /// Operation result.
        #[serde(rename = "next")]
        Next { id: String, payload: Value },
        /// Operation error.
        #[serde(rename = "error")]
        Error { id: String, payload: Vec<Value> },
        /// Operation complete.
        #[serde(rename = "complete")]
        Complete { id: String },
        /// Ping from server.
        #[serde(rename = "ping")]
        Ping {
            #[serde(default)]
            payload: Option<Value>,
        },
        /// Pong from server.
        #[serde(rename = "pong")]
        Pong {
            #[serde(default)]
            payload: Option<Value>,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_message_shape() {
        let message = ClientMessage::Subscribe {
            id: "1".to_string(),
            payload: SubscribePayload {
                query: "subscription OnEvent { event }".to_string(),
                operation_name: Some("OnEvent".to_string()),
                variables: None,
                extensions: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "subscribe",
                "id": "1",
                "payload": {"query": "subscription OnEvent { event }", "operationName": "OnEvent"},
            })
        );
    }

    #[test]
    fn test_server_ping_gets_pong() {
        let mut operations = HashMap::new();
        let mut pings = VecDeque::new();
        let reply = handle_server_message(
            ServerMessage::Ping {
                payload: Some(json!({"t": 1})),
            },
            &mut operations,
            &mut pings,
        );
        assert_eq!(
            serde_json::to_value(reply.unwrap()).unwrap(),
            json!({"type": "pong", "payload": {"t": 1}})
        );
    }

    #[tokio::test]
    async fn test_error_message_ends_operation() {
        let (events, mut receiver) = mpsc::unbounded_channel();
        let mut operations = HashMap::from([("1".to_string(), events)]);
        let mut pings = VecDeque::new();

        let message: ServerMessage =
            serde_json::from_value(json!({"type": "error", "id": "1", "payload": [{"message": "denied"}]}))
                .unwrap();
        handle_server_message(message, &mut operations, &mut pings);

        assert!(operations.is_empty());
        match receiver.recv().await {
            Some(Err(GraphQLError::GraphQL(errors))) => assert_eq!(errors[0].message, "denied"),
            other => panic!("unexpected event: {:?}", other.map(|e| e.is_ok())),
        }
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_typed_conversion() {
        let response = GraphQLResponse {
            data: Some(json!({"count": 3})),
            errors: None,
            extensions: None,
        };

        #[derive(serde::Deserialize)]
        struct Count {
            count: u32,
        }

        let typed: GraphQLResponse<Count> = typed(response).unwrap();
        assert_eq!(typed.data.unwrap().count, 3);
    }
}
