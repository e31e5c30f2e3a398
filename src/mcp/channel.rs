//! Request/response correlation on top of a transport.

use std::time::Duration;

use tracing::{debug, warn};

use super::envelope::{methods, JsonRpcErrorObject, JsonRpcMessage, JsonRpcRequest, RequestId};
use super::transport::MCPTransport;
use crate::error::{BridgeError, Result};
use crate::util::with_timeout;

/// Client side of a transport: numbers outgoing requests and waits for the
/// matching response.
///
/// Ids increase monotonically and are never reused. The request timeout
/// covers both writing the request and waiting for its response. A request
/// that times out while waiting leaves the channel usable and its late
/// response is discarded when it arrives. One that times out while still
/// writing closes the channel.
pub struct TransportChannel {
    transport: Box<dyn MCPTransport>,
    next_id: i64,
    request_timeout: Duration,
    closed: bool,
}

impl TransportChannel {
    pub fn new(transport: Box<dyn MCPTransport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            next_id: 1,
            request_timeout,
            closed: false,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send a request and wait for its result.
    ///
    /// A JSON-RPC error response becomes [`BridgeError::Protocol`]. Not
    /// getting a response within the request timeout, counted from the start
    /// of the write, becomes [`BridgeError::Timeout`].
    pub async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        if self.closed {
            return Err(BridgeError::transport("channel is closed"));
        }
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;

        debug!(%id, method, "sending request");
        let envelope = JsonRpcMessage::request(id.clone(), method, params);
        let mut sent = false;
        let outcome = with_timeout(self.request_timeout, async {
            self.transport.send(&envelope).await?;
            sent = true;
            self.await_response(&id).await
        })
        .await;

        // A frame cut off mid-write breaks the line framing for good.
        if !sent && matches!(outcome, Err(BridgeError::Timeout(_))) {
            warn!(%id, method, "peer stopped reading, closing channel");
            if let Err(e) = self.close().await {
                debug!(error = %e, "close after stalled send");
            }
        }
        outcome
    }

    /// Send a notification. No response is expected.
    pub async fn notify(&mut self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        if self.closed {
            return Err(BridgeError::transport("channel is closed"));
        }
        self.transport
            .send(&JsonRpcMessage::notification(method, params))
            .await
    }

    /// Close the underlying transport. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close().await
    }

    async fn await_response(&mut self, id: &RequestId) -> Result<serde_json::Value> {
        loop {
            let message = match self.transport.receive().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    return Err(BridgeError::transport(format!(
                        "peer closed the connection while request {id} was pending"
                    )))
                }
                Err(BridgeError::Protocol { code, message }) if code == JsonRpcErrorObject::PARSE_ERROR => {
                    warn!(%message, "skipping malformed message from server");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match message {
                JsonRpcMessage::Response(response) if response.id == *id => {
                    return Ok(response.result);
                }
                JsonRpcMessage::Error(error) if error.id.is_none() || error.id.as_ref() == Some(id) => {
                    return Err(BridgeError::Protocol {
                        code: error.error.code,
                        message: error.error.message,
                    });
                }
                JsonRpcMessage::Response(response) => {
                    warn!(stale = %response.id, expected = %id, "discarding uncorrelated response");
                }
                JsonRpcMessage::Error(error) => {
                    warn!(stale = ?error.id, expected = %id, "discarding uncorrelated error");
                }
                JsonRpcMessage::Notification(notification) => {
                    debug!(method = %notification.method, "ignoring server notification");
                }
                JsonRpcMessage::Request(request) => self.answer_server_request(request).await?,
            }
        }
    }

    async fn answer_server_request(&mut self, request: JsonRpcRequest) -> Result<()> {
        let reply = if request.method == methods::PING {
            JsonRpcMessage::response(request.id, serde_json::json!({}))
        } else {
            debug!(method = %request.method, "rejecting server-initiated request");
            JsonRpcMessage::error(
                Some(request.id),
                JsonRpcErrorObject::new(
                    JsonRpcErrorObject::METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                ),
            )
        };
        self.transport.send(&reply).await
    }
}

impl std::fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportChannel")
            .field("next_id", &self.next_id)
            .field("request_timeout", &self.request_timeout)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::memory_pair;
    use serde_json::json;

    #[tokio::test]
    async fn matches_response_by_id_and_skips_noise() {
        let (client, mut server) = memory_pair();
        let mut channel = TransportChannel::new(Box::new(client), Duration::from_secs(5));

        let peer = tokio::spawn(async move {
            let Some(JsonRpcMessage::Request(request)) = server.receive().await.unwrap() else {
                panic!("expected a request");
            };
            assert_eq!(request.id, RequestId::Number(1));
            server
                .send(&JsonRpcMessage::notification("notifications/progress", None))
                .await
                .unwrap();
            server
                .send(&JsonRpcMessage::response(RequestId::Number(99), json!("stale")))
                .await
                .unwrap();
            server
                .send(&JsonRpcMessage::response(request.id, json!({"ok": true})))
                .await
                .unwrap();
            server
        });

        let result = channel.request(methods::TOOLS_LIST, None).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
        drop(peer.await.unwrap());
    }

    #[tokio::test]
    async fn error_response_becomes_protocol_error() {
        let (client, mut server) = memory_pair();
        let mut channel = TransportChannel::new(Box::new(client), Duration::from_secs(5));

        tokio::spawn(async move {
            if let Ok(Some(JsonRpcMessage::Request(request))) = server.receive().await {
                let error = JsonRpcErrorObject::new(JsonRpcErrorObject::METHOD_NOT_FOUND, "nope");
                server
                    .send(&JsonRpcMessage::error(Some(request.id), error))
                    .await
                    .unwrap();
            }
            server
        });

        let err = channel.request("bogus/method", None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol { code: -32601, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out_and_ids_keep_increasing() {
        let (client, mut server) = memory_pair();
        let mut channel = TransportChannel::new(Box::new(client), Duration::from_millis(200));

        let err = channel.request(methods::PING, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(200)));

        let err = channel.request(methods::PING, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));

        let mut ids = Vec::new();
        for _ in 0..2 {
            if let Some(JsonRpcMessage::Request(request)) = server.receive().await.unwrap() {
                ids.push(request.id);
            }
        }
        assert_eq!(ids, vec![RequestId::Number(1), RequestId::Number(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_times_out_and_closes_the_channel() {
        // The peer never reads, so a request larger than the pipe buffer
        // cannot be written completely.
        let (client, _server) = memory_pair();
        let mut channel = TransportChannel::new(Box::new(client), Duration::from_millis(200));
        let csv = "Name,ARR\n".to_string() + &"Acme,100\n".repeat(200 * 1024 / 9);
        let params = json!({"name": "extract-data", "arguments": {"name": "Acme", "csvFile": csv}});

        let err = channel
            .request(methods::TOOLS_CALL, Some(params))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(200)));
        assert!(channel.is_closed());

        let err = channel.request(methods::PING, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }

    #[tokio::test]
    async fn closed_peer_fails_pending_request() {
        let (client, server) = memory_pair();
        let mut channel = TransportChannel::new(Box::new(client), Duration::from_secs(5));
        drop(server);

        let err = channel.request(methods::PING, None).await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Transport);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_requests() {
        let (client, _server) = memory_pair();
        let mut channel = TransportChannel::new(Box::new(client), Duration::from_secs(5));
        channel.close().await.unwrap();
        channel.close().await.unwrap();
        assert!(channel.is_closed());
        assert!(channel.request(methods::PING, None).await.is_err());
    }
}
