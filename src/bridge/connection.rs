//! WebSocket connection to the host runtime.
//!
//! [`SocketBridge`] owns a spawned event loop that writes requests, routes
//! responses back to their callers by request ID, and fails every pending
//! call once the socket goes away.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, from_value, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::protocol::{BridgeMessage, BridgeRequest, BridgeResponse};
use super::{FrameCandidate, HostBridge};

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for a host answer.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<BridgeResponse>>>;

// ============================================================================
// BridgeCommand
// ============================================================================

/// Internal commands for the event loop.
enum BridgeCommand {
    /// Send a request and wait for response.
    Send {
        request: BridgeRequest,
        response_tx: oneshot::Sender<Result<BridgeResponse>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// SocketBridge
// ============================================================================

/// [`HostBridge`] speaking JSON over a WebSocket.
///
/// Cloning is cheap; every clone talks to the same event loop.
#[derive(Clone)]
pub struct SocketBridge {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<BridgeCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Ceiling on a single host round trip.
    request_timeout: Duration,
}

impl std::fmt::Debug for SocketBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketBridge")
            .field("pending", &self.pending_count())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl SocketBridge {
    /// Wraps an established WebSocket and spawns its event loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
        ));

        Self {
            command_tx,
            correlation,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the ceiling on a single host round trip.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Sends a message and waits for its response value.
    ///
    /// # Errors
    ///
    /// - [`Error::BridgeClosed`] if the socket is gone
    /// - [`Error::RequestTimeout`] if no answer arrives in time
    /// - [`Error::Bridge`] if the host answered with an error
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn request(&self, message: BridgeMessage) -> Result<Value> {
        let request = BridgeRequest::new(message);
        self.send_with_timeout(request, self.request_timeout)
            .await?
            .into_result()
    }

    /// Sends a request and waits for the raw response.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn send_with_timeout(
        &self,
        request: BridgeRequest,
        request_timeout: Duration,
    ) -> Result<BridgeResponse> {
        let request_id = request.id;

        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending bridge requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(BridgeCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::BridgeClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::BridgeClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(BridgeCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Closes the socket. Pending and later requests fail with
    /// [`Error::BridgeClosed`].
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(BridgeCommand::Shutdown);
    }

    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Bridge socket closed by host");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Bridge socket error");
                            break;
                        }

                        None => {
                            debug!("Bridge socket ended");
                            break;
                        }

                        // Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(BridgeCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(BridgeCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed timed-out correlation");
                        }

                        Some(BridgeCommand::Shutdown) => {
                            debug!("Bridge shutdown requested");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Bridge command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Late senders must see a dead channel, not a queue nobody drains.
        command_rx.close();
        Self::fail_pending_requests(&correlation);

        debug!("Bridge event loop terminated");
    }

    fn handle_incoming_message(text: &str, correlation: &Mutex<CorrelationMap>) {
        match from_str::<BridgeResponse>(text) {
            Ok(response) => {
                let tx = correlation.lock().remove(&response.id);
                match tx {
                    Some(tx) => {
                        let _ = tx.send(Ok(response));
                    }
                    None => warn!(id = %response.id, "Response for unknown request"),
                }
            }
            Err(e) => warn!(error = %e, text = %text, "Failed to parse host message"),
        }
    }

    async fn handle_send_command<S>(
        request: BridgeRequest,
        response_tx: oneshot::Sender<Result<BridgeResponse>>,
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
        correlation: &Mutex<CorrelationMap>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(json) => json,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Register before writing so a fast answer is never orphaned.
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(Error::WebSocket(e)));
            }
            return;
        }

        trace!(%request_id, "Bridge request sent");
    }

    fn fail_pending_requests(correlation: &Mutex<CorrelationMap>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::BridgeClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending bridge requests");
        }
    }
}

// ============================================================================
// HostBridge
// ============================================================================

#[async_trait]
impl HostBridge for SocketBridge {
    async fn size_lookup(&self, url: &str) -> Result<u64> {
        let value = self
            .request(BridgeMessage::GetSize {
                url: url.to_string(),
            })
            .await?;

        // Hosts answer either a bare number or {"size": n}.
        let size = value
            .as_u64()
            .or_else(|| value.get("size").and_then(Value::as_u64))
            .unwrap_or(0);
        Ok(size)
    }

    async fn resolve_frame_sources(&self, addresses: &[String]) -> Result<Vec<String>> {
        let value = self
            .request(BridgeMessage::GetRedirect {
                data: addresses.to_vec(),
            })
            .await?;

        let resolved: Vec<String> = from_value(value)?;
        if resolved.len() != addresses.len() {
            return Err(Error::protocol(format!(
                "get_redirect returned {} entries for {} frames",
                resolved.len(),
                addresses.len()
            )));
        }
        Ok(resolved)
    }

    async fn extract_frame_candidates(&self, min_size: u32) -> Result<Vec<FrameCandidate>> {
        let value = self
            .request(BridgeMessage::ExtractFrames { min_size })
            .await?;

        if value.is_null() {
            return Ok(Vec::new());
        }
        Ok(from_value(value)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{DuplexStream, duplex};
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn socket_pair() -> (SocketBridge, WebSocketStream<DuplexStream>) {
        let (ours, theirs) = duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(ours, Role::Client, None).await;
        let host = WebSocketStream::from_raw_socket(theirs, Role::Server, None).await;
        (SocketBridge::new(client), host)
    }

    /// Answers the next request with whatever `answer` produces.
    async fn answer_next<F>(host: &mut WebSocketStream<DuplexStream>, answer: F) -> BridgeRequest
    where
        F: FnOnce(&BridgeRequest) -> BridgeResponse,
    {
        let message = host.next().await.expect("message").expect("frame");
        let text = message.into_text().expect("text frame");
        let request: BridgeRequest = serde_json::from_str(&text).expect("request json");
        let response = answer(&request);
        host.send(Message::Text(
            serde_json::to_string(&response).expect("encode").into(),
        ))
        .await
        .expect("send response");
        request
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_REQUEST_TIMEOUT.as_secs(), 30);
        assert_eq!(MAX_PENDING_REQUESTS, 256);
    }

    #[tokio::test]
    async fn test_size_lookup_round_trip() {
        let (bridge, mut host) = socket_pair().await;

        let host_task = tokio::spawn(async move {
            let request = answer_next(&mut host, |request| {
                BridgeResponse::success(request.id, Value::from(8000))
            })
            .await;
            (request, host)
        });

        let size = bridge.size_lookup("https://cdn.test/a.jpg").await.unwrap();
        assert_eq!(size, 8000);

        let (request, _host) = host_task.await.unwrap();
        assert_eq!(
            request.message,
            BridgeMessage::GetSize {
                url: "https://cdn.test/a.jpg".into()
            }
        );
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_size_lookup_accepts_object_answer() {
        let (bridge, mut host) = socket_pair().await;

        let host_task = tokio::spawn(async move {
            answer_next(&mut host, |request| {
                BridgeResponse::success(request.id, serde_json::json!({ "size": 1234 }))
            })
            .await;
            host
        });

        assert_eq!(bridge.size_lookup("https://cdn.test/b.jpg").await.unwrap(), 1234);
        let _host = host_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_frame_candidates_from_pairs() {
        let (bridge, mut host) = socket_pair().await;

        let host_task = tokio::spawn(async move {
            let request = answer_next(&mut host, |request| {
                BridgeResponse::success(
                    request.id,
                    serde_json::json!([["https://f.test/1.jpg", "https://f.test/embed"]]),
                )
            })
            .await;
            (request, host)
        });

        let candidates = bridge.extract_frame_candidates(100).await.unwrap();
        assert_eq!(
            candidates,
            vec![FrameCandidate::new("https://f.test/1.jpg", "https://f.test/embed")]
        );

        let (request, _host) = host_task.await.unwrap();
        assert_eq!(request.message, BridgeMessage::ExtractFrames { min_size: 100 });
    }

    #[tokio::test]
    async fn test_redirect_length_mismatch_is_protocol_error() {
        let (bridge, mut host) = socket_pair().await;

        let host_task = tokio::spawn(async move {
            answer_next(&mut host, |request| {
                BridgeResponse::success(request.id, serde_json::json!(["only-one"]))
            })
            .await;
            host
        });

        let err = bridge
            .resolve_frame_sources(&["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        let _host = host_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_host_error_is_bridge_error() {
        let (bridge, mut host) = socket_pair().await;

        let host_task = tokio::spawn(async move {
            answer_next(&mut host, |request| {
                BridgeResponse::error(request.id, "frames detached")
            })
            .await;
            host
        });

        let err = bridge.extract_frame_candidates(0).await.unwrap_err();
        assert!(err.is_bridge_error());
        let _host = host_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_host_fails_pending_requests() {
        let (bridge, host) = socket_pair().await;
        drop(host);

        let err = bridge.size_lookup("https://cdn.test/c.jpg").await.unwrap_err();
        assert!(err.is_bridge_error());
    }

    #[tokio::test]
    async fn test_request_timeout_cleans_up() {
        let (bridge, _host) = socket_pair().await;
        let bridge = bridge.with_request_timeout(Duration::from_millis(20));

        let err = bridge.size_lookup("https://cdn.test/d.jpg").await.unwrap_err();
        assert!(err.is_timeout());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(bridge.pending_count(), 0);
    }
}
