//! WebSocket adapter over tokio-tungstenite

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{
        client::IntoClientRequest,
        http::HeaderValue,
        protocol::{frame::coding::CloseCode, CloseFrame, Message as WsMessage, WebSocketConfig as WsProtocolConfig},
    },
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Result, TransportError};
use crate::traits::{WebSocketAdapter, WebSocketEvent, WebSocketEventHandler, WebSocketReadyState};
use crate::CLOSE_ABNORMAL;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound message size
    pub max_message_size: usize,
    /// How long the TCP/TLS/upgrade handshake may take
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024, // SDP offers for large meetings
            connect_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Default)]
struct Shared {
    state: WebSocketReadyState,
    /// Bumped on every create/destroy; tasks of older connections go quiet
    connection_id: u64,
    tx: Option<mpsc::UnboundedSender<WsMessage>>,
    handler: Option<WebSocketEventHandler>,
    task: Option<JoinHandle<()>>,
}

impl Shared {
    fn teardown(&mut self) {
        self.connection_id += 1;
        self.tx = None;
        self.handler = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state = WebSocketReadyState::None;
    }
}

/// Native [`WebSocketAdapter`].
///
/// `create` must be called from within a tokio runtime; the connection runs
/// on a spawned task and reports through the installed handler.
pub struct TungsteniteWebSocketAdapter {
    config: WebSocketConfig,
    shared: Arc<Mutex<Shared>>,
}

impl TungsteniteWebSocketAdapter {
    pub fn new() -> Self {
        Self::with_config(WebSocketConfig::default())
    }

    pub fn with_config(config: WebSocketConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }
}

impl Default for TungsteniteWebSocketAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TungsteniteWebSocketAdapter {
    fn drop(&mut self) {
        self.shared.lock().teardown();
    }
}

impl WebSocketAdapter for TungsteniteWebSocketAdapter {
    fn create(&self, url: &str, protocols: &[String], handler: WebSocketEventHandler) -> Result<()> {
        let parsed = Url::parse(url)?;
        let mut request = parsed.as_str().into_client_request()?;
        if !protocols.is_empty() {
            let value = HeaderValue::from_str(&protocols.join(", "))
                .map_err(|e| TransportError::Other(format!("invalid sub-protocol: {}", e)))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", value);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = self.shared.lock();
        shared.teardown();
        let id = shared.connection_id;
        shared.state = WebSocketReadyState::Connecting;
        shared.tx = Some(tx);
        shared.handler = Some(handler);

        // the join token travels in the sub-protocols, keep it out of the logs
        info!("Connecting to WebSocket: {}", parsed.origin().ascii_serialization());
        let connection = Connection {
            id,
            shared: self.shared.clone(),
            config: self.config.clone(),
        };
        shared.task = Some(runtime.spawn(connection.run(request, rx)));
        Ok(())
    }

    fn send(&self, data: Bytes) -> bool {
        let shared = self.shared.lock();
        if shared.state != WebSocketReadyState::Open {
            return false;
        }
        match &shared.tx {
            Some(tx) => tx.send(WsMessage::Binary(data.to_vec())).is_ok(),
            None => false,
        }
    }

    fn close(&self, code: u16, reason: &str) {
        let mut shared = self.shared.lock();
        let state = shared.state;
        match state {
            WebSocketReadyState::Open => {
                shared.state = WebSocketReadyState::Closing;
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: Cow::Owned(reason.to_string()),
                };
                if let Some(tx) = &shared.tx {
                    let _ = tx.send(WsMessage::Close(Some(frame)));
                }
            }
            WebSocketReadyState::Connecting => {
                // nothing to handshake with yet; abandon the attempt
                if let Some(task) = shared.task.take() {
                    task.abort();
                }
                shared.tx = None;
                shared.state = WebSocketReadyState::Closed;
                let handler = shared.handler.clone();
                drop(shared);
                if let Some(handler) = handler {
                    handler(WebSocketEvent::Close {
                        code: CLOSE_ABNORMAL,
                        reason: "closed before open".to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    fn destroy(&self) {
        debug!("Destroying WebSocket");
        self.shared.lock().teardown();
    }

    fn ready_state(&self) -> WebSocketReadyState {
        self.shared.lock().state
    }
}

struct Connection {
    id: u64,
    shared: Arc<Mutex<Shared>>,
    config: WebSocketConfig,
}

impl Connection {
    /// Update state and return the handler, or `None` if superseded
    fn transition(&self, state: Option<WebSocketReadyState>) -> Option<WebSocketEventHandler> {
        let mut shared = self.shared.lock();
        if shared.connection_id != self.id {
            return None;
        }
        if let Some(state) = state {
            shared.state = state;
        }
        shared.handler.clone()
    }

    fn emit(&self, state: Option<WebSocketReadyState>, event: WebSocketEvent) {
        if let Some(handler) = self.transition(state) {
            handler(event);
        }
    }

    fn fail(&self, reason: String) {
        self.emit(None, WebSocketEvent::Error(reason.clone()));
        self.emit(
            Some(WebSocketReadyState::Closed),
            WebSocketEvent::Close {
                code: CLOSE_ABNORMAL,
                reason,
            },
        );
    }

    async fn run(
        self,
        request: tokio_tungstenite::tungstenite::handshake::client::Request,
        mut send_rx: mpsc::UnboundedReceiver<WsMessage>,
    ) {
        let ws_config = WsProtocolConfig {
            max_message_size: Some(self.config.max_message_size),
            ..Default::default()
        };
        let connect = connect_async_with_config(request, Some(ws_config), true);
        let ws_stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok((ws_stream, response))) => {
                debug!("WebSocket connected, response: {:?}", response.status());
                if let Some(protocol) = response.headers().get("Sec-WebSocket-Protocol") {
                    debug!("Server selected sub-protocol of {} bytes", protocol.len());
                }
                ws_stream
            }
            Ok(Err(e)) => {
                warn!("WebSocket connect failed: {}", e);
                self.fail(e.to_string());
                return;
            }
            Err(_) => {
                warn!("WebSocket connect timed out");
                self.fail("connect timed out".to_string());
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        // Writer task ends when the adapter drops its sender
        tokio::spawn(async move {
            while let Some(msg) = send_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    error!("WebSocket write error: {}", e);
                    break;
                }
            }
        });

        self.emit(Some(WebSocketReadyState::Open), WebSocketEvent::Open);

        while let Some(result) = read.next().await {
            match result {
                Ok(WsMessage::Binary(data)) => {
                    self.emit(None, WebSocketEvent::Message(Bytes::from(data)));
                }
                Ok(WsMessage::Text(text)) => {
                    warn!("Received text message, converting to bytes");
                    self.emit(None, WebSocketEvent::Message(Bytes::from(text)));
                }
                Ok(WsMessage::Close(frame)) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((CLOSE_ABNORMAL, String::new()));
                    info!("WebSocket closed: {} {}", code, reason);
                    self.emit(
                        Some(WebSocketReadyState::Closed),
                        WebSocketEvent::Close { code, reason },
                    );
                    return;
                }
                // ping/pong are answered by tungstenite
                Ok(_) => {}
                Err(e) => {
                    error!("WebSocket read error: {}", e);
                    self.fail(e.to_string());
                    return;
                }
            }
        }

        self.emit(
            Some(WebSocketReadyState::Closed),
            WebSocketEvent::Close {
                code: CLOSE_ABNORMAL,
                reason: "stream ended".to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> WebSocketEventHandler {
        Arc::new(|_| {})
    }

    #[test]
    fn test_websocket_config() {
        let config = WebSocketConfig::default();
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_initial_state() {
        let adapter = TungsteniteWebSocketAdapter::new();
        assert_eq!(adapter.ready_state(), WebSocketReadyState::None);
        assert!(!adapter.send(Bytes::from_static(b"x")));
        adapter.close(1000, "nothing to close");
        assert_eq!(adapter.ready_state(), WebSocketReadyState::None);
    }

    #[test]
    fn test_invalid_url() {
        let adapter = TungsteniteWebSocketAdapter::new();
        let result = adapter.create("not a url", &[], noop_handler());
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_create_requires_runtime() {
        let adapter = TungsteniteWebSocketAdapter::new();
        let result = adapter.create("ws://127.0.0.1:9/control", &[], noop_handler());
        assert!(matches!(result, Err(TransportError::NoRuntime)));
        assert_eq!(adapter.ready_state(), WebSocketReadyState::None);
    }
}
