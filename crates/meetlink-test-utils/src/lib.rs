//! Common test helpers for meetlink tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - A scriptable in-memory WebSocket adapter
//! - A recording peer connection
//! - Event collectors for signaling client and ping/pong observers

use async_trait::async_trait;
use bytes::Bytes;
use meetlink_client::{
    ClientError, PeerConnection, PingPongObserver, SignalingClientEvent, SignalingClientEventType,
    SignalingClientObserver,
};
use meetlink_core::{codec, SignalFrame, SignalMessage};
use meetlink_sdp::Sdp;
use meetlink_transport::{
    Result as TransportResult, TransportError, WebSocketAdapter, WebSocketEvent,
    WebSocketEventHandler, WebSocketReadyState,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based.
/// Uses tokio's clock so it also works with paused time.
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    check().await
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait for a boolean flag to become true
pub async fn wait_for_flag(flag: &AtomicBool, max_wait: Duration) -> bool {
    wait_for(
        || async { flag.load(Ordering::SeqCst) },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait with notification - more efficient than polling
pub async fn wait_with_notify(notify: &Notify, max_wait: Duration) -> bool {
    timeout(max_wait, notify.notified()).await.is_ok()
}

// ============================================================================
// Mock WebSocket
// ============================================================================

#[derive(Default)]
struct MockSocketState {
    ready_state: WebSocketReadyState,
    handler: Option<WebSocketEventHandler>,
    urls: Vec<String>,
    protocols: Vec<Vec<String>>,
    sent: Vec<Bytes>,
    closes: Vec<(u16, String)>,
    destroy_count: u32,
    send_fails: bool,
    create_fails: bool,
}

/// In-memory [`WebSocketAdapter`] driven by the test.
///
/// `close` only moves to `Closing`; the test decides whether the close
/// event ever arrives (`server_close`) or not (to exercise the timeout).
#[derive(Default)]
pub struct MockWebSocketAdapter {
    state: Mutex<MockSocketState>,
}

impl MockWebSocketAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn emit(&self, ready_state: Option<WebSocketReadyState>, event: WebSocketEvent) {
        let handler = {
            let mut state = self.state.lock();
            if let Some(ready_state) = ready_state {
                state.ready_state = ready_state;
            }
            state.handler.clone()
        };
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Complete the handshake
    pub fn open(&self) {
        self.emit(Some(WebSocketReadyState::Open), WebSocketEvent::Open);
    }

    pub fn receive_bytes(&self, data: impl Into<Bytes>) {
        self.emit(None, WebSocketEvent::Message(data.into()));
    }

    /// Encode and deliver a message as the server would
    pub fn receive(&self, message: &SignalMessage) {
        let bytes = codec::encode(message).expect("encode test message");
        self.receive_bytes(bytes);
    }

    pub fn receive_frame(&self, frame: SignalFrame) {
        self.receive(&SignalMessage::new(frame).with_timestamp(meetlink_core::time::now_ms()));
    }

    /// Close event from the transport, confirming or initiating a close
    pub fn server_close(&self, code: u16, reason: &str) {
        self.emit(
            Some(WebSocketReadyState::Closed),
            WebSocketEvent::Close {
                code,
                reason: reason.to_string(),
            },
        );
    }

    pub fn error(&self, reason: &str) {
        self.emit(None, WebSocketEvent::Error(reason.to_string()));
    }

    /// Connection attempt failed: error, then abnormal close
    pub fn fail_connect(&self) {
        self.error("connection refused");
        self.server_close(1006, "");
    }

    pub fn set_send_fails(&self, fails: bool) {
        self.state.lock().send_fails = fails;
    }

    pub fn set_create_fails(&self, fails: bool) {
        self.state.lock().create_fails = fails;
    }

    pub fn set_ready_state(&self, ready_state: WebSocketReadyState) {
        self.state.lock().ready_state = ready_state;
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    /// Sent messages, decoded
    pub fn sent_messages(&self) -> Vec<SignalMessage> {
        self.sent()
            .iter()
            .map(|b| codec::decode(b).expect("decode sent message"))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    pub fn protocols(&self) -> Vec<Vec<String>> {
        self.state.lock().protocols.clone()
    }

    pub fn create_count(&self) -> usize {
        self.state.lock().urls.len()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.state.lock().closes.clone()
    }

    pub fn destroy_count(&self) -> u32 {
        self.state.lock().destroy_count
    }
}

impl WebSocketAdapter for MockWebSocketAdapter {
    fn create(&self, url: &str, protocols: &[String], handler: WebSocketEventHandler) -> TransportResult<()> {
        let mut state = self.state.lock();
        if state.create_fails {
            return Err(TransportError::ConnectionFailed("mock create failure".to_string()));
        }
        state.urls.push(url.to_string());
        state.protocols.push(protocols.to_vec());
        state.handler = Some(handler);
        state.ready_state = WebSocketReadyState::Connecting;
        Ok(())
    }

    fn send(&self, data: Bytes) -> bool {
        let mut state = self.state.lock();
        if state.send_fails || state.ready_state != WebSocketReadyState::Open {
            return false;
        }
        state.sent.push(data);
        true
    }

    fn close(&self, code: u16, reason: &str) {
        let mut state = self.state.lock();
        state.closes.push((code, reason.to_string()));
        if matches!(
            state.ready_state,
            WebSocketReadyState::Open | WebSocketReadyState::Connecting
        ) {
            state.ready_state = WebSocketReadyState::Closing;
        }
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        state.destroy_count += 1;
        state.handler = None;
        state.ready_state = WebSocketReadyState::None;
    }

    fn ready_state(&self) -> WebSocketReadyState {
        self.state.lock().ready_state
    }
}

// ============================================================================
// Mock Peer Connection
// ============================================================================

/// Records local descriptions; can be told to fail or never complete
#[derive(Default)]
pub struct MockPeerConnection {
    descriptions: Mutex<Vec<Sdp>>,
    fail: AtomicBool,
    hang: AtomicBool,
}

impl MockPeerConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// `set_local_description` never resolves
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn local_descriptions(&self) -> Vec<Sdp> {
        self.descriptions.lock().clone()
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    async fn set_local_description(&self, sdp: &Sdp) -> Result<(), ClientError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Other("setLocalDescription rejected".to_string()));
        }
        self.descriptions.lock().push(sdp.clone());
        Ok(())
    }
}

// ============================================================================
// Collectors
// ============================================================================

/// Signaling client observer that records every event
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<SignalingClientEvent>>>,
    notify: Arc<Notify>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shareable handle to register with a client
    pub fn observer(&self) -> Arc<dyn SignalingClientObserver> {
        Arc::new(self.clone())
    }

    pub fn events(&self) -> Vec<SignalingClientEvent> {
        self.events.lock().clone()
    }

    pub fn types(&self) -> Vec<SignalingClientEventType> {
        self.events.lock().iter().map(|e| e.event_type).collect()
    }

    pub fn count(&self, event_type: SignalingClientEventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn has(&self, event_type: SignalingClientEventType) -> bool {
        self.count(event_type) > 0
    }

    pub fn last(&self, event_type: SignalingClientEventType) -> Option<SignalingClientEvent> {
        self.events
            .lock()
            .iter()
            .rev()
            .find(|e| e.event_type == event_type)
            .cloned()
    }

    /// Received frames, in order
    pub fn frames(&self) -> Vec<SignalMessage> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| e.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub async fn wait_for_type(&self, event_type: SignalingClientEventType, max_wait: Duration) -> bool {
        wait_for(
            || async { self.has(event_type) },
            DEFAULT_CHECK_INTERVAL,
            max_wait,
        )
        .await
    }
}

impl SignalingClientObserver for EventCollector {
    fn handle_signaling_client_event(&self, event: &SignalingClientEvent) {
        self.events.lock().push(event.clone());
        self.notify.notify_waiters();
    }
}

/// Ping/pong observer that records callbacks
#[derive(Clone, Default)]
pub struct PingPongCollector {
    pongs: Arc<Mutex<Vec<(u32, i64, i64)>>>,
    misses: Arc<Mutex<Vec<u32>>>,
}

impl PingPongCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer(&self) -> Arc<dyn PingPongObserver> {
        Arc::new(self.clone())
    }

    /// `(ping_id, latency_ms, clock_skew_ms)` per pong
    pub fn pongs(&self) -> Vec<(u32, i64, i64)> {
        self.pongs.lock().clone()
    }

    pub fn misses(&self) -> Vec<u32> {
        self.misses.lock().clone()
    }
}

impl PingPongObserver for PingPongCollector {
    fn did_receive_pong(&self, ping_id: u32, latency_ms: i64, clock_skew_ms: i64) {
        self.pongs.lock().push((ping_id, latency_ms, clock_skew_ms));
    }

    fn did_miss_pongs(&self, count: u32) {
        self.misses.lock().push(count);
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a condition with a custom message
pub fn assert_that(condition: bool, msg: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(msg.to_string())
    }
}

/// Assert that an Option is Some and return the value
pub fn assert_some<T>(opt: Option<T>, msg: &str) -> Result<T, String> {
    opt.ok_or_else(|| msg.to_string())
}
