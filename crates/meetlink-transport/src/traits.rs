//! Transport boundary consumed by the signaling client

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Mirrors the browser WebSocket `readyState`, plus `None` before `create`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WebSocketReadyState {
    #[default]
    None,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for WebSocketReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WebSocketReadyState::None => "none",
            WebSocketReadyState::Connecting => "connecting",
            WebSocketReadyState::Open => "open",
            WebSocketReadyState::Closing => "closing",
            WebSocketReadyState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Events emitted by a [`WebSocketAdapter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebSocketEvent {
    /// The connection is open and ready to send
    Open,
    /// A binary (or text, as bytes) message arrived
    Message(Bytes),
    /// The connection closed, with the close frame's code and reason
    Close { code: u16, reason: String },
    /// A transport fault; usually followed by `Close`
    Error(String),
}

/// Listener installed by [`WebSocketAdapter::create`].
///
/// Implementations must not hold internal locks while invoking it: the
/// listener commonly calls back into the adapter (`send`, `close`).
pub type WebSocketEventHandler = Arc<dyn Fn(WebSocketEvent) + Send + Sync>;

/// A single reusable WebSocket connection slot.
///
/// `create` replaces any existing connection. Delivery happens through the
/// handler passed to `create`; events are delivered in the order the
/// transport produced them.
pub trait WebSocketAdapter: Send + Sync {
    /// Start connecting to `url` offering `protocols` as sub-protocols
    fn create(&self, url: &str, protocols: &[String], handler: WebSocketEventHandler) -> Result<()>;

    /// Queue one message; `false` if the connection cannot accept it
    fn send(&self, data: Bytes) -> bool;

    /// Begin the close handshake. A `Close` event follows once it completes.
    fn close(&self, code: u16, reason: &str);

    /// Tear the connection down immediately; no further events are delivered
    fn destroy(&self);

    fn ready_state(&self) -> WebSocketReadyState;
}
