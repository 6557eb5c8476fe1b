//! meetlink transport layer
//!
//! The signaling client talks to the network through the
//! [`WebSocketAdapter`] boundary trait. This crate defines that boundary and
//! ships one native implementation:
//! - WebSocket over tokio-tungstenite (feature `websocket`, on by default)

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{WebSocketAdapter, WebSocketEvent, WebSocketEventHandler, WebSocketReadyState};

#[cfg(feature = "websocket")]
pub use websocket::{TungsteniteWebSocketAdapter, WebSocketConfig};

/// Close code for a normal, client-initiated close
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when a connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;
