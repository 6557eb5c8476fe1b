//! meetlink client
//!
//! Signaling client for a conferencing control channel, with the pieces
//! built on top of it:
//! - [`DefaultSignalingClient`]: connection queue, readiness gating, event fan-out
//! - [`DefaultPingPong`]: keepalive with latency and clock-skew estimates
//! - [`task`]: cancelable negotiation steps (open, join, subscribe, leave, ...)
//!
//! # Example
//!
//! ```ignore
//! use meetlink_client::prelude::*;
//! use meetlink_transport::TungsteniteWebSocketAdapter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DefaultSignalingClient::new(Arc::new(TungsteniteWebSocketAdapter::new()));
//!     client.register_observer(Arc::new(|event: &SignalingClientEvent| {
//!         println!("{}", event.event_type);
//!     }));
//!     client.open_connection(SignalingClientConnectionRequest::new(
//!         "wss://signal.example.com/control/meeting",
//!         "join-token",
//!     ));
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod join;
pub mod observer;
pub mod ping_pong;
pub mod request;
pub mod subscribe;
pub mod task;

pub use browser::{BrowserBehavior, DefaultBrowserBehavior};
pub use client::{DefaultSignalingClient, SignalingClient};
pub use config::SignalingClientConfig;
pub use context::{MeetingConfiguration, NegotiationContext, NegotiationState, PeerConnection};
pub use error::{ClientError, Result};
pub use event::{SignalingClientEvent, SignalingClientEventType};
pub use join::SignalingClientJoin;
pub use observer::SignalingClientObserver;
pub use ping_pong::{DefaultPingPong, PingPongObserver};
pub use request::SignalingClientConnectionRequest;
pub use subscribe::SignalingClientSubscribe;
pub use task::{Task, TaskCanceler};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::{DefaultSignalingClient, SignalingClient};
    pub use crate::config::SignalingClientConfig;
    pub use crate::error::{ClientError, Result};
    pub use crate::event::{SignalingClientEvent, SignalingClientEventType};
    pub use crate::observer::SignalingClientObserver;
    pub use crate::request::SignalingClientConnectionRequest;
    pub use meetlink_core::{SignalFrame, SignalMessage};
}
