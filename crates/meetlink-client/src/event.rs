//! Events published by the signaling client

use meetlink_core::time::now_ms;
use meetlink_core::SignalMessage;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalingClientEventType {
    WebSocketConnecting,
    WebSocketOpen,
    /// The connection never opened
    WebSocketFailed,
    /// A fault on a connection that had opened
    WebSocketError,
    WebSocketClosing,
    WebSocketClosed,
    WebSocketMessage,
    WebSocketSentMessage,
    WebSocketSendMessageFailure,
    WebSocketSkippedMessage,
    ReceivedSignalFrame,
    ProtocolDecodeFailure,
}

impl SignalingClientEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalingClientEventType::WebSocketConnecting => "WebSocketConnecting",
            SignalingClientEventType::WebSocketOpen => "WebSocketOpen",
            SignalingClientEventType::WebSocketFailed => "WebSocketFailed",
            SignalingClientEventType::WebSocketError => "WebSocketError",
            SignalingClientEventType::WebSocketClosing => "WebSocketClosing",
            SignalingClientEventType::WebSocketClosed => "WebSocketClosed",
            SignalingClientEventType::WebSocketMessage => "WebSocketMessage",
            SignalingClientEventType::WebSocketSentMessage => "WebSocketSentMessage",
            SignalingClientEventType::WebSocketSendMessageFailure => "WebSocketSendMessageFailure",
            SignalingClientEventType::WebSocketSkippedMessage => "WebSocketSkippedMessage",
            SignalingClientEventType::ReceivedSignalFrame => "ReceivedSignalFrame",
            SignalingClientEventType::ProtocolDecodeFailure => "ProtocolDecodeFailure",
        }
    }

    /// High-volume types logged at debug rather than info
    pub(crate) fn is_chatty(&self) -> bool {
        matches!(
            self,
            SignalingClientEventType::WebSocketMessage
                | SignalingClientEventType::ReceivedSignalFrame
                | SignalingClientEventType::WebSocketSentMessage
                | SignalingClientEventType::WebSocketSkippedMessage
        )
    }
}

impl fmt::Display for SignalingClientEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalingClientEvent {
    pub event_type: SignalingClientEventType,
    /// Local wall clock when the event was created
    pub timestamp_ms: u64,
    /// Decoded frame, for `ReceivedSignalFrame`
    pub message: Option<SignalMessage>,
    pub close_code: Option<u16>,
    pub close_reason: Option<String>,
}

impl SignalingClientEvent {
    pub fn new(event_type: SignalingClientEventType) -> Self {
        Self {
            event_type,
            timestamp_ms: now_ms(),
            message: None,
            close_code: None,
            close_reason: None,
        }
    }

    pub fn with_message(event_type: SignalingClientEventType, message: SignalMessage) -> Self {
        Self {
            message: Some(message),
            ..Self::new(event_type)
        }
    }

    pub fn closed(code: u16, reason: impl Into<String>) -> Self {
        Self {
            close_code: Some(code),
            close_reason: Some(reason.into()),
            ..Self::new(SignalingClientEventType::WebSocketClosed)
        }
    }

    /// The connection is gone or going away
    pub fn is_connection_terminated(&self) -> bool {
        matches!(
            self.event_type,
            SignalingClientEventType::WebSocketFailed
                | SignalingClientEventType::WebSocketError
                | SignalingClientEventType::WebSocketClosing
                | SignalingClientEventType::WebSocketClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_terminated() {
        use SignalingClientEventType::*;
        for t in [WebSocketFailed, WebSocketError, WebSocketClosing, WebSocketClosed] {
            assert!(SignalingClientEvent::new(t).is_connection_terminated(), "{}", t);
        }
        for t in [WebSocketConnecting, WebSocketOpen, ReceivedSignalFrame, WebSocketSkippedMessage] {
            assert!(!SignalingClientEvent::new(t).is_connection_terminated(), "{}", t);
        }
    }

    #[test]
    fn test_closed_event_carries_code() {
        let event = SignalingClientEvent::closed(1006, "abnormal closure");
        assert_eq!(event.event_type, SignalingClientEventType::WebSocketClosed);
        assert_eq!(event.close_code, Some(1006));
        assert_eq!(event.close_reason.as_deref(), Some("abnormal closure"));
    }
}
