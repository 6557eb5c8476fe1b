//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] meetlink_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] meetlink_transport::TransportError),

    #[error("{0} got canceled")]
    TaskCanceled(String),

    #[error("{task} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("signaling client not ready")]
    NotReady,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("client error: {0}")]
    Other(String),
}

impl ClientError {
    pub(crate) fn task_failed(task: &str, reason: impl Into<String>) -> Self {
        ClientError::TaskFailed {
            task: task.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this is a cancellation rather than a failure
    pub fn is_canceled(&self) -> bool {
        matches!(self, ClientError::TaskCanceled(_))
    }
}
