//! Error types for the signaling codec

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Codec error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Nothing to decode
    #[error("empty frame")]
    EmptyFrame,

    /// Buffer ended before a field was complete
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// A string or list does not fit its length prefix
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Invalid message type code
    #[error("unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),

    /// A wire enum carried a value outside its range
    #[error("invalid value {value} for {field}")]
    InvalidEnumValue { field: &'static str, value: u32 },

    /// Generic decode failure (utf-8 and friends)
    #[error("decode error: {0}")]
    DecodeError(String),
}
