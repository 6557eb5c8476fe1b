//! Transport framing
//!
//! Every binary WebSocket message is:
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Byte 0:   Frame type (0x05; 0x02 from legacy servers) │
//! ├──────────────────────────────────────────────────────┤
//! │ Serialized SignalMessage (see codec)                  │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{Error, Result, FRAME_TYPE_LEGACY, FRAME_TYPE_RTC};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

/// Size of the frame type prefix
pub const HEADER_SIZE: usize = 1;

/// A framed signaling payload
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame_type: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Create an outbound frame
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type: FRAME_TYPE_RTC,
            payload: payload.into(),
        }
    }

    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Prepend the frame type byte
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_u8(self.frame_type);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Strip the frame type byte.
    ///
    /// Unexpected frame types are logged and the payload is still handed on;
    /// only an empty buffer is rejected.
    pub fn decode(bytes: &Bytes) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::EmptyFrame);
        }

        let frame_type = bytes[0];
        match frame_type {
            FRAME_TYPE_RTC => {}
            FRAME_TYPE_LEGACY => {
                warn!("received legacy frame type 0x{:02x}", frame_type);
            }
            other => {
                warn!("unexpected frame type 0x{:02x}", other);
            }
        }

        Ok(Self {
            frame_type,
            payload: bytes.slice(HEADER_SIZE..),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prepends_frame_type() {
        let frame = Frame::new(Bytes::from_static(b"abc"));
        let encoded = frame.encode();
        assert_eq!(&encoded[..], &[0x05, b'a', b'b', b'c']);
    }

    #[test]
    fn test_decode_accepts_legacy_type() {
        let bytes = Bytes::from_static(&[0x02, 0xAA]);
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.frame_type, FRAME_TYPE_LEGACY);
        assert_eq!(&frame.payload[..], &[0xAA]);
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(Frame::decode(&Bytes::new()), Err(Error::EmptyFrame));
    }
}
