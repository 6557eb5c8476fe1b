//! meetlink core
//!
//! Signal frame model and binary wire codec for the meetlink signaling channel.
//!
//! This crate provides:
//! - The tagged frame model ([`SignalFrame`], [`SignalMessage`])
//! - Envelope framing with the leading frame type byte ([`frame`])
//! - Payload encoding/decoding ([`codec`])
//! - Wall clock helpers ([`time`])

pub mod codec;
pub mod error;
pub mod frame;
pub mod time;
pub mod types;

pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use types::*;

/// Signaling protocol version announced in JOIN
pub const PROTOCOL_VERSION: u32 = 2;

/// Control protocol version appended to the signaling URL
pub const CONTROL_PROTOCOL_VERSION: u32 = 3;

/// Frame type byte carried by every outbound message
pub const FRAME_TYPE_RTC: u8 = 0x05;

/// Frame type byte sent by one legacy server variant
pub const FRAME_TYPE_LEGACY: u8 = 0x02;
