//! Signaling client configuration

use meetlink_core::ClientDetails;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// How long to wait for the transport's close event before synthesizing one
pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 2000;

pub const DEFAULT_PING_PONG_INTERVAL_MS: u64 = 10_000;

pub const DEFAULT_MAX_NUM_OF_VIDEOS: u32 = 25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingClientConfig {
    pub close_timeout_ms: u64,
    pub ping_pong_interval_ms: u64,
    pub max_num_of_videos: u32,
    /// Ask the server for BITRATES frames
    pub send_bitrates: bool,
    /// Local UTC offset reported in JOIN
    pub utc_offset_minutes: i32,
    /// Application metadata; empty platform and SDK fields are filled in
    pub client_details: ClientDetails,
}

impl Default for SignalingClientConfig {
    fn default() -> Self {
        Self {
            close_timeout_ms: DEFAULT_CLOSE_TIMEOUT_MS,
            ping_pong_interval_ms: DEFAULT_PING_PONG_INTERVAL_MS,
            max_num_of_videos: DEFAULT_MAX_NUM_OF_VIDEOS,
            send_bitrates: false,
            utc_offset_minutes: 0,
            client_details: ClientDetails::default(),
        }
    }
}

impl SignalingClientConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn ping_pong_interval(&self) -> Duration {
        Duration::from_millis(self.ping_pong_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.close_timeout_ms == 0 {
            return Err(ClientError::Config("close_timeout_ms must be positive".into()));
        }
        if self.ping_pong_interval_ms == 0 {
            return Err(ClientError::Config("ping_pong_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SignalingClientConfig::default();
        assert_eq!(config.close_timeout(), Duration::from_millis(2000));
        assert_eq!(config.ping_pong_interval(), Duration::from_secs(10));
        assert_eq!(config.max_num_of_videos, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SignalingClientConfig {
            ping_pong_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }
}
