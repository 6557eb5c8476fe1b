//! JOIN settings

use meetlink_core::time::utc_offset_string;
use meetlink_core::{join_flags, JoinFrame, ServerSideNetworkAdaption, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

use crate::browser::BrowserBehavior;
use crate::config::SignalingClientConfig;

/// Name reported as `client_source` when the application sets none
pub const SDK_NAME: &str = "meetlink";

/// Per-join options; everything else comes from the client configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingClientJoin {
    /// Request BITRATES frames for this session
    pub send_bitrates: bool,
    pub wants_compressed_sdp: bool,
    pub server_side_network_adaption: Option<ServerSideNetworkAdaption>,
    pub supported_server_side_network_adaptions: Vec<ServerSideNetworkAdaption>,
    pub wants_all_temporal_layers_in_index: bool,
    pub disable_periodic_keyframe_request_on_content_sender: bool,
}

impl SignalingClientJoin {
    pub fn new(send_bitrates: bool) -> Self {
        Self {
            send_bitrates,
            ..Default::default()
        }
    }

    pub(crate) fn to_frame(
        &self,
        config: &SignalingClientConfig,
        browser: &dyn BrowserBehavior,
        audio_session_id: u64,
    ) -> JoinFrame {
        let mut flags = join_flags::HAS_STREAM_UPDATE;
        if browser.supports_send_side_bwe() {
            flags |= join_flags::USE_SEND_SIDE_BWE;
        }
        if self.send_bitrates || config.send_bitrates {
            flags |= join_flags::SEND_BITRATES;
        }

        let mut details = config.client_details.clone();
        if details.platform_name.is_empty() {
            details.platform_name = browser.platform_name().to_string();
        }
        if details.platform_version.is_empty() {
            details.platform_version = browser.platform_version().to_string();
        }
        if details.client_source.is_empty() {
            details.client_source = SDK_NAME.to_string();
        }
        if details.sdk_version.is_empty() {
            details.sdk_version = env!("CARGO_PKG_VERSION").to_string();
        }
        details.client_utc_offset = utc_offset_string(config.utc_offset_minutes);

        JoinFrame {
            protocol_version: PROTOCOL_VERSION,
            max_num_of_videos: config.max_num_of_videos,
            flags,
            client_details: details,
            audio_session_id,
            wants_compressed_sdp: self.wants_compressed_sdp,
            server_side_network_adaption: self.server_side_network_adaption,
            supported_server_side_network_adaptions: self.supported_server_side_network_adaptions.clone(),
            wants_all_temporal_layers_in_index: self.wants_all_temporal_layers_in_index,
            disable_periodic_keyframe_request_on_content_sender: self
                .disable_periodic_keyframe_request_on_content_sender,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::DefaultBrowserBehavior;

    #[test]
    fn test_flags() {
        let config = SignalingClientConfig::default();
        let chrome = DefaultBrowserBehavior::default();
        let frame = SignalingClientJoin::new(false).to_frame(&config, &chrome, 7);
        assert_eq!(frame.flags, join_flags::HAS_STREAM_UPDATE | join_flags::USE_SEND_SIDE_BWE);
        assert_eq!(frame.protocol_version, 2);
        assert_eq!(frame.audio_session_id, 7);

        let firefox = DefaultBrowserBehavior::firefox("128");
        let frame = SignalingClientJoin::new(true).to_frame(&config, &firefox, 7);
        assert_eq!(frame.flags, join_flags::HAS_STREAM_UPDATE | join_flags::SEND_BITRATES);
    }

    #[test]
    fn test_client_details_filled_in() {
        let mut config = SignalingClientConfig::default();
        config.client_details.app_name = "room".to_string();
        config.utc_offset_minutes = -300;
        let browser = DefaultBrowserBehavior::firefox("128");

        let details = SignalingClientJoin::default().to_frame(&config, &browser, 1).client_details;
        assert_eq!(details.app_name, "room");
        assert_eq!(details.platform_name, "firefox");
        assert_eq!(details.platform_version, "128");
        assert_eq!(details.client_source, SDK_NAME);
        assert_eq!(details.sdk_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(details.client_utc_offset, "-05:00");
    }
}
