//! Capabilities of the local WebRTC stack
//!
//! The negotiation path branches on a handful of engine quirks. They are
//! gathered behind [`BrowserBehavior`] so native stacks and tests can
//! describe themselves.

use serde::{Deserialize, Serialize};

pub trait BrowserBehavior: Send + Sync {
    fn platform_name(&self) -> &str;

    fn platform_version(&self) -> &str;

    fn is_firefox(&self) -> bool {
        false
    }

    /// The send section must not offer H.264 (broken encoder on this engine)
    fn requires_h264_removal(&self) -> bool {
        false
    }

    /// Supports transport-wide congestion control on the send side
    fn supports_send_side_bwe(&self) -> bool {
        true
    }

    /// Local offers need `o=mozilla-chrome` before going to the server
    fn requires_unified_plan_munging(&self) -> bool {
        false
    }
}

/// Data-driven [`BrowserBehavior`], configurable from a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultBrowserBehavior {
    pub platform_name: String,
    pub platform_version: String,
    pub firefox: bool,
    pub h264_removal: bool,
    pub send_side_bwe: bool,
    pub unified_plan_munging: bool,
}

impl Default for DefaultBrowserBehavior {
    fn default() -> Self {
        Self {
            platform_name: std::env::consts::OS.to_string(),
            platform_version: std::env::consts::ARCH.to_string(),
            firefox: false,
            h264_removal: false,
            send_side_bwe: true,
            unified_plan_munging: false,
        }
    }
}

impl DefaultBrowserBehavior {
    /// Firefox: no send-side BWE, unified-plan munging required
    pub fn firefox(version: impl Into<String>) -> Self {
        Self {
            platform_name: "firefox".to_string(),
            platform_version: version.into(),
            firefox: true,
            h264_removal: false,
            send_side_bwe: false,
            unified_plan_munging: true,
        }
    }
}

impl BrowserBehavior for DefaultBrowserBehavior {
    fn platform_name(&self) -> &str {
        &self.platform_name
    }

    fn platform_version(&self) -> &str {
        &self.platform_version
    }

    fn is_firefox(&self) -> bool {
        self.firefox
    }

    fn requires_h264_removal(&self) -> bool {
        self.h264_removal
    }

    fn supports_send_side_bwe(&self) -> bool {
        self.send_side_bwe
    }

    fn requires_unified_plan_munging(&self) -> bool {
        self.unified_plan_munging
    }
}
