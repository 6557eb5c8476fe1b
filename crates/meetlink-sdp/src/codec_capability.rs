//! Negotiable video codecs and fmtp matching

use serde::{Deserialize, Serialize};

static_regex!(profile_level_id_re, r"(?i)profile-level-id=([0-9a-f]{4})[0-9a-f]{2}");
static_regex!(start_bitrate_re, r";x-google-start-bitrate=\d+");

/// A video codec as named in SDP, plus the capability fields a peer
/// connection reports for it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoCodecCapability {
    /// Name used in `a=rtpmap`, e.g. `H264`
    pub codec_name: String,
    /// e.g. `video/H264`
    pub mime_type: String,
    pub clock_rate: u32,
    pub sdp_fmtp_line: Option<String>,
}

impl VideoCodecCapability {
    pub fn new(codec_name: &str, clock_rate: u32, sdp_fmtp_line: Option<&str>) -> Self {
        Self {
            codec_name: codec_name.to_string(),
            mime_type: format!("video/{}", codec_name),
            clock_rate,
            sdp_fmtp_line: sdp_fmtp_line.map(str::to_string),
        }
    }

    pub fn vp8() -> Self {
        Self::new("VP8", 90000, None)
    }

    /// Baseline profile; more often hardware encoded than constrained baseline
    pub fn h264_baseline_profile() -> Self {
        Self::new(
            "H264",
            90000,
            Some("level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f"),
        )
    }

    /// Constrained baseline; mandatory in every WebRTC implementation
    pub fn h264_constrained_baseline_profile() -> Self {
        Self::new(
            "H264",
            90000,
            Some("level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"),
        )
    }

    pub fn h264_main_profile() -> Self {
        Self::new(
            "H264",
            90000,
            Some("level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=4d001f"),
        )
    }

    pub fn h264_high_profile() -> Self {
        Self::new(
            "H264",
            90000,
            Some("level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=64001f"),
        )
    }

    pub fn h264_constrained_high_profile() -> Self {
        Self::new(
            "H264",
            90000,
            Some("level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=640c1f"),
        )
    }

    /// The H.264 flavor with the widest compatibility
    pub fn h264() -> Self {
        Self::h264_constrained_baseline_profile()
    }

    /// VP9 profile 0 (8-bit content)
    pub fn vp9_profile0() -> Self {
        Self::new("VP9", 90000, Some("profile-id=0"))
    }

    pub fn vp9() -> Self {
        Self::vp9_profile0()
    }

    pub fn av1_main() -> Self {
        Self::new("AV1", 90000, None)
    }

    pub fn av1() -> Self {
        Self::av1_main()
    }

    /// Look a preset up by a user-facing name (`vp8`, `h264-cbp`, `vp9`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "vp8" => Some(Self::vp8()),
            "h264" | "h264-cbp" | "h264-constrained-baseline" => Some(Self::h264()),
            "h264-baseline" => Some(Self::h264_baseline_profile()),
            "h264-main" => Some(Self::h264_main_profile()),
            "h264-high" => Some(Self::h264_high_profile()),
            "h264-constrained-high" => Some(Self::h264_constrained_high_profile()),
            "vp9" | "vp9-profile0" => Some(Self::vp9_profile0()),
            "av1" | "av1-main" => Some(Self::av1_main()),
            _ => None,
        }
    }

    /// Same codec, clock rate and (normalized) format parameters
    pub fn equals(&self, other: &VideoCodecCapability) -> bool {
        if self.codec_name != other.codec_name
            || self.mime_type != other.mime_type
            || self.clock_rate != other.clock_rate
        {
            return false;
        }
        let ours = self
            .sdp_fmtp_line
            .as_deref()
            .map(|l| normalize_fmtp(l, &self.codec_name))
            .unwrap_or_default();
        let theirs = other
            .sdp_fmtp_line
            .as_deref()
            .map(|l| normalize_fmtp(l, &other.codec_name))
            .unwrap_or_default();
        ours == theirs
    }

    /// Whether an `a=fmtp:<pt> ...` line carries this capability's format
    /// parameters. H.264 levels are not compared, only profiles.
    pub fn fmtp_line_matches(&self, line: &str, expected_payload_type: u32) -> bool {
        let Some(ref ours) = self.sdp_fmtp_line else {
            return false;
        };
        let prefix = format!("a=fmtp:{} ", expected_payload_type);
        let Some(params) = line.strip_prefix(&prefix) else {
            return false;
        };
        normalize_fmtp(params, &self.codec_name) == normalize_fmtp(ours, &self.codec_name)
    }

    /// Whether a payload type described by its rtpmap and optional fmtp
    /// parameters is an instance of this codec
    pub(crate) fn matches_payload(
        &self,
        name: &str,
        clock_rate: u32,
        payload_type: u32,
        fmtp_line: Option<&str>,
    ) -> bool {
        if !self.codec_name.eq_ignore_ascii_case(name) || self.clock_rate != clock_rate {
            return false;
        }
        if self.sdp_fmtp_line.is_none() {
            return true;
        }
        // profile 0 is implied when a VP9 payload announces no profile-id
        if self.is_vp9_profile0() {
            let has_profile = fmtp_line
                .map(|l| l.contains("profile-id="))
                .unwrap_or(false);
            if !has_profile {
                return true;
            }
        }
        fmtp_line
            .map(|l| self.fmtp_line_matches(l, payload_type))
            .unwrap_or(false)
    }

    fn is_vp9_profile0(&self) -> bool {
        self.codec_name.eq_ignore_ascii_case("VP9")
            && self
                .sdp_fmtp_line
                .as_deref()
                .map(|l| normalize_fmtp(l, "VP9").contains("profile-id=0"))
                .unwrap_or(false)
    }
}

/// fmtp value with the start bitrate dropped and the H.264
/// profile-level-id cut down to its profile. Parameter order matters.
fn normalize_fmtp(params: &str, codec_name: &str) -> String {
    let mut cleaned = match start_bitrate_re() {
        Some(re) => re.replace_all(params, "").into_owned(),
        None => params.to_string(),
    };
    if codec_name.eq_ignore_ascii_case("H264") {
        if let Some(re) = profile_level_id_re() {
            cleaned = re.replace(&cleaned, "profile-level-id=$1").into_owned();
        }
    }
    cleaned
}
