//! meetlink SDP
//!
//! Line-oriented session description munging. An [`Sdp`] wraps the raw text a
//! peer connection produced; every transform returns a new value and leaves
//! its input untouched. Transforms are total: text they cannot make sense of
//! comes back unchanged.
//!
//! # Example
//!
//! ```
//! use meetlink_sdp::Sdp;
//!
//! let offer = Sdp::new(
//!     "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n\
//!      a=fmtp:111 minptime=10;useinbandfec=1\r\n",
//! );
//! let munged = offer.with_audio_max_average_bitrate(Some(64000.0)).with_stereo_audio();
//! assert!(munged
//!     .as_str()
//!     .contains("a=fmtp:111 minptime=10;useinbandfec=1;maxaveragebitrate=64000;stereo=1;sprop-stereo=1"));
//! ```

/// Lazily compiled pattern. Resolves to `None` if the pattern fails to
/// compile, which callers treat as "no match".
macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> Option<&'static regex_lite::Regex> {
            static RE: std::sync::OnceLock<Option<regex_lite::Regex>> = std::sync::OnceLock::new();
            RE.get_or_init(|| regex_lite::Regex::new($pattern).ok())
                .as_ref()
        }
    };
}

mod audio;
pub mod candidate;
pub mod codec_capability;
mod extension;
pub mod sdp;
pub mod section;
mod simulcast;
mod video_codec;

pub use audio::AudioPayloadTypes;
pub use candidate::SdpCandidateType;
pub use codec_capability::VideoCodecCapability;
pub use sdp::Sdp;
pub use section::{Direction, MediaSection};

/// RTP header extension announcing the video layers allocation
pub const VIDEO_LAYERS_ALLOCATION_URL: &str =
    "http://www.webrtc.org/experiments/rtp-hdrext/video-layers-allocation00";

/// RTP header extension carrying the AV1 dependency descriptor
pub const DEPENDENCY_DESCRIPTOR_URL: &str =
    "https://aomediacodec.github.io/av1-rtp-spec/#dependency-descriptor-rtp-header-extension";

/// Opus bitrate bounds (RFC 7587)
pub const MIN_OPUS_BITRATE_BPS: f64 = 6000.0;
pub const MAX_OPUS_BITRATE_BPS: f64 = 510000.0;
