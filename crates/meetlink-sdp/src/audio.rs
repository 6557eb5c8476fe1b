//! Opus fmtp munging

use crate::sdp::Sdp;
use crate::section::media_ranges;
use crate::{MAX_OPUS_BITRATE_BPS, MIN_OPUS_BITRATE_BPS};
use serde::{Deserialize, Serialize};
use tracing::debug;

static_regex!(opus_rtpmap_re, r"(?i)^a=rtpmap:(\d+) opus/48000");
static_regex!(red_rtpmap_re, r"(?i)^a=rtpmap:(\d+) red/48000");

/// Audio payload types announced in the description, 0 when absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioPayloadTypes {
    pub opus: u32,
    pub red: u32,
}

impl Sdp {
    /// Cap the Opus average bitrate.
    ///
    /// `None`, zero and NaN leave the description unchanged. Other values are
    /// clamped to the Opus range and truncated.
    pub fn with_audio_max_average_bitrate(&self, max_average_bitrate_bps: Option<f64>) -> Sdp {
        let Some(bitrate) = max_average_bitrate_bps else {
            return self.clone();
        };
        if bitrate == 0.0 || bitrate.is_nan() {
            return self.clone();
        }
        let clamped = bitrate.clamp(MIN_OPUS_BITRATE_BPS, MAX_OPUS_BITRATE_BPS).trunc() as u32;
        self.with_opus_parameters(&[("maxaveragebitrate", clamped.to_string())])
    }

    pub fn with_stereo_audio(&self) -> Sdp {
        self.with_opus_parameters(&[
            ("stereo", "1".to_string()),
            ("sprop-stereo", "1".to_string()),
        ])
    }

    pub fn get_audio_payload_types(&self) -> AudioPayloadTypes {
        let mut types = AudioPayloadTypes::default();
        for line in self.sdp_lines() {
            if types.opus == 0 {
                if let Some(pt) = capture_payload_type(opus_rtpmap_re(), line) {
                    types.opus = pt;
                }
            }
            if types.red == 0 {
                if let Some(pt) = capture_payload_type(red_rtpmap_re(), line) {
                    types.red = pt;
                }
            }
        }
        types
    }

    fn sdp_lines(&self) -> impl Iterator<Item = &str> {
        self.as_str().split(crate::sdp::CRLF)
    }

    /// Merge `additions` into the Opus fmtp line of every audio section. The
    /// fmtp line must belong to the Opus payload type of the same section,
    /// and may come before or after its rtpmap. A section without one gets a
    /// new fmtp line right after the rtpmap.
    fn with_opus_parameters(&self, additions: &[(&str, String)]) -> Sdp {
        let mut lines = self.owned_lines();
        let ranges = media_ranges(&lines);

        // back to front so insertions don't shift pending ranges
        for range in ranges.into_iter().rev() {
            if !lines[range.start].starts_with("m=audio") {
                continue;
            }

            let mut opus = None;
            for i in range.clone() {
                if let Some(pt) = capture_payload_type(opus_rtpmap_re(), &lines[i]) {
                    opus = Some((i, pt));
                    break;
                }
            }
            let Some((rtpmap_index, payload_type)) = opus else {
                continue;
            };

            let prefix = format!("a=fmtp:{} ", payload_type);
            let existing = range.clone().find(|&i| lines[i].starts_with(&prefix));
            match existing {
                Some(i) => {
                    let merged = merge_fmtp_parameters(&lines[i][prefix.len()..], additions);
                    lines[i] = format!("{}{}", prefix, merged);
                }
                None => {
                    debug!("adding fmtp line for opus payload type {}", payload_type);
                    lines.insert(
                        rtpmap_index + 1,
                        format!("{}{}", prefix, merge_fmtp_parameters("", additions)),
                    );
                }
            }
        }

        Sdp::from_lines(lines)
    }
}

pub(crate) fn capture_payload_type(re: Option<&regex_lite::Regex>, line: &str) -> Option<u32> {
    re?.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Merge `key=value` parameters by key. Existing keys named in `additions`
/// are dropped from their old position; every addition is appended in order.
pub(crate) fn merge_fmtp_parameters(existing: &str, additions: &[(&str, String)]) -> String {
    let mut params: Vec<String> = existing
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| {
            let key = p.split('=').next().unwrap_or("").trim();
            !additions.iter().any(|(k, _)| *k == key)
        })
        .map(str::to_string)
        .collect();
    params.extend(additions.iter().map(|(k, v)| format!("{}={}", k, v)));
    params.join(";")
}
