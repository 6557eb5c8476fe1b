//! The immutable SDP value and its line-level probes and transforms.
//!
//! Transforms that touch codecs, header extensions or SSRCs live in their own
//! modules as further `impl Sdp` blocks.

use crate::candidate::SdpCandidateType;
use crate::section::{media_ranges, MediaSection};
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) const CRLF: &str = "\r\n";

static_regex!(candidate_type_re, r"a=candidate:.* typ ([a-z]+) ");
static_regex!(rtp_candidate_re, r"candidate:(\S+) (\d+)");

/// One session description.
///
/// The text is kept verbatim; structure is derived on demand. Cloning is the
/// only way to get a second handle, and no method mutates `self`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sdp {
    sdp: String,
}

impl Sdp {
    pub fn new(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.sdp
    }

    pub fn into_string(self) -> String {
        self.sdp
    }

    pub fn is_empty(&self) -> bool {
        self.sdp.is_empty()
    }

    /// Lines split on CRLF. A trailing CRLF yields a final empty line, so
    /// `from_lines(lines())` reproduces the text exactly.
    pub fn lines(&self) -> Vec<&str> {
        self.sdp.split(CRLF).collect()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sdp = String::new();
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 {
                sdp.push_str(CRLF);
            }
            sdp.push_str(line.as_ref());
        }
        Self { sdp }
    }

    pub(crate) fn owned_lines(&self) -> Vec<String> {
        self.sdp.split(CRLF).map(str::to_string).collect()
    }

    /// Trimmed lines of a blob that may use either line ending
    fn split_lines(blob: &str) -> Vec<&str> {
        blob.trim().split('\n').map(str::trim).collect()
    }

    // ========================================================================
    // Probes
    // ========================================================================

    pub fn has_video(&self) -> bool {
        self.sdp.lines().any(|l| l.starts_with("m=video"))
    }

    pub fn has_candidates(&self) -> bool {
        self.sdp.contains("a=candidate:")
    }

    /// `false` while any section still advertises the `0.0.0.0` placeholder
    /// connection address that precedes ICE gathering
    pub fn has_candidates_for_all_m_lines(&self) -> bool {
        !self.sdp.contains("\r\nc=IN IP4 0.0.0.0\r\n")
    }

    /// Whether an ICE candidate belongs to the RTP component (1)
    pub fn is_rtp_candidate(candidate: &str) -> bool {
        rtp_candidate_re()
            .and_then(|re| re.captures(candidate))
            .and_then(|caps| caps.get(2))
            .map(|component| component.as_str() == "1")
            .unwrap_or(false)
    }

    /// Candidate type of an `a=candidate` line, `None` when absent or unknown
    pub fn candidate_type(line: &str) -> Option<SdpCandidateType> {
        let caps = candidate_type_re()?.captures(line)?;
        SdpCandidateType::from_token(caps.get(1)?.as_str())
    }

    /// Media sections in order, excluding the session section
    pub fn media_sections(&self) -> Vec<MediaSection> {
        let lines = self.lines();
        media_ranges(&lines)
            .into_iter()
            .filter_map(|range| MediaSection::parse(&lines[range]))
            .collect()
    }

    // ========================================================================
    // Line transforms
    // ========================================================================

    pub fn without_candidate_type(&self, candidate_type: SdpCandidateType) -> Sdp {
        Sdp::from_lines(
            self.lines()
                .into_iter()
                .filter(|line| Sdp::candidate_type(line) != Some(candidate_type)),
        )
    }

    pub fn without_server_reflexive_candidates(&self) -> Sdp {
        self.without_candidate_type(SdpCandidateType::ServerReflexive)
    }

    /// Insert a bandwidth line after every `m=video` line. Firefox only
    /// honors `b=TIAS` (bps) for video; everyone else gets `b=AS` (kbps).
    pub fn with_bandwidth_restriction(&self, max_bitrate_kbps: u32, is_firefox: bool) -> Sdp {
        let mut out = Vec::new();
        for line in self.lines() {
            out.push(line.to_string());
            if line.starts_with("m=video") {
                if is_firefox {
                    out.push(format!("b=TIAS:{}", u64::from(max_bitrate_kbps) * 1000));
                } else {
                    out.push(format!("b=AS:{}", max_bitrate_kbps));
                }
            }
        }
        Sdp::from_lines(out)
    }

    pub fn with_bundle_audio_video(&self) -> Sdp {
        Sdp::from_lines(self.lines().into_iter().map(|line| {
            if line == "a=group:BUNDLE audio" {
                "a=group:BUNDLE audio video"
            } else {
                line
            }
        }))
    }

    /// Append every video section of `other` to this description
    pub fn copy_video(&self, other: &str) -> Sdp {
        let mut out: Vec<&str> = Sdp::split_lines(&self.sdp);
        let mut in_video = false;
        for line in other.split(CRLF) {
            if line.starts_with("m=video") {
                in_video = true;
            } else if line.starts_with("m=") {
                in_video = false;
            }
            if in_video {
                out.push(line);
            }
        }
        Sdp::from_lines(out)
    }

    /// Rewrite a Chrome origin line so the description reads as unified plan
    pub fn with_unified_plan_format(&self) -> Sdp {
        if self.sdp.contains("mozilla") {
            return self.clone();
        }
        Sdp::new(self.sdp.replacen("o=-", "o=mozilla-chrome", 1))
    }
}

impl From<String> for Sdp {
    fn from(sdp: String) -> Self {
        Sdp::new(sdp)
    }
}

impl From<&str> for Sdp {
    fn from(sdp: &str) -> Self {
        Sdp::new(sdp)
    }
}

impl AsRef<str> for Sdp {
    fn as_ref(&self) -> &str {
        &self.sdp
    }
}

impl fmt::Display for Sdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sdp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_roundtrip() {
        let text = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n";
        let sdp = Sdp::new(text);
        assert_eq!(sdp.lines(), vec!["v=0", "o=- 1 2 IN IP4 127.0.0.1", ""]);
        assert_eq!(Sdp::from_lines(sdp.lines()).as_str(), text);
    }

    #[test]
    fn test_rtp_candidate() {
        assert!(Sdp::is_rtp_candidate(
            "candidate:1 1 udp 2122260223 10.0.0.1 50000 typ host"
        ));
        assert!(!Sdp::is_rtp_candidate(
            "candidate:1 2 udp 2122260223 10.0.0.1 50001 typ host"
        ));
        assert!(!Sdp::is_rtp_candidate("garbage"));
    }

    #[test]
    fn test_candidate_type() {
        let line = "a=candidate:2 1 udp 1686052607 1.2.3.4 5000 typ srflx raddr 0.0.0.0 rport 0";
        assert_eq!(
            Sdp::candidate_type(line),
            Some(SdpCandidateType::ServerReflexive)
        );
        assert_eq!(
            Sdp::candidate_type("a=candidate:2 1 udp 1 1.2.3.4 5000 typ weird generation 0"),
            None
        );
        assert_eq!(Sdp::candidate_type("a=mid:0"), None);
    }

    #[test]
    fn test_unified_plan_format() {
        let chrome = Sdp::new("v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n");
        assert_eq!(
            chrome.with_unified_plan_format().as_str(),
            "v=0\r\no=mozilla-chrome 1 2 IN IP4 127.0.0.1\r\n"
        );

        let firefox = Sdp::new("v=0\r\no=mozilla...THIS_IS_SDPARTA-99.0 1 0 IN IP4 0.0.0.0\r\n");
        assert_eq!(firefox.with_unified_plan_format(), firefox);
    }
}
