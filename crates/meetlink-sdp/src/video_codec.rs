//! Video payload type munging: codec ordering, H.264 removal, start bitrate

use crate::audio::merge_fmtp_parameters;
use crate::codec_capability::VideoCodecCapability;
use crate::sdp::Sdp;
use crate::section::{find_video_section, Direction};
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

/// `a=rtpmap:<pt> <name>/<clock>[/<channels>]`
struct RtpMap<'a> {
    payload_type: u32,
    name: &'a str,
    clock_rate: u32,
}

fn parse_rtpmap(line: &str) -> Option<RtpMap<'_>> {
    let rest = line.strip_prefix("a=rtpmap:")?;
    let (pt, encoding) = rest.split_once(' ')?;
    let mut parts = encoding.split('/');
    let name = parts.next()?;
    let clock_rate = parts.next()?.trim().parse().ok()?;
    Some(RtpMap {
        payload_type: pt.parse().ok()?,
        name,
        clock_rate,
    })
}

/// Payload type of an attribute such as `a=fmtp:<pt> ...` or `a=rtcp-fb:<pt> ...`
fn attribute_payload_type(line: &str, attribute: &str) -> Option<u32> {
    let rest = line.strip_prefix("a=")?.strip_prefix(attribute)?.strip_prefix(':')?;
    rest.split(' ').next()?.parse().ok()
}

/// Value of `apt=` in an fmtp line
fn fmtp_apt(line: &str) -> Option<u32> {
    let (_, params) = line.split_once(' ')?;
    params
        .split(';')
        .find_map(|p| p.trim().strip_prefix("apt="))
        .and_then(|v| v.trim().parse().ok())
}

/// `m=video <port> <proto>` and the payload type list
fn split_m_line(line: &str) -> Option<(Vec<&str>, Vec<&str>)> {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() < 3 {
        return None;
    }
    Some((tokens[..3].to_vec(), tokens[3..].to_vec()))
}

fn join_m_line(head: &[&str], payload_types: &[&str]) -> String {
    head.iter()
        .chain(payload_types.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Sdp {
    /// Strip H.264 and its RTX payload types from the sendrecv video section
    pub fn remove_h264_support_from_send_section(&self) -> Sdp {
        let mut lines = self.owned_lines();
        let Some(range) = find_video_section(&lines, |d| d == Direction::Sendrecv) else {
            return self.clone();
        };

        let h264: HashSet<u32> = lines[range.clone()]
            .iter()
            .filter_map(|l| parse_rtpmap(l))
            .filter(|m| m.name.eq_ignore_ascii_case("H264"))
            .map(|m| m.payload_type)
            .collect();
        if h264.is_empty() {
            return self.clone();
        }

        let rtx: HashSet<u32> = lines[range.clone()]
            .iter()
            .filter_map(|l| {
                let pt = attribute_payload_type(l, "fmtp")?;
                let apt = fmtp_apt(l)?;
                h264.contains(&apt).then_some(pt)
            })
            .collect();
        let removed: HashSet<u32> = h264.union(&rtx).copied().collect();
        debug!("removing payload types {:?} from send section", removed);

        let Some((head, payload_types)) = split_m_line(&lines[range.start]) else {
            return self.clone();
        };
        let kept: Vec<&str> = payload_types
            .into_iter()
            .filter(|pt| pt.parse::<u32>().map(|pt| !removed.contains(&pt)).unwrap_or(true))
            .collect();
        let m_line = join_m_line(&head, &kept);

        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        for (i, line) in lines.drain(..).enumerate() {
            if i == range.start {
                out.push(m_line.clone());
                continue;
            }
            if range.contains(&i) {
                let owner = ["rtpmap", "rtcp-fb", "fmtp"]
                    .iter()
                    .find_map(|attr| attribute_payload_type(&line, attr));
                if owner.map(|pt| removed.contains(&pt)).unwrap_or(false) {
                    continue;
                }
            }
            out.push(line);
        }
        Sdp::from_lines(out)
    }

    /// Move H.264 constrained baseline to the front of the send section
    pub fn prefer_h264_if_exists(&self) -> Sdp {
        self.with_video_send_codec_preferences(&[VideoCodecCapability::h264()])
    }

    /// Reorder the send section's payload types so matches of earlier
    /// preferences come first. Payload types matching nothing keep their
    /// relative order after the preferred ones; none are added or removed.
    pub fn with_video_send_codec_preferences(&self, preferences: &[VideoCodecCapability]) -> Sdp {
        if preferences.is_empty() {
            return self.clone();
        }
        let mut lines = self.owned_lines();
        let Some(range) = find_video_section(&lines, |d| d.includes_send()) else {
            return self.clone();
        };
        let Some((head, payload_types)) = split_m_line(&lines[range.start]) else {
            return self.clone();
        };

        let mut ordered: Vec<&str> = Vec::with_capacity(payload_types.len());
        for preference in preferences {
            for pt in &payload_types {
                if ordered.contains(pt) {
                    continue;
                }
                if payload_matches(&lines, &range, pt, preference) {
                    ordered.push(*pt);
                }
            }
        }
        for pt in &payload_types {
            if !ordered.contains(pt) {
                ordered.push(*pt);
            }
        }

        let m_line = join_m_line(&head, &ordered);
        lines[range.start] = m_line;
        Sdp::from_lines(lines)
    }

    /// Append `x-google-start-bitrate` to every fmtp line of the send section
    pub fn with_starting_video_send_bitrate(&self, kbps: u32) -> Sdp {
        let mut lines = self.owned_lines();
        let Some(range) = find_video_section(&lines, |d| d.includes_send()) else {
            return self.clone();
        };
        let bps = (u64::from(kbps) * 1000).to_string();

        for i in range {
            if !lines[i].starts_with("a=fmtp:") {
                continue;
            }
            let Some((attr, params)) = lines[i].split_once(' ') else {
                continue;
            };
            let merged = merge_fmtp_parameters(params, &[("x-google-start-bitrate", bps.clone())]);
            let updated = format!("{} {}", attr, merged);
            lines[i] = updated;
        }
        Sdp::from_lines(lines)
    }
}

fn payload_matches(
    lines: &[String],
    range: &Range<usize>,
    payload_type: &str,
    preference: &VideoCodecCapability,
) -> bool {
    let Ok(pt) = payload_type.parse::<u32>() else {
        return false;
    };
    let section = &lines[range.clone()];
    let Some(rtpmap) = section
        .iter()
        .filter_map(|l| parse_rtpmap(l))
        .find(|m| m.payload_type == pt)
    else {
        return false;
    };
    let fmtp = section
        .iter()
        .find(|l| attribute_payload_type(l, "fmtp") == Some(pt))
        .map(String::as_str);
    preference.matches_payload(rtpmap.name, rtpmap.clock_rate, pt, fmtp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rtpmap() {
        let m = parse_rtpmap("a=rtpmap:111 opus/48000/2").unwrap();
        assert_eq!(m.payload_type, 111);
        assert_eq!(m.name, "opus");
        assert_eq!(m.clock_rate, 48000);
        assert!(parse_rtpmap("a=rtpmap:x VP8").is_none());
    }

    #[test]
    fn test_attribute_payload_type() {
        assert_eq!(attribute_payload_type("a=rtcp-fb:96 nack pli", "rtcp-fb"), Some(96));
        assert_eq!(attribute_payload_type("a=fmtp:97 apt=96", "fmtp"), Some(97));
        assert_eq!(fmtp_apt("a=fmtp:97 apt=96"), Some(96));
        assert_eq!(attribute_payload_type("a=rtcp-mux", "rtcp-fb"), None);
    }
}
