//! SSRC inspection and plan-B style simulcast munging

use crate::sdp::Sdp;
use crate::section::{find_video_section, Direction};
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

/// First `a=ssrc-group:FID <primary> <rtx>` pair in a section
fn fid_group(lines: &[String], range: &Range<usize>) -> Option<(u32, u32)> {
    lines[range.clone()].iter().find_map(|line| {
        let rest = line.strip_prefix("a=ssrc-group:FID ")?;
        let mut ids = rest.split(' ');
        let primary = ids.next()?.trim().parse().ok()?;
        let rtx = ids.next()?.trim().parse().ok()?;
        Some((primary, rtx))
    })
}

/// Every SSRC named by `a=ssrc:` or `a=ssrc-group:` lines in a section
fn used_ssrcs(lines: &[String], range: &Range<usize>) -> HashSet<u32> {
    let mut used = HashSet::new();
    for line in &lines[range.clone()] {
        if let Some(rest) = line.strip_prefix("a=ssrc:") {
            if let Some(id) = rest.split(' ').next().and_then(|id| id.parse().ok()) {
                used.insert(id);
            }
        } else if let Some(rest) = line.strip_prefix("a=ssrc-group:") {
            used.extend(rest.split(' ').skip(1).filter_map(|id| id.trim().parse::<u32>().ok()));
        }
    }
    used
}

/// Value of `a=ssrc:<ssrc> <attribute>:<value>`, preferring the given SSRC
fn ssrc_attribute(lines: &[String], range: &Range<usize>, ssrc: u32, attribute: &str) -> Option<String> {
    let lookup = |want: Option<u32>| {
        lines[range.clone()].iter().find_map(|line| {
            let rest = line.strip_prefix("a=ssrc:")?;
            let (id, attr) = rest.split_once(' ')?;
            if let Some(want) = want {
                if id.parse::<u32>().ok()? != want {
                    return None;
                }
            }
            let value = attr.strip_prefix(attribute)?.strip_prefix(':')?;
            Some(value.to_string())
        })
    };
    lookup(Some(ssrc)).or_else(|| lookup(None))
}

impl Sdp {
    /// Primary SSRC of the FID group in the first video section that sends
    pub fn ssrc_for_video_sending_section(&self) -> Option<u32> {
        let lines = self.owned_lines();
        let range = find_video_section(&lines, |d| d.includes_send())?;
        fid_group(&lines, &range).map(|(primary, _)| primary)
    }

    /// Whether the send SSRC rotated between `previous` and this
    /// description. Unknown on either side counts as unchanged.
    pub fn video_send_section_has_different_ssrc(&self, previous: &Sdp) -> bool {
        match (
            self.ssrc_for_video_sending_section(),
            previous.ssrc_for_video_sending_section(),
        ) {
            (Some(ours), Some(theirs)) => ours != theirs,
            _ => false,
        }
    }

    /// Synthesize `layer_count` SSRC pairs for browsers without native
    /// simulcast, grouped under `a=ssrc-group:SIM`.
    ///
    /// Layer 0 keeps the existing FID pair. Further pairs count up from
    /// `primary + 1`, skipping any SSRC the section already uses. The section's `cname` and
    /// `msid` are copied onto every generated SSRC. Descriptions without a
    /// sendrecv video section, FID group, cname or msid come back unchanged.
    pub fn with_old_fashioned_munging_simulcast(&self, layer_count: usize) -> Sdp {
        if layer_count < 2 {
            return self.clone();
        }
        let lines = self.owned_lines();
        let Some(range) = find_video_section(&lines, |d| d == Direction::Sendrecv) else {
            return self.clone();
        };
        let Some((primary, rtx)) = fid_group(&lines, &range) else {
            return self.clone();
        };
        let (Some(cname), Some(msid)) = (
            ssrc_attribute(&lines, &range, primary, "cname"),
            ssrc_attribute(&lines, &range, primary, "msid"),
        ) else {
            return self.clone();
        };

        let mut used = used_ssrcs(&lines, &range);
        used.insert(primary);
        used.insert(rtx);
        let mut cursor = primary;
        let mut next_ssrc = || loop {
            cursor = cursor.wrapping_add(1);
            if used.insert(cursor) {
                return cursor;
            }
        };

        let mut generated = Vec::with_capacity(layer_count * 5 + 1);
        let mut primaries = Vec::with_capacity(layer_count);
        for layer in 0..layer_count {
            let (p, r) = if layer == 0 {
                (primary, rtx)
            } else {
                let p = next_ssrc();
                (p, next_ssrc())
            };
            generated.push(format!("a=ssrc:{} cname:{}", p, cname));
            generated.push(format!("a=ssrc:{} msid:{}", p, msid));
            generated.push(format!("a=ssrc:{} cname:{}", r, cname));
            generated.push(format!("a=ssrc:{} msid:{}", r, msid));
            generated.push(format!("a=ssrc-group:FID {} {}", p, r));
            primaries.push(p.to_string());
        }
        generated.push(format!("a=ssrc-group:SIM {}", primaries.join(" ")));
        debug!("munged {} simulcast layers onto ssrc {}", layer_count, primary);

        let mut out = Vec::with_capacity(lines.len() + generated.len());
        let mut pending = Some(generated);
        for (i, line) in lines.into_iter().enumerate() {
            let is_ssrc = line.starts_with("a=ssrc:") || line.starts_with("a=ssrc-group:");
            if range.contains(&i) && is_ssrc {
                if let Some(generated) = pending.take() {
                    out.extend(generated);
                }
                continue;
            }
            if i == range.end {
                if let Some(generated) = pending.take() {
                    out.extend(generated);
                }
            }
            out.push(line);
        }
        if let Some(generated) = pending {
            out.extend(generated);
        }
        Sdp::from_lines(out)
    }
}
