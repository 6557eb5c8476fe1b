//! RTP header extension ID negotiation.
//!
//! Some WebRTC stacks fail hard when an extension changes ID across
//! renegotiations, so an ID bound in the previous offer always wins.

use crate::sdp::Sdp;
use crate::section::{extension_insert_position, media_ranges};
use crate::{DEPENDENCY_DESCRIPTOR_URL, VIDEO_LAYERS_ALLOCATION_URL};
use tracing::debug;

/// One-byte header extension IDs (RFC 5285); 0 is reserved
const MIN_EXTENSION_ID: u32 = 1;
const MAX_EXTENSION_ID: u32 = 14;

/// `a=extmap:<id>[/<direction>] <url> ...`
fn parse_extmap(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix("a=extmap:")?;
    let (id, rest) = rest.split_once(' ')?;
    let id = id.split('/').next()?.parse().ok()?;
    let url = rest.split(' ').next()?;
    Some((id, url))
}

fn extension_id(lines: &[String], url: &str) -> Option<u32> {
    lines
        .iter()
        .filter_map(|l| parse_extmap(l))
        .find(|(_, u)| *u == url)
        .map(|(id, _)| id)
}

fn id_used_by_other(lines: &[String], id: u32, url: &str) -> bool {
    lines
        .iter()
        .filter_map(|l| parse_extmap(l))
        .any(|(i, u)| i == id && u != url)
}

fn lowest_free_id(lines: &[String]) -> Option<u32> {
    let used: Vec<u32> = lines
        .iter()
        .filter_map(|l| parse_extmap(l))
        .map(|(id, _)| id)
        .collect();
    (MIN_EXTENSION_ID..=MAX_EXTENSION_ID).find(|id| !used.contains(id))
}

impl Sdp {
    pub fn with_video_layers_allocation_rtp_header_extension(&self, previous: Option<&Sdp>) -> Sdp {
        self.with_video_header_extension(VIDEO_LAYERS_ALLOCATION_URL, previous)
    }

    pub fn with_dependency_descriptor_rtp_header_extension(&self, previous: Option<&Sdp>) -> Sdp {
        self.with_video_header_extension(DEPENDENCY_DESCRIPTOR_URL, previous)
    }

    /// Bind `url` to an ID in every video section.
    ///
    /// An ID from `previous` is reused when it is free here. If another
    /// extension has taken it, the URL is dropped rather than renumbered.
    /// Otherwise the lowest free ID is used; with none free the description
    /// is returned unchanged.
    pub fn with_video_header_extension(&self, url: &str, previous: Option<&Sdp>) -> Sdp {
        let lines = self.owned_lines();
        let current = extension_id(&lines, url);
        let previous_id = previous.and_then(|p| extension_id(&p.owned_lines(), url));

        match previous_id {
            Some(id) if current == Some(id) => self.clone(),
            Some(id) if id_used_by_other(&lines, id, url) => {
                debug!("extension id {} taken, dropping {}", id, url);
                Sdp::from_lines(
                    lines
                        .into_iter()
                        .filter(|l| parse_extmap(l).map(|(_, u)| u != url).unwrap_or(true)),
                )
            }
            Some(id) if current.is_some() => {
                debug!("restoring extension id {} for {}", id, url);
                Sdp::from_lines(lines.into_iter().map(|l| match parse_extmap(&l) {
                    Some((_, u)) if u == url => with_extmap_id(&l, id),
                    _ => l,
                }))
            }
            Some(id) => insert_extension(lines, id, url),
            None if current.is_some() => self.clone(),
            None => match lowest_free_id(&lines) {
                Some(id) => insert_extension(lines, id, url),
                None => {
                    debug!("no free extension id for {}", url);
                    self.clone()
                }
            },
        }
    }
}

/// Replace only the numeric ID, keeping any `/direction` and attributes
fn with_extmap_id(line: &str, id: u32) -> String {
    let rest = line.strip_prefix("a=extmap:").unwrap_or(line);
    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    format!("a=extmap:{}{}", id, &rest[digits..])
}

fn insert_extension(mut lines: Vec<String>, id: u32, url: &str) -> Sdp {
    let ranges = media_ranges(&lines);
    for range in ranges.into_iter().rev() {
        if !lines[range.start].starts_with("m=video") {
            continue;
        }
        let at = extension_insert_position(&lines, &range);
        lines.insert(at, format!("a=extmap:{} {}", id, url));
    }
    Sdp::from_lines(lines)
}
