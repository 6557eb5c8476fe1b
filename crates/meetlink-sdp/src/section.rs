//! Media section views and line-range helpers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Transceiver direction of a media section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// RFC 4566 default when no direction attribute is present
    #[default]
    Sendrecv,
    Sendonly,
    Recvonly,
    Inactive,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sendrecv => "sendrecv",
            Direction::Sendonly => "sendonly",
            Direction::Recvonly => "recvonly",
            Direction::Inactive => "inactive",
        }
    }

    /// Parse a direction attribute line such as `a=recvonly`
    pub fn from_attribute(line: &str) -> Option<Self> {
        match line.trim_end() {
            "a=sendrecv" => Some(Direction::Sendrecv),
            "a=sendonly" => Some(Direction::Sendonly),
            "a=recvonly" => Some(Direction::Recvonly),
            "a=inactive" => Some(Direction::Inactive),
            _ => None,
        }
    }

    pub fn includes_send(&self) -> bool {
        matches!(self, Direction::Sendrecv | Direction::Sendonly)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed view of one `m=` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSection {
    /// `audio`, `video`, `application`, ...
    pub media_type: String,
    /// Empty when the section carries no `a=mid`
    pub mid: String,
    pub direction: Direction,
}

impl MediaSection {
    pub(crate) fn parse<S: AsRef<str>>(lines: &[S]) -> Option<Self> {
        let first = lines.first()?.as_ref();
        let media_type = first.strip_prefix("m=")?.split(' ').next()?.to_string();

        let mut mid = String::new();
        let mut direction = None;
        for line in &lines[1..] {
            let line = line.as_ref();
            if let Some(value) = line.strip_prefix("a=mid:") {
                if mid.is_empty() {
                    mid = value.trim().to_string();
                }
            } else if direction.is_none() {
                direction = Direction::from_attribute(line);
            }
        }

        Some(Self {
            media_type,
            mid,
            direction: direction.unwrap_or_default(),
        })
    }

    pub fn is_video(&self) -> bool {
        self.media_type == "video"
    }

    pub fn is_audio(&self) -> bool {
        self.media_type == "audio"
    }
}

/// Line ranges of every media section.
///
/// A section runs from its `m=` line up to the next `m=` line. The last
/// section stops after its last non-empty line so that appends land before
/// the trailing CRLF.
pub(crate) fn media_ranges<S: AsRef<str>>(lines: &[S]) -> Vec<Range<usize>> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.as_ref().starts_with("m="))
        .map(|(i, _)| i)
        .collect();

    let mut ranges = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = match starts.get(n + 1) {
            Some(&next) => next,
            None => {
                let mut end = lines.len();
                while end > start + 1 && lines[end - 1].as_ref().is_empty() {
                    end -= 1;
                }
                end
            }
        };
        ranges.push(start..end);
    }
    ranges
}

/// First video section whose direction satisfies `accept`
pub(crate) fn find_video_section<S, F>(lines: &[S], accept: F) -> Option<Range<usize>>
where
    S: AsRef<str>,
    F: Fn(Direction) -> bool,
{
    media_ranges(lines).into_iter().find(|range| {
        MediaSection::parse(&lines[range.clone()])
            .map(|s| s.is_video() && accept(s.direction))
            .unwrap_or(false)
    })
}

/// Index just past the section's direction attribute, or past its last
/// `a=extmap` line when no direction attribute is present
pub(crate) fn extension_insert_position<S: AsRef<str>>(
    lines: &[S],
    range: &Range<usize>,
) -> usize {
    let mut last_extmap = None;
    for i in range.clone() {
        let line = lines[i].as_ref();
        if Direction::from_attribute(line).is_some() {
            return i + 1;
        }
        if line.starts_with("a=extmap:") {
            last_extmap = Some(i + 1);
        }
    }
    last_extmap.unwrap_or(range.end)
}
