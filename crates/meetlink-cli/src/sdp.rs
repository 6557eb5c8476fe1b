//! SDP commands

use anyhow::{Context, Result};
use colored::Colorize;
use meetlink_sdp::Sdp;
use std::path::Path;
use tracing::debug;

/// Transforms selected on the command line, applied in field order
#[derive(Debug, Default, Clone)]
pub struct SdpTransforms {
    pub strip_srflx: bool,
    pub remove_h264: bool,
    pub prefer_h264: bool,
    pub bandwidth_kbps: Option<u32>,
    pub firefox: bool,
    pub start_bitrate_kbps: Option<u32>,
    pub simulcast: Option<usize>,
    pub max_audio_bitrate: Option<f64>,
    pub stereo: bool,
}

impl SdpTransforms {
    pub fn apply(&self, sdp: &Sdp) -> Sdp {
        let mut sdp = sdp.clone();
        if self.strip_srflx {
            sdp = sdp.without_server_reflexive_candidates();
        }
        if self.remove_h264 {
            sdp = sdp.remove_h264_support_from_send_section();
        }
        if self.prefer_h264 {
            sdp = sdp.prefer_h264_if_exists();
        }
        if let Some(kbps) = self.bandwidth_kbps {
            sdp = sdp.with_bandwidth_restriction(kbps, self.firefox);
        }
        if let Some(kbps) = self.start_bitrate_kbps {
            sdp = sdp.with_starting_video_send_bitrate(kbps);
        }
        if let Some(layers) = self.simulcast {
            sdp = sdp.with_old_fashioned_munging_simulcast(layers);
        }
        if self.max_audio_bitrate.is_some() {
            sdp = sdp.with_audio_max_average_bitrate(self.max_audio_bitrate);
        }
        if self.stereo {
            sdp = sdp.with_stereo_audio();
        }
        sdp
    }
}

/// Read an SDP file, normalizing bare LF line endings to CRLF
pub fn read_sdp(path: &Path) -> Result<Sdp> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read SDP {}", path.display()))?;
    if text.contains("\r\n") {
        return Ok(Sdp::new(text));
    }
    debug!("normalizing LF line endings");
    Ok(Sdp::new(text.replace('\n', "\r\n")))
}

pub fn run_sdp(path: &Path, transforms: &SdpTransforms) -> Result<()> {
    let sdp = read_sdp(path)?;
    let munged = transforms.apply(&sdp);
    print!("{}", munged.as_str());
    Ok(())
}

pub fn run_sdp_info(path: &Path) -> Result<()> {
    let sdp = read_sdp(path)?;
    let sections = sdp.media_sections();

    println!("{} {} media section(s)", "SDP".cyan().bold(), sections.len());
    for (i, section) in sections.iter().enumerate() {
        let mid = if section.mid.is_empty() {
            "-".to_string()
        } else {
            section.mid.clone()
        };
        println!(
            "  {:>2}  {:<12} mid={:<6} {}",
            i,
            section.media_type.green(),
            mid,
            section.direction
        );
    }

    let audio = sdp.get_audio_payload_types();
    if audio.opus != 0 {
        println!("  opus payload type: {} (red: {})", audio.opus, audio.red);
    }

    println!(
        "  candidates: {} (all m-lines: {})",
        yes_no(sdp.has_candidates()),
        yes_no(sdp.has_candidates_for_all_m_lines())
    );
    match sdp.ssrc_for_video_sending_section() {
        Some(ssrc) => println!("  video send ssrc: {}", ssrc),
        None => println!("  video send ssrc: {}", "none".dimmed()),
    }
    Ok(())
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".yellow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n";

    #[test]
    fn test_no_transforms_is_identity() {
        let sdp = Sdp::new(OFFER);
        assert_eq!(SdpTransforms::default().apply(&sdp), sdp);
    }

    #[test]
    fn test_audio_transforms() {
        let transforms = SdpTransforms {
            max_audio_bitrate: Some(32000.0),
            stereo: true,
            ..Default::default()
        };
        let munged = transforms.apply(&Sdp::new(OFFER));
        assert!(munged
            .as_str()
            .contains("maxaveragebitrate=32000;stereo=1;sprop-stereo=1"));
    }

    #[test]
    fn test_read_normalizes_line_endings() {
        let path = std::env::temp_dir().join(format!("meetlink-cli-{}.sdp", std::process::id()));
        std::fs::write(&path, "v=0\nm=audio 9 UDP/TLS/RTP/SAVPF 111\n").unwrap();
        let sdp = read_sdp(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(sdp.as_str(), "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n");
    }
}
