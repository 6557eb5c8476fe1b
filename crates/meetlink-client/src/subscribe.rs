//! SUBSCRIBE settings

use bytes::Bytes;
use meetlink_core::{
    StreamDescriptor, StreamMediaType, StreamServiceType, SubscribeFrame,
    VideoSubscriptionConfiguration,
};

/// Track label of the audio send stream
pub const AUDIO_TRACK_LABEL: &str = "AmazonChimeExpressAudio";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalingClientSubscribe {
    pub attendee_id: String,
    pub sdp_offer: String,
    /// Sent instead of `sdp_offer` when set
    pub compressed_sdp_offer: Option<Bytes>,
    pub audio_host: String,
    pub audio_muted: bool,
    pub audio_checkin: bool,
    pub receive_stream_ids: Vec<u32>,
    pub local_video_enabled: bool,
    /// Local video send streams, in send order
    pub video_stream_descriptions: Vec<StreamDescriptor>,
    pub connection_type_has_video: bool,
    pub video_subscription_configuration: Vec<VideoSubscriptionConfiguration>,
}

impl SignalingClientSubscribe {
    pub(crate) fn to_frame(&self) -> SubscribeFrame {
        let mut frame = SubscribeFrame {
            duplex: StreamServiceType::Rx,
            audio_checkin: self.audio_checkin,
            audio_host: self.audio_host.clone(),
            audio_muted: self.audio_muted,
            video_subscription_configuration: self.video_subscription_configuration.clone(),
            ..Default::default()
        };

        match &self.compressed_sdp_offer {
            Some(compressed) => frame.compressed_sdp_offer = Some(compressed.clone()),
            None => frame.sdp_offer = Some(self.sdp_offer.clone()),
        }

        if self.connection_type_has_video {
            frame.receive_stream_ids = self.receive_stream_ids.clone();
        }

        if !self.audio_checkin {
            frame.send_streams.push(StreamDescriptor {
                media_type: StreamMediaType::Audio,
                track_label: AUDIO_TRACK_LABEL.to_string(),
                attendee_id: self.attendee_id.clone(),
                stream_id: 1,
                group_id: 1,
                framerate: 15,
                max_bitrate_kbps: 600,
                avg_bitrate_bps: 400_000,
                ..Default::default()
            });
        }

        if self.local_video_enabled {
            frame.duplex = StreamServiceType::Duplex;
            frame
                .send_streams
                .extend(self.video_stream_descriptions.iter().map(|d| StreamDescriptor {
                    attendee_id: self.attendee_id.clone(),
                    ..d.clone()
                }));
        }

        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(stream_id: u32) -> StreamDescriptor {
        StreamDescriptor {
            stream_id,
            group_id: 2,
            max_bitrate_kbps: 1200,
            ..Default::default()
        }
    }

    #[test]
    fn test_receive_only_with_audio() {
        let settings = SignalingClientSubscribe {
            attendee_id: "a1".to_string(),
            sdp_offer: "v=0\r\n".to_string(),
            receive_stream_ids: vec![4, 5],
            ..Default::default()
        };
        let frame = settings.to_frame();
        assert_eq!(frame.duplex, StreamServiceType::Rx);
        assert_eq!(frame.sdp_offer.as_deref(), Some("v=0\r\n"));
        assert!(frame.receive_stream_ids.is_empty());

        assert_eq!(frame.send_streams.len(), 1);
        let audio = &frame.send_streams[0];
        assert_eq!(audio.media_type, StreamMediaType::Audio);
        assert_eq!(audio.track_label, AUDIO_TRACK_LABEL);
        assert_eq!(audio.attendee_id, "a1");
        assert_eq!((audio.stream_id, audio.group_id, audio.framerate), (1, 1, 15));
        assert_eq!((audio.max_bitrate_kbps, audio.avg_bitrate_bps), (600, 400_000));
    }

    #[test]
    fn test_duplex_with_video() {
        let settings = SignalingClientSubscribe {
            attendee_id: "a1".to_string(),
            audio_checkin: true,
            local_video_enabled: true,
            connection_type_has_video: true,
            receive_stream_ids: vec![4],
            video_stream_descriptions: vec![video(2), video(3)],
            ..Default::default()
        };
        let frame = settings.to_frame();
        assert_eq!(frame.duplex, StreamServiceType::Duplex);
        assert_eq!(frame.receive_stream_ids, vec![4]);
        let ids: Vec<u32> = frame.send_streams.iter().map(|s| s.stream_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(frame.send_streams.iter().all(|s| s.attendee_id == "a1"));
    }

    #[test]
    fn test_compressed_offer_replaces_text() {
        let settings = SignalingClientSubscribe {
            sdp_offer: "v=0\r\n".to_string(),
            compressed_sdp_offer: Some(Bytes::from_static(&[1, 2, 3])),
            ..Default::default()
        };
        let frame = settings.to_frame();
        assert_eq!(frame.sdp_offer, None);
        assert_eq!(frame.compressed_sdp_offer.as_deref(), Some(&[1u8, 2, 3][..]));
    }
}
