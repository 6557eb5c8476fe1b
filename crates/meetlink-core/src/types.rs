//! Signal frame model
//!
//! Every message on the signaling channel is one [`SignalMessage`]: an
//! optional timestamp, an optional error status, and exactly one
//! [`SignalFrame`] payload.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Join flag bits
pub mod join_flags {
    pub const SEND_BITRATES: u32 = 1;
    pub const HAS_STREAM_UPDATE: u32 = 2;
    pub const USE_SEND_SIDE_BWE: u32 = 8;
    pub const COMPLETE_VIDEO_SOURCES_LIST: u32 = 16;
    pub const EXCLUDE_SELF_CONTENT_IN_INDEX: u32 = 32;
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

wire_enum! {
    /// Frame type discriminant as carried on the wire
    pub enum MessageType {
        Join = 1,
        JoinAck = 2,
        Subscribe = 3,
        SubscribeAck = 4,
        Index = 5,
        Pause = 7,
        Resume = 8,
        Leave = 9,
        LeaveAck = 10,
        Bitrates = 13,
        AudioControl = 16,
        AudioMetadata = 17,
        AudioStreamIdInfo = 18,
        PingPong = 19,
        AudioStatus = 20,
        ClientMetric = 21,
        DataMessage = 22,
        RemoteVideoUpdate = 24,
        PrimaryMeetingJoin = 25,
        PrimaryMeetingJoinAck = 26,
        PrimaryMeetingLeave = 27,
        Notification = 34,
    }
}

wire_enum! {
    /// Direction of a subscription
    pub enum StreamServiceType {
        Rx = 1,
        Tx = 2,
        Duplex = 3,
    }
}

wire_enum! {
    pub enum StreamMediaType {
        Audio = 1,
        Video = 2,
    }
}

wire_enum! {
    pub enum PingPongType {
        Ping = 1,
        Pong = 2,
    }
}

wire_enum! {
    /// How the server should degrade a subscribed video under constraint
    pub enum VideoQualityAdaptationPreference {
        Balanced = 1,
        MaintainFramerate = 2,
        MaintainResolution = 3,
    }
}

wire_enum! {
    pub enum ServerSideNetworkAdaption {
        Default = 1,
        None = 2,
        BandwidthProbing = 3,
        BandwidthProbingAndVideoQualityAdaption = 4,
    }
}

wire_enum! {
    pub enum NotificationLevel {
        Info = 1,
        Warning = 2,
        Error = 3,
    }
}

impl Default for VideoQualityAdaptationPreference {
    fn default() -> Self {
        VideoQualityAdaptationPreference::Balanced
    }
}

impl VideoQualityAdaptationPreference {
    /// Map an application-level preference name onto the wire enum.
    /// Unrecognized names fall back to `Balanced`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "maintainFramerate" | "maintain-framerate" | "maintain_framerate" => {
                VideoQualityAdaptationPreference::MaintainFramerate
            }
            "maintainResolution" | "maintain-resolution" | "maintain_resolution" => {
                VideoQualityAdaptationPreference::MaintainResolution
            }
            _ => VideoQualityAdaptationPreference::Balanced,
        }
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// One message on the signaling channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    /// Sender wall clock in ms, stamped on every outbound message
    pub timestamp_ms: Option<u64>,
    pub frame: SignalFrame,
    /// Error status attached by the server
    pub error: Option<ErrorFrame>,
}

impl SignalMessage {
    pub fn new(frame: SignalFrame) -> Self {
        Self {
            timestamp_ms: None,
            frame,
            error: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn with_error(mut self, error: ErrorFrame) -> Self {
        self.error = Some(error);
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.frame.message_type()
    }
}

/// Tagged frame payload; exactly one variant per message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SignalFrame {
    Join(JoinFrame),
    JoinAck(JoinAckFrame),
    Subscribe(SubscribeFrame),
    SubscribeAck(SubscribeAckFrame),
    Index(IndexFrame),
    Pause(PauseResumeFrame),
    Resume(PauseResumeFrame),
    Leave(LeaveFrame),
    LeaveAck(LeaveAckFrame),
    Bitrates(BitrateFrame),
    AudioControl(AudioControlFrame),
    AudioMetadata(AudioMetadataFrame),
    AudioStreamIdInfo(AudioStreamIdInfoFrame),
    PingPong(PingPongFrame),
    AudioStatus(AudioStatusFrame),
    ClientMetric(ClientMetricFrame),
    DataMessage(DataMessageFrame),
    RemoteVideoUpdate(RemoteVideoUpdateFrame),
    PrimaryMeetingJoin(PrimaryMeetingJoinFrame),
    PrimaryMeetingJoinAck(PrimaryMeetingJoinAckFrame),
    PrimaryMeetingLeave(PrimaryMeetingLeaveFrame),
    Notification(NotificationFrame),
}

impl SignalFrame {
    pub fn message_type(&self) -> MessageType {
        match self {
            SignalFrame::Join(_) => MessageType::Join,
            SignalFrame::JoinAck(_) => MessageType::JoinAck,
            SignalFrame::Subscribe(_) => MessageType::Subscribe,
            SignalFrame::SubscribeAck(_) => MessageType::SubscribeAck,
            SignalFrame::Index(_) => MessageType::Index,
            SignalFrame::Pause(_) => MessageType::Pause,
            SignalFrame::Resume(_) => MessageType::Resume,
            SignalFrame::Leave(_) => MessageType::Leave,
            SignalFrame::LeaveAck(_) => MessageType::LeaveAck,
            SignalFrame::Bitrates(_) => MessageType::Bitrates,
            SignalFrame::AudioControl(_) => MessageType::AudioControl,
            SignalFrame::AudioMetadata(_) => MessageType::AudioMetadata,
            SignalFrame::AudioStreamIdInfo(_) => MessageType::AudioStreamIdInfo,
            SignalFrame::PingPong(_) => MessageType::PingPong,
            SignalFrame::AudioStatus(_) => MessageType::AudioStatus,
            SignalFrame::ClientMetric(_) => MessageType::ClientMetric,
            SignalFrame::DataMessage(_) => MessageType::DataMessage,
            SignalFrame::RemoteVideoUpdate(_) => MessageType::RemoteVideoUpdate,
            SignalFrame::PrimaryMeetingJoin(_) => MessageType::PrimaryMeetingJoin,
            SignalFrame::PrimaryMeetingJoinAck(_) => MessageType::PrimaryMeetingJoinAck,
            SignalFrame::PrimaryMeetingLeave(_) => MessageType::PrimaryMeetingLeave,
            SignalFrame::Notification(_) => MessageType::Notification,
        }
    }
}

/// Error status attached to a server frame
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub status: u32,
    pub description: String,
}

// ============================================================================
// JOIN
// ============================================================================

/// Client and application identification sent with JOIN
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientDetails {
    pub app_name: String,
    pub app_version: String,
    pub device_model: String,
    pub device_make: String,
    pub platform_name: String,
    pub platform_version: String,
    pub client_source: String,
    pub sdk_version: String,
    pub client_utc_offset: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinFrame {
    pub protocol_version: u32,
    pub max_num_of_videos: u32,
    pub flags: u32,
    pub client_details: ClientDetails,
    pub audio_session_id: u64,
    pub wants_compressed_sdp: bool,
    pub server_side_network_adaption: Option<ServerSideNetworkAdaption>,
    pub supported_server_side_network_adaptions: Vec<ServerSideNetworkAdaption>,
    pub wants_all_temporal_layers_in_index: bool,
    pub disable_periodic_keyframe_request_on_content_sender: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnCredentials {
    pub username: String,
    pub password: String,
    pub ttl: u32,
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinAckFrame {
    pub turn_credentials: Option<TurnCredentials>,
    pub video_subscription_limit: Option<u32>,
    pub wants_compressed_sdp: bool,
    pub default_server_side_network_adaption: Option<ServerSideNetworkAdaption>,
}

// ============================================================================
// SUBSCRIBE / INDEX
// ============================================================================

/// One media stream, sent in SUBSCRIBE and received in INDEX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub stream_id: u32,
    pub framerate: u32,
    pub max_bitrate_kbps: u32,
    pub track_label: String,
    pub group_id: u32,
    pub avg_bitrate_bps: u32,
    pub attendee_id: String,
    pub media_type: StreamMediaType,
    pub external_user_id: String,
    pub width: u32,
    pub height: u32,
}

impl Default for StreamDescriptor {
    fn default() -> Self {
        Self {
            stream_id: 0,
            framerate: 0,
            max_bitrate_kbps: 0,
            track_label: String::new(),
            group_id: 0,
            avg_bitrate_bps: 0,
            attendee_id: String::new(),
            media_type: StreamMediaType::Video,
            external_user_id: String::new(),
            width: 0,
            height: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSubscriptionConfiguration {
    pub mid: String,
    pub attendee_id: String,
    pub stream_id: u32,
    pub priority: u32,
    pub target_bitrate_kbps: u32,
    pub group_id: u32,
    pub quality_adaptation_preference: VideoQualityAdaptationPreference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeFrame {
    pub duplex: StreamServiceType,
    pub send_streams: Vec<StreamDescriptor>,
    pub receive_stream_ids: Vec<u32>,
    pub sdp_offer: Option<String>,
    pub audio_host: String,
    pub audio_checkin: bool,
    pub audio_muted: bool,
    pub compressed_sdp_offer: Option<Bytes>,
    pub video_subscription_configuration: Vec<VideoSubscriptionConfiguration>,
}

impl Default for SubscribeFrame {
    fn default() -> Self {
        Self {
            duplex: StreamServiceType::Rx,
            send_streams: Vec::new(),
            receive_stream_ids: Vec::new(),
            sdp_offer: None,
            audio_host: String::new(),
            audio_checkin: false,
            audio_muted: false,
            compressed_sdp_offer: None,
            video_subscription_configuration: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamAllocation {
    pub track_label: String,
    pub stream_id: u32,
    pub group_id: u32,
}

/// Binds a negotiated SSRC to a stream
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackMapping {
    pub stream_id: u32,
    pub ssrc: u32,
    pub track_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeAckFrame {
    pub duplex: StreamServiceType,
    pub allocations: Vec<StreamAllocation>,
    pub sdp_answer: Option<String>,
    pub tracks: Vec<TrackMapping>,
    pub compressed_sdp_answer: Option<Bytes>,
}

impl Default for SubscribeAckFrame {
    fn default() -> Self {
        Self {
            duplex: StreamServiceType::Rx,
            allocations: Vec::new(),
            sdp_answer: None,
            tracks: Vec::new(),
            compressed_sdp_answer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexFrame {
    pub at_capacity: bool,
    pub sources: Vec<StreamDescriptor>,
    pub paused_at_source_ids: Vec<u32>,
    pub num_participants: Option<u32>,
}

// ============================================================================
// CONTROL
// ============================================================================

/// Shared by PAUSE and RESUME
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PauseResumeFrame {
    pub stream_ids: Vec<u32>,
    pub group_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaveFrame {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaveAckFrame {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bitrate {
    pub source_stream_id: u32,
    pub avg_bitrate_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitrateFrame {
    pub bitrates: Vec<Bitrate>,
    pub server_available_outgoing_bitrate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioControlFrame {
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioAttendeeState {
    pub audio_stream_id: u32,
    pub volume: Option<u32>,
    pub muted: Option<bool>,
    pub signal_strength: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioMetadataFrame {
    pub attendee_states: Vec<AudioAttendeeState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioStreamIdInfo {
    pub audio_stream_id: u32,
    pub attendee_id: Option<String>,
    pub muted: Option<bool>,
    pub external_user_id: Option<String>,
    pub dropped: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioStreamIdInfoFrame {
    pub streams: Vec<AudioStreamIdInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPongFrame {
    pub ping_pong_type: PingPongType,
    pub ping_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioStatusFrame {
    pub audio_status: Option<u32>,
}

// ============================================================================
// METRICS / DATA / VIDEO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metric {
    pub metric_type: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamMetricFrame {
    pub stream_id: u32,
    pub group_id: u32,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientMetricFrame {
    pub global_metrics: Vec<Metric>,
    pub stream_metric_frames: Vec<StreamMetricFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataMessagePayload {
    pub topic: String,
    pub data: Bytes,
    pub lifetime_ms: Option<u32>,
    pub sender_attendee_id: Option<String>,
    pub ingest_time_ns: Option<u64>,
    pub sender_external_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataMessageFrame {
    pub messages: Vec<DataMessagePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteVideoUpdateFrame {
    pub added_or_updated_video_subscriptions: Vec<VideoSubscriptionConfiguration>,
    pub removed_video_subscription_mids: Vec<String>,
}

// ============================================================================
// PRIMARY MEETING / NOTIFICATION
// ============================================================================

/// Credentials used to promote into a primary meeting
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeetingSessionCredentials {
    pub attendee_id: String,
    pub external_user_id: String,
    pub join_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimaryMeetingJoinFrame {
    pub credentials: MeetingSessionCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimaryMeetingJoinAckFrame {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimaryMeetingLeaveFrame {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFrame {
    pub level: NotificationLevel,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_codes() {
        assert_eq!(MessageType::Join.as_u8(), 1);
        assert_eq!(MessageType::PingPong.as_u8(), 19);
        assert_eq!(MessageType::Notification.as_u8(), 34);
        assert_eq!(MessageType::from_u8(24), Some(MessageType::RemoteVideoUpdate));
        assert_eq!(MessageType::from_u8(6), None);
    }

    #[test]
    fn test_frame_reports_its_type() {
        let frame = SignalFrame::Pause(PauseResumeFrame::default());
        assert_eq!(frame.message_type(), MessageType::Pause);
        let frame = SignalFrame::Resume(PauseResumeFrame::default());
        assert_eq!(frame.message_type(), MessageType::Resume);
    }

    #[test]
    fn test_quality_preference_mapping() {
        assert_eq!(
            VideoQualityAdaptationPreference::from_name("maintainFramerate"),
            VideoQualityAdaptationPreference::MaintainFramerate
        );
        assert_eq!(
            VideoQualityAdaptationPreference::from_name("maintainResolution"),
            VideoQualityAdaptationPreference::MaintainResolution
        );
        assert_eq!(
            VideoQualityAdaptationPreference::from_name("whatever"),
            VideoQualityAdaptationPreference::Balanced
        );
    }
}
