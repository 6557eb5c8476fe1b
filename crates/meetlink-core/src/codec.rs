//! meetlink Binary Codec
//!
//! Compact big-endian encoding for every [`SignalFrame`] variant. Frame
//! type byte, message type codes and enum values follow the conferencing
//! service's numbering; the body layout is meetlink's own and is not
//! protobuf, so peers must speak this format.
//!
//! Message layout:
//! ```text
//! [message type u8][flags u8][timestamp u64]?[error]?[body]
//! flags: 0x01 timestamp present, 0x02 error present
//! ```
//!
//! Short strings carry a u16 length prefix, SDP text and binary blobs a u32
//! prefix, lists a u16 count. Optional fields are announced in a per-frame
//! presence mask. Every read is bounds-checked so a corrupt frame surfaces as
//! an [`Error`] instead of a panic.

use crate::frame::Frame;
use crate::types::*;
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Envelope flag bits
pub mod flag {
    pub const TIMESTAMP: u8 = 0x01;
    pub const ERROR: u8 = 0x02;
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Encode a message payload (without the frame type byte)
pub fn encode_message(message: &SignalMessage) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(estimate_message_size(message));
    encode_message_to_buf(&mut buf, message)?;
    Ok(buf.freeze())
}

/// Decode a message payload (without the frame type byte)
pub fn decode_message(bytes: &[u8]) -> Result<SignalMessage> {
    if bytes.is_empty() {
        return Err(Error::BufferTooSmall { needed: 1, have: 0 });
    }
    let mut buf = bytes;
    decode_message_from_buf(&mut buf)
}

/// Encode a message into a complete transport frame
pub fn encode(message: &SignalMessage) -> Result<Bytes> {
    let payload = encode_message(message)?;
    Ok(Frame::new(payload).encode())
}

/// Decode a complete transport frame
pub fn decode(bytes: &Bytes) -> Result<SignalMessage> {
    let frame = Frame::decode(bytes)?;
    decode_message(&frame.payload)
}

fn estimate_message_size(message: &SignalMessage) -> usize {
    match &message.frame {
        SignalFrame::Subscribe(m) => {
            64 + m.sdp_offer.as_ref().map(|s| s.len()).unwrap_or(0)
                + m.send_streams.len() * 48
        }
        SignalFrame::SubscribeAck(m) => 64 + m.sdp_answer.as_ref().map(|s| s.len()).unwrap_or(0),
        SignalFrame::PingPong(_) => 16,
        _ => 128,
    }
}

// ============================================================================
// BINARY ENCODING
// ============================================================================

fn encode_message_to_buf(buf: &mut BytesMut, msg: &SignalMessage) -> Result<()> {
    buf.put_u8(msg.frame.message_type().as_u8());

    let mut flags = 0u8;
    if msg.timestamp_ms.is_some() {
        flags |= flag::TIMESTAMP;
    }
    if msg.error.is_some() {
        flags |= flag::ERROR;
    }
    buf.put_u8(flags);

    if let Some(ts) = msg.timestamp_ms {
        buf.put_u64(ts);
    }
    if let Some(ref error) = msg.error {
        buf.put_u32(error.status);
        encode_string(buf, &error.description)?;
    }

    match &msg.frame {
        SignalFrame::Join(m) => encode_join(buf, m),
        SignalFrame::JoinAck(m) => encode_join_ack(buf, m),
        SignalFrame::Subscribe(m) => encode_subscribe(buf, m),
        SignalFrame::SubscribeAck(m) => encode_subscribe_ack(buf, m),
        SignalFrame::Index(m) => encode_index(buf, m),
        SignalFrame::Pause(m) | SignalFrame::Resume(m) => encode_pause_resume(buf, m),
        SignalFrame::Leave(_)
        | SignalFrame::LeaveAck(_)
        | SignalFrame::PrimaryMeetingJoinAck(_)
        | SignalFrame::PrimaryMeetingLeave(_) => Ok(()),
        SignalFrame::Bitrates(m) => encode_bitrates(buf, m),
        SignalFrame::AudioControl(m) => {
            buf.put_u8(m.muted as u8);
            Ok(())
        }
        SignalFrame::AudioMetadata(m) => encode_audio_metadata(buf, m),
        SignalFrame::AudioStreamIdInfo(m) => encode_audio_stream_id_info(buf, m),
        SignalFrame::PingPong(m) => {
            buf.put_u8(m.ping_pong_type.as_u8());
            buf.put_u32(m.ping_id);
            Ok(())
        }
        SignalFrame::AudioStatus(m) => {
            encode_opt_u32(buf, m.audio_status);
            Ok(())
        }
        SignalFrame::ClientMetric(m) => encode_client_metric(buf, m),
        SignalFrame::DataMessage(m) => encode_data_message(buf, m),
        SignalFrame::RemoteVideoUpdate(m) => encode_remote_video_update(buf, m),
        SignalFrame::PrimaryMeetingJoin(m) => {
            encode_string(buf, &m.credentials.attendee_id)?;
            encode_string(buf, &m.credentials.external_user_id)?;
            encode_string(buf, &m.credentials.join_token)
        }
        SignalFrame::Notification(m) => {
            buf.put_u8(m.level.as_u8());
            encode_string(buf, &m.message)
        }
    }
}

/// JOIN (1)
/// Mask: [has_ssna:1][disable_keyframe:1][all_temporal:1][compressed_sdp:1]
fn encode_join(buf: &mut BytesMut, msg: &JoinFrame) -> Result<()> {
    buf.put_u32(msg.protocol_version);
    buf.put_u32(msg.max_num_of_videos);
    buf.put_u32(msg.flags);
    encode_client_details(buf, &msg.client_details)?;
    buf.put_u64(msg.audio_session_id);

    let mut mask = 0u8;
    if msg.wants_compressed_sdp {
        mask |= 0x01;
    }
    if msg.wants_all_temporal_layers_in_index {
        mask |= 0x02;
    }
    if msg.disable_periodic_keyframe_request_on_content_sender {
        mask |= 0x04;
    }
    if msg.server_side_network_adaption.is_some() {
        mask |= 0x08;
    }
    buf.put_u8(mask);

    if let Some(adaption) = msg.server_side_network_adaption {
        buf.put_u8(adaption.as_u8());
    }
    encode_list(buf, &msg.supported_server_side_network_adaptions, |buf, a| {
        buf.put_u8(a.as_u8());
        Ok(())
    })
}

fn encode_client_details(buf: &mut BytesMut, details: &ClientDetails) -> Result<()> {
    encode_string(buf, &details.app_name)?;
    encode_string(buf, &details.app_version)?;
    encode_string(buf, &details.device_model)?;
    encode_string(buf, &details.device_make)?;
    encode_string(buf, &details.platform_name)?;
    encode_string(buf, &details.platform_version)?;
    encode_string(buf, &details.client_source)?;
    encode_string(buf, &details.sdk_version)?;
    encode_string(buf, &details.client_utc_offset)
}

/// JOIN_ACK (2)
fn encode_join_ack(buf: &mut BytesMut, msg: &JoinAckFrame) -> Result<()> {
    let mut mask = 0u8;
    if msg.turn_credentials.is_some() {
        mask |= 0x01;
    }
    if msg.video_subscription_limit.is_some() {
        mask |= 0x02;
    }
    if msg.wants_compressed_sdp {
        mask |= 0x04;
    }
    if msg.default_server_side_network_adaption.is_some() {
        mask |= 0x08;
    }
    buf.put_u8(mask);

    if let Some(ref turn) = msg.turn_credentials {
        encode_string(buf, &turn.username)?;
        encode_string(buf, &turn.password)?;
        buf.put_u32(turn.ttl);
        encode_list(buf, &turn.uris, |buf, uri| encode_string(buf, uri))?;
    }
    if let Some(limit) = msg.video_subscription_limit {
        buf.put_u32(limit);
    }
    if let Some(adaption) = msg.default_server_side_network_adaption {
        buf.put_u8(adaption.as_u8());
    }
    Ok(())
}

/// SUBSCRIBE (3)
/// Mask: [compressed:1][muted:1][checkin:1][sdp_offer:1]
fn encode_subscribe(buf: &mut BytesMut, msg: &SubscribeFrame) -> Result<()> {
    buf.put_u8(msg.duplex.as_u8());
    encode_list(buf, &msg.send_streams, encode_stream_descriptor)?;
    encode_list(buf, &msg.receive_stream_ids, |buf, id| {
        buf.put_u32(*id);
        Ok(())
    })?;

    let mut mask = 0u8;
    if msg.sdp_offer.is_some() {
        mask |= 0x01;
    }
    if msg.audio_checkin {
        mask |= 0x02;
    }
    if msg.audio_muted {
        mask |= 0x04;
    }
    if msg.compressed_sdp_offer.is_some() {
        mask |= 0x08;
    }
    buf.put_u8(mask);

    if let Some(ref sdp) = msg.sdp_offer {
        encode_long_string(buf, sdp)?;
    }
    encode_string(buf, &msg.audio_host)?;
    if let Some(ref compressed) = msg.compressed_sdp_offer {
        encode_blob(buf, compressed)?;
    }
    encode_list(
        buf,
        &msg.video_subscription_configuration,
        encode_video_subscription,
    )
}

fn encode_stream_descriptor(buf: &mut BytesMut, s: &StreamDescriptor) -> Result<()> {
    buf.put_u32(s.stream_id);
    buf.put_u32(s.framerate);
    buf.put_u32(s.max_bitrate_kbps);
    encode_string(buf, &s.track_label)?;
    buf.put_u32(s.group_id);
    buf.put_u32(s.avg_bitrate_bps);
    encode_string(buf, &s.attendee_id)?;
    buf.put_u8(s.media_type.as_u8());
    encode_string(buf, &s.external_user_id)?;
    buf.put_u32(s.width);
    buf.put_u32(s.height);
    Ok(())
}

fn encode_video_subscription(
    buf: &mut BytesMut,
    c: &VideoSubscriptionConfiguration,
) -> Result<()> {
    encode_string(buf, &c.mid)?;
    encode_string(buf, &c.attendee_id)?;
    buf.put_u32(c.stream_id);
    buf.put_u32(c.priority);
    buf.put_u32(c.target_bitrate_kbps);
    buf.put_u32(c.group_id);
    buf.put_u8(c.quality_adaptation_preference.as_u8());
    Ok(())
}

/// SUBSCRIBE_ACK (4)
fn encode_subscribe_ack(buf: &mut BytesMut, msg: &SubscribeAckFrame) -> Result<()> {
    buf.put_u8(msg.duplex.as_u8());
    encode_list(buf, &msg.allocations, |buf, a| {
        encode_string(buf, &a.track_label)?;
        buf.put_u32(a.stream_id);
        buf.put_u32(a.group_id);
        Ok(())
    })?;

    let mut mask = 0u8;
    if msg.sdp_answer.is_some() {
        mask |= 0x01;
    }
    if msg.compressed_sdp_answer.is_some() {
        mask |= 0x02;
    }
    buf.put_u8(mask);

    if let Some(ref sdp) = msg.sdp_answer {
        encode_long_string(buf, sdp)?;
    }
    encode_list(buf, &msg.tracks, |buf, t| {
        buf.put_u32(t.stream_id);
        buf.put_u32(t.ssrc);
        encode_string(buf, &t.track_label)
    })?;
    if let Some(ref compressed) = msg.compressed_sdp_answer {
        encode_blob(buf, compressed)?;
    }
    Ok(())
}

/// INDEX (5)
fn encode_index(buf: &mut BytesMut, msg: &IndexFrame) -> Result<()> {
    let mut mask = 0u8;
    if msg.at_capacity {
        mask |= 0x01;
    }
    if msg.num_participants.is_some() {
        mask |= 0x02;
    }
    buf.put_u8(mask);

    encode_list(buf, &msg.sources, encode_stream_descriptor)?;
    encode_list(buf, &msg.paused_at_source_ids, |buf, id| {
        buf.put_u32(*id);
        Ok(())
    })?;
    if let Some(n) = msg.num_participants {
        buf.put_u32(n);
    }
    Ok(())
}

/// PAUSE (7) / RESUME (8)
fn encode_pause_resume(buf: &mut BytesMut, msg: &PauseResumeFrame) -> Result<()> {
    encode_list(buf, &msg.stream_ids, |buf, id| {
        buf.put_u32(*id);
        Ok(())
    })?;
    encode_list(buf, &msg.group_ids, |buf, id| {
        buf.put_u32(*id);
        Ok(())
    })
}

/// BITRATES (13)
fn encode_bitrates(buf: &mut BytesMut, msg: &BitrateFrame) -> Result<()> {
    encode_list(buf, &msg.bitrates, |buf, b| {
        buf.put_u32(b.source_stream_id);
        buf.put_u32(b.avg_bitrate_bps);
        Ok(())
    })?;
    encode_opt_u32(buf, msg.server_available_outgoing_bitrate);
    Ok(())
}

/// AUDIO_METADATA (17)
/// Mask: [signal:1][muted_value:1][muted_present:1][volume:1]
fn encode_audio_metadata(buf: &mut BytesMut, msg: &AudioMetadataFrame) -> Result<()> {
    encode_list(buf, &msg.attendee_states, |buf, s| {
        buf.put_u32(s.audio_stream_id);
        let mut mask = 0u8;
        if s.volume.is_some() {
            mask |= 0x01;
        }
        mask |= opt_bool_bits(s.muted, 0x02, 0x04);
        if s.signal_strength.is_some() {
            mask |= 0x08;
        }
        buf.put_u8(mask);
        if let Some(v) = s.volume {
            buf.put_u32(v);
        }
        if let Some(v) = s.signal_strength {
            buf.put_u32(v);
        }
        Ok(())
    })
}

/// AUDIO_STREAM_ID_INFO (18)
fn encode_audio_stream_id_info(buf: &mut BytesMut, msg: &AudioStreamIdInfoFrame) -> Result<()> {
    encode_list(buf, &msg.streams, |buf, s| {
        buf.put_u32(s.audio_stream_id);
        let mut mask = 0u8;
        if s.attendee_id.is_some() {
            mask |= 0x01;
        }
        mask |= opt_bool_bits(s.muted, 0x02, 0x04);
        if s.external_user_id.is_some() {
            mask |= 0x08;
        }
        mask |= opt_bool_bits(s.dropped, 0x10, 0x20);
        buf.put_u8(mask);
        if let Some(ref id) = s.attendee_id {
            encode_string(buf, id)?;
        }
        if let Some(ref id) = s.external_user_id {
            encode_string(buf, id)?;
        }
        Ok(())
    })
}

/// CLIENT_METRIC (21)
fn encode_client_metric(buf: &mut BytesMut, msg: &ClientMetricFrame) -> Result<()> {
    encode_list(buf, &msg.global_metrics, encode_metric)?;
    encode_list(buf, &msg.stream_metric_frames, |buf, f| {
        buf.put_u32(f.stream_id);
        buf.put_u32(f.group_id);
        encode_list(buf, &f.metrics, encode_metric)
    })
}

fn encode_metric(buf: &mut BytesMut, m: &Metric) -> Result<()> {
    buf.put_u32(m.metric_type);
    buf.put_f64(m.value);
    Ok(())
}

/// DATA_MESSAGE (22)
fn encode_data_message(buf: &mut BytesMut, msg: &DataMessageFrame) -> Result<()> {
    encode_list(buf, &msg.messages, |buf, m| {
        encode_string(buf, &m.topic)?;
        encode_blob(buf, &m.data)?;
        let mut mask = 0u8;
        if m.lifetime_ms.is_some() {
            mask |= 0x01;
        }
        if m.sender_attendee_id.is_some() {
            mask |= 0x02;
        }
        if m.ingest_time_ns.is_some() {
            mask |= 0x04;
        }
        if m.sender_external_user_id.is_some() {
            mask |= 0x08;
        }
        buf.put_u8(mask);
        if let Some(v) = m.lifetime_ms {
            buf.put_u32(v);
        }
        if let Some(ref v) = m.sender_attendee_id {
            encode_string(buf, v)?;
        }
        if let Some(v) = m.ingest_time_ns {
            buf.put_u64(v);
        }
        if let Some(ref v) = m.sender_external_user_id {
            encode_string(buf, v)?;
        }
        Ok(())
    })
}

/// REMOTE_VIDEO_UPDATE (24)
fn encode_remote_video_update(buf: &mut BytesMut, msg: &RemoteVideoUpdateFrame) -> Result<()> {
    encode_list(
        buf,
        &msg.added_or_updated_video_subscriptions,
        encode_video_subscription,
    )?;
    encode_list(buf, &msg.removed_video_subscription_mids, |buf, mid| {
        encode_string(buf, mid)
    })
}

// ============================================================================
// ENCODING HELPERS
// ============================================================================

fn encode_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(Error::PayloadTooLarge(bytes.len()));
    }
    buf.put_u16(bytes.len() as u16);
    buf.extend_from_slice(bytes);
    Ok(())
}

fn encode_long_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    encode_blob(buf, s.as_bytes())
}

fn encode_blob(buf: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    if bytes.len() > u32::MAX as usize {
        return Err(Error::PayloadTooLarge(bytes.len()));
    }
    buf.put_u32(bytes.len() as u32);
    buf.extend_from_slice(bytes);
    Ok(())
}

fn encode_list<T, F>(buf: &mut BytesMut, items: &[T], mut f: F) -> Result<()>
where
    F: FnMut(&mut BytesMut, &T) -> Result<()>,
{
    if items.len() > u16::MAX as usize {
        return Err(Error::PayloadTooLarge(items.len()));
    }
    buf.put_u16(items.len() as u16);
    for item in items {
        f(buf, item)?;
    }
    Ok(())
}

fn encode_opt_u32(buf: &mut BytesMut, value: Option<u32>) {
    match value {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u32(v);
        }
        None => buf.put_u8(0),
    }
}

#[inline]
fn opt_bool_bits(value: Option<bool>, present: u8, set: u8) -> u8 {
    match value {
        Some(true) => present | set,
        Some(false) => present,
        None => 0,
    }
}

// ============================================================================
// BINARY DECODING
// ============================================================================

fn decode_message_from_buf(buf: &mut &[u8]) -> Result<SignalMessage> {
    let code = get_u8(buf)?;
    let message_type = MessageType::from_u8(code).ok_or(Error::UnknownMessageType(code))?;
    let flags = get_u8(buf)?;

    let timestamp_ms = if flags & flag::TIMESTAMP != 0 {
        Some(get_u64(buf)?)
    } else {
        None
    };
    let error = if flags & flag::ERROR != 0 {
        Some(ErrorFrame {
            status: get_u32(buf)?,
            description: decode_string(buf)?,
        })
    } else {
        None
    };

    let frame = match message_type {
        MessageType::Join => SignalFrame::Join(decode_join(buf)?),
        MessageType::JoinAck => SignalFrame::JoinAck(decode_join_ack(buf)?),
        MessageType::Subscribe => SignalFrame::Subscribe(decode_subscribe(buf)?),
        MessageType::SubscribeAck => SignalFrame::SubscribeAck(decode_subscribe_ack(buf)?),
        MessageType::Index => SignalFrame::Index(decode_index(buf)?),
        MessageType::Pause => SignalFrame::Pause(decode_pause_resume(buf)?),
        MessageType::Resume => SignalFrame::Resume(decode_pause_resume(buf)?),
        MessageType::Leave => SignalFrame::Leave(LeaveFrame {}),
        MessageType::LeaveAck => SignalFrame::LeaveAck(LeaveAckFrame {}),
        MessageType::Bitrates => SignalFrame::Bitrates(decode_bitrates(buf)?),
        MessageType::AudioControl => SignalFrame::AudioControl(AudioControlFrame {
            muted: get_u8(buf)? != 0,
        }),
        MessageType::AudioMetadata => SignalFrame::AudioMetadata(decode_audio_metadata(buf)?),
        MessageType::AudioStreamIdInfo => {
            SignalFrame::AudioStreamIdInfo(decode_audio_stream_id_info(buf)?)
        }
        MessageType::PingPong => {
            let raw = get_u8(buf)?;
            let ping_pong_type = PingPongType::from_u8(raw).ok_or(Error::InvalidEnumValue {
                field: "ping_pong_type",
                value: raw as u32,
            })?;
            SignalFrame::PingPong(PingPongFrame {
                ping_pong_type,
                ping_id: get_u32(buf)?,
            })
        }
        MessageType::AudioStatus => SignalFrame::AudioStatus(AudioStatusFrame {
            audio_status: decode_opt_u32(buf)?,
        }),
        MessageType::ClientMetric => SignalFrame::ClientMetric(decode_client_metric(buf)?),
        MessageType::DataMessage => SignalFrame::DataMessage(decode_data_message(buf)?),
        MessageType::RemoteVideoUpdate => {
            SignalFrame::RemoteVideoUpdate(decode_remote_video_update(buf)?)
        }
        MessageType::PrimaryMeetingJoin => {
            SignalFrame::PrimaryMeetingJoin(PrimaryMeetingJoinFrame {
                credentials: MeetingSessionCredentials {
                    attendee_id: decode_string(buf)?,
                    external_user_id: decode_string(buf)?,
                    join_token: decode_string(buf)?,
                },
            })
        }
        MessageType::PrimaryMeetingJoinAck => {
            SignalFrame::PrimaryMeetingJoinAck(PrimaryMeetingJoinAckFrame {})
        }
        MessageType::PrimaryMeetingLeave => {
            SignalFrame::PrimaryMeetingLeave(PrimaryMeetingLeaveFrame {})
        }
        MessageType::Notification => {
            let raw = get_u8(buf)?;
            let level = NotificationLevel::from_u8(raw).ok_or(Error::InvalidEnumValue {
                field: "notification_level",
                value: raw as u32,
            })?;
            SignalFrame::Notification(NotificationFrame {
                level,
                message: decode_string(buf)?,
            })
        }
    };

    Ok(SignalMessage {
        timestamp_ms,
        frame,
        error,
    })
}

fn decode_join(buf: &mut &[u8]) -> Result<JoinFrame> {
    let protocol_version = get_u32(buf)?;
    let max_num_of_videos = get_u32(buf)?;
    let flags = get_u32(buf)?;
    let client_details = decode_client_details(buf)?;
    let audio_session_id = get_u64(buf)?;
    let mask = get_u8(buf)?;

    let server_side_network_adaption = if mask & 0x08 != 0 {
        Some(decode_adaption(buf)?)
    } else {
        None
    };
    let supported_server_side_network_adaptions = decode_list(buf, decode_adaption)?;

    Ok(JoinFrame {
        protocol_version,
        max_num_of_videos,
        flags,
        client_details,
        audio_session_id,
        wants_compressed_sdp: mask & 0x01 != 0,
        server_side_network_adaption,
        supported_server_side_network_adaptions,
        wants_all_temporal_layers_in_index: mask & 0x02 != 0,
        disable_periodic_keyframe_request_on_content_sender: mask & 0x04 != 0,
    })
}

fn decode_client_details(buf: &mut &[u8]) -> Result<ClientDetails> {
    Ok(ClientDetails {
        app_name: decode_string(buf)?,
        app_version: decode_string(buf)?,
        device_model: decode_string(buf)?,
        device_make: decode_string(buf)?,
        platform_name: decode_string(buf)?,
        platform_version: decode_string(buf)?,
        client_source: decode_string(buf)?,
        sdk_version: decode_string(buf)?,
        client_utc_offset: decode_string(buf)?,
    })
}

fn decode_join_ack(buf: &mut &[u8]) -> Result<JoinAckFrame> {
    let mask = get_u8(buf)?;
    let turn_credentials = if mask & 0x01 != 0 {
        Some(TurnCredentials {
            username: decode_string(buf)?,
            password: decode_string(buf)?,
            ttl: get_u32(buf)?,
            uris: decode_list(buf, decode_string)?,
        })
    } else {
        None
    };
    let video_subscription_limit = if mask & 0x02 != 0 {
        Some(get_u32(buf)?)
    } else {
        None
    };
    let default_server_side_network_adaption = if mask & 0x08 != 0 {
        Some(decode_adaption(buf)?)
    } else {
        None
    };

    Ok(JoinAckFrame {
        turn_credentials,
        video_subscription_limit,
        wants_compressed_sdp: mask & 0x04 != 0,
        default_server_side_network_adaption,
    })
}

fn decode_subscribe(buf: &mut &[u8]) -> Result<SubscribeFrame> {
    let duplex = decode_duplex(buf)?;
    let send_streams = decode_list(buf, decode_stream_descriptor)?;
    let receive_stream_ids = decode_list(buf, get_u32)?;
    let mask = get_u8(buf)?;

    let sdp_offer = if mask & 0x01 != 0 {
        Some(decode_long_string(buf)?)
    } else {
        None
    };
    let audio_host = decode_string(buf)?;
    let compressed_sdp_offer = if mask & 0x08 != 0 {
        Some(decode_blob(buf)?)
    } else {
        None
    };
    let video_subscription_configuration = decode_list(buf, decode_video_subscription)?;

    Ok(SubscribeFrame {
        duplex,
        send_streams,
        receive_stream_ids,
        sdp_offer,
        audio_host,
        audio_checkin: mask & 0x02 != 0,
        audio_muted: mask & 0x04 != 0,
        compressed_sdp_offer,
        video_subscription_configuration,
    })
}

fn decode_stream_descriptor(buf: &mut &[u8]) -> Result<StreamDescriptor> {
    let stream_id = get_u32(buf)?;
    let framerate = get_u32(buf)?;
    let max_bitrate_kbps = get_u32(buf)?;
    let track_label = decode_string(buf)?;
    let group_id = get_u32(buf)?;
    let avg_bitrate_bps = get_u32(buf)?;
    let attendee_id = decode_string(buf)?;
    let raw = get_u8(buf)?;
    let media_type = StreamMediaType::from_u8(raw).ok_or(Error::InvalidEnumValue {
        field: "media_type",
        value: raw as u32,
    })?;
    let external_user_id = decode_string(buf)?;
    let width = get_u32(buf)?;
    let height = get_u32(buf)?;

    Ok(StreamDescriptor {
        stream_id,
        framerate,
        max_bitrate_kbps,
        track_label,
        group_id,
        avg_bitrate_bps,
        attendee_id,
        media_type,
        external_user_id,
        width,
        height,
    })
}

fn decode_video_subscription(buf: &mut &[u8]) -> Result<VideoSubscriptionConfiguration> {
    let mid = decode_string(buf)?;
    let attendee_id = decode_string(buf)?;
    let stream_id = get_u32(buf)?;
    let priority = get_u32(buf)?;
    let target_bitrate_kbps = get_u32(buf)?;
    let group_id = get_u32(buf)?;
    let raw = get_u8(buf)?;
    let quality_adaptation_preference = VideoQualityAdaptationPreference::from_u8(raw).ok_or(
        Error::InvalidEnumValue {
            field: "quality_adaptation_preference",
            value: raw as u32,
        },
    )?;

    Ok(VideoSubscriptionConfiguration {
        mid,
        attendee_id,
        stream_id,
        priority,
        target_bitrate_kbps,
        group_id,
        quality_adaptation_preference,
    })
}

fn decode_subscribe_ack(buf: &mut &[u8]) -> Result<SubscribeAckFrame> {
    let duplex = decode_duplex(buf)?;
    let allocations = decode_list(buf, |buf| {
        Ok(StreamAllocation {
            track_label: decode_string(buf)?,
            stream_id: get_u32(buf)?,
            group_id: get_u32(buf)?,
        })
    })?;
    let mask = get_u8(buf)?;
    let sdp_answer = if mask & 0x01 != 0 {
        Some(decode_long_string(buf)?)
    } else {
        None
    };
    let tracks = decode_list(buf, |buf| {
        Ok(TrackMapping {
            stream_id: get_u32(buf)?,
            ssrc: get_u32(buf)?,
            track_label: decode_string(buf)?,
        })
    })?;
    let compressed_sdp_answer = if mask & 0x02 != 0 {
        Some(decode_blob(buf)?)
    } else {
        None
    };

    Ok(SubscribeAckFrame {
        duplex,
        allocations,
        sdp_answer,
        tracks,
        compressed_sdp_answer,
    })
}

fn decode_index(buf: &mut &[u8]) -> Result<IndexFrame> {
    let mask = get_u8(buf)?;
    let sources = decode_list(buf, decode_stream_descriptor)?;
    let paused_at_source_ids = decode_list(buf, get_u32)?;
    let num_participants = if mask & 0x02 != 0 {
        Some(get_u32(buf)?)
    } else {
        None
    };

    Ok(IndexFrame {
        at_capacity: mask & 0x01 != 0,
        sources,
        paused_at_source_ids,
        num_participants,
    })
}

fn decode_pause_resume(buf: &mut &[u8]) -> Result<PauseResumeFrame> {
    Ok(PauseResumeFrame {
        stream_ids: decode_list(buf, get_u32)?,
        group_ids: decode_list(buf, get_u32)?,
    })
}

fn decode_bitrates(buf: &mut &[u8]) -> Result<BitrateFrame> {
    let bitrates = decode_list(buf, |buf| {
        Ok(Bitrate {
            source_stream_id: get_u32(buf)?,
            avg_bitrate_bps: get_u32(buf)?,
        })
    })?;
    Ok(BitrateFrame {
        bitrates,
        server_available_outgoing_bitrate: decode_opt_u32(buf)?,
    })
}

fn decode_audio_metadata(buf: &mut &[u8]) -> Result<AudioMetadataFrame> {
    let attendee_states = decode_list(buf, |buf| {
        let audio_stream_id = get_u32(buf)?;
        let mask = get_u8(buf)?;
        let volume = if mask & 0x01 != 0 {
            Some(get_u32(buf)?)
        } else {
            None
        };
        let signal_strength = if mask & 0x08 != 0 {
            Some(get_u32(buf)?)
        } else {
            None
        };
        Ok(AudioAttendeeState {
            audio_stream_id,
            volume,
            muted: bool_from_bits(mask, 0x02, 0x04),
            signal_strength,
        })
    })?;
    Ok(AudioMetadataFrame { attendee_states })
}

fn decode_audio_stream_id_info(buf: &mut &[u8]) -> Result<AudioStreamIdInfoFrame> {
    let streams = decode_list(buf, |buf| {
        let audio_stream_id = get_u32(buf)?;
        let mask = get_u8(buf)?;
        let attendee_id = if mask & 0x01 != 0 {
            Some(decode_string(buf)?)
        } else {
            None
        };
        let external_user_id = if mask & 0x08 != 0 {
            Some(decode_string(buf)?)
        } else {
            None
        };
        Ok(AudioStreamIdInfo {
            audio_stream_id,
            attendee_id,
            muted: bool_from_bits(mask, 0x02, 0x04),
            external_user_id,
            dropped: bool_from_bits(mask, 0x10, 0x20),
        })
    })?;
    Ok(AudioStreamIdInfoFrame { streams })
}

fn decode_client_metric(buf: &mut &[u8]) -> Result<ClientMetricFrame> {
    let global_metrics = decode_list(buf, decode_metric)?;
    let stream_metric_frames = decode_list(buf, |buf| {
        Ok(StreamMetricFrame {
            stream_id: get_u32(buf)?,
            group_id: get_u32(buf)?,
            metrics: decode_list(buf, decode_metric)?,
        })
    })?;
    Ok(ClientMetricFrame {
        global_metrics,
        stream_metric_frames,
    })
}

fn decode_metric(buf: &mut &[u8]) -> Result<Metric> {
    Ok(Metric {
        metric_type: get_u32(buf)?,
        value: get_f64(buf)?,
    })
}

fn decode_data_message(buf: &mut &[u8]) -> Result<DataMessageFrame> {
    let messages = decode_list(buf, |buf| {
        let topic = decode_string(buf)?;
        let data = decode_blob(buf)?;
        let mask = get_u8(buf)?;
        let lifetime_ms = if mask & 0x01 != 0 {
            Some(get_u32(buf)?)
        } else {
            None
        };
        let sender_attendee_id = if mask & 0x02 != 0 {
            Some(decode_string(buf)?)
        } else {
            None
        };
        let ingest_time_ns = if mask & 0x04 != 0 {
            Some(get_u64(buf)?)
        } else {
            None
        };
        let sender_external_user_id = if mask & 0x08 != 0 {
            Some(decode_string(buf)?)
        } else {
            None
        };
        Ok(DataMessagePayload {
            topic,
            data,
            lifetime_ms,
            sender_attendee_id,
            ingest_time_ns,
            sender_external_user_id,
        })
    })?;
    Ok(DataMessageFrame { messages })
}

fn decode_remote_video_update(buf: &mut &[u8]) -> Result<RemoteVideoUpdateFrame> {
    Ok(RemoteVideoUpdateFrame {
        added_or_updated_video_subscriptions: decode_list(buf, decode_video_subscription)?,
        removed_video_subscription_mids: decode_list(buf, decode_string)?,
    })
}

fn decode_duplex(buf: &mut &[u8]) -> Result<StreamServiceType> {
    let raw = get_u8(buf)?;
    StreamServiceType::from_u8(raw).ok_or(Error::InvalidEnumValue {
        field: "duplex",
        value: raw as u32,
    })
}

fn decode_adaption(buf: &mut &[u8]) -> Result<ServerSideNetworkAdaption> {
    let raw = get_u8(buf)?;
    ServerSideNetworkAdaption::from_u8(raw).ok_or(Error::InvalidEnumValue {
        field: "server_side_network_adaption",
        value: raw as u32,
    })
}

// ============================================================================
// DECODING HELPERS
// ============================================================================

#[inline]
fn ensure(buf: &[u8], needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            have: buf.remaining(),
        });
    }
    Ok(())
}

fn get_u8(buf: &mut &[u8]) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut &[u8]) -> Result<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

fn get_u64(buf: &mut &[u8]) -> Result<u64> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

fn get_f64(buf: &mut &[u8]) -> Result<f64> {
    ensure(buf, 8)?;
    Ok(buf.get_f64())
}

fn decode_opt_u32(buf: &mut &[u8]) -> Result<Option<u32>> {
    if get_u8(buf)? != 0 {
        Ok(Some(get_u32(buf)?))
    } else {
        Ok(None)
    }
}

#[inline]
fn bool_from_bits(mask: u8, present: u8, set: u8) -> Option<bool> {
    if mask & present != 0 {
        Some(mask & set != 0)
    } else {
        None
    }
}

fn decode_string(buf: &mut &[u8]) -> Result<String> {
    ensure(buf, 2)?;
    let len = buf.get_u16() as usize;
    decode_utf8(buf, len)
}

fn decode_long_string(buf: &mut &[u8]) -> Result<String> {
    ensure(buf, 4)?;
    let len = buf.get_u32() as usize;
    decode_utf8(buf, len)
}

fn decode_utf8(buf: &mut &[u8], len: usize) -> Result<String> {
    ensure(buf, len)?;
    let bytes = &buf[..len];
    let s = std::str::from_utf8(bytes)
        .map_err(|e| Error::DecodeError(e.to_string()))?
        .to_string();
    buf.advance(len);
    Ok(s)
}

fn decode_blob(buf: &mut &[u8]) -> Result<Bytes> {
    ensure(buf, 4)?;
    let len = buf.get_u32() as usize;
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

fn decode_list<T, F>(buf: &mut &[u8], mut f: F) -> Result<Vec<T>>
where
    F: FnMut(&mut &[u8]) -> Result<T>,
{
    ensure(buf, 2)?;
    let count = buf.get_u16() as usize;
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(f(buf)?);
    }
    Ok(items)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: SignalFrame) -> SignalMessage {
        let msg = SignalMessage::new(frame).with_timestamp(1_700_000_000_000);
        let encoded = encode(&msg).unwrap();
        assert_eq!(encoded[0], crate::FRAME_TYPE_RTC);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
        decoded
    }

    #[test]
    fn test_ping_pong_roundtrip() {
        let decoded = roundtrip(SignalFrame::PingPong(PingPongFrame {
            ping_pong_type: PingPongType::Pong,
            ping_id: 0xFFFF_FFFF,
        }));
        assert_eq!(decoded.message_type(), MessageType::PingPong);
    }

    #[test]
    fn test_empty_frames_roundtrip() {
        roundtrip(SignalFrame::Leave(LeaveFrame {}));
        roundtrip(SignalFrame::LeaveAck(LeaveAckFrame {}));
        roundtrip(SignalFrame::PrimaryMeetingLeave(PrimaryMeetingLeaveFrame {}));
    }

    #[test]
    fn test_error_envelope_roundtrip() {
        let msg = SignalMessage::new(SignalFrame::JoinAck(JoinAckFrame::default())).with_error(
            ErrorFrame {
                status: 403,
                description: "forbidden".to_string(),
            },
        );
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded.error.unwrap().status, 403);
        assert_eq!(decoded.timestamp_ms, None);
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let msg = SignalMessage::new(SignalFrame::PingPong(PingPongFrame {
            ping_pong_type: PingPongType::Ping,
            ping_id: 7,
        }));
        let encoded = encode(&msg).unwrap();
        let truncated = encoded.slice(..encoded.len() - 2);
        assert!(matches!(
            decode(&truncated),
            Err(Error::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_unknown_message_type() {
        let bytes = Bytes::from_static(&[0x05, 0x63, 0x00]);
        assert_eq!(decode(&bytes), Err(Error::UnknownMessageType(0x63)));
    }

    #[test]
    fn test_invalid_enum_value() {
        // PING_PONG with type 9
        let bytes = Bytes::from_static(&[0x05, 19, 0x00, 9, 0, 0, 0, 1]);
        assert!(matches!(
            decode(&bytes),
            Err(Error::InvalidEnumValue { field: "ping_pong_type", value: 9 })
        ));
    }
}
