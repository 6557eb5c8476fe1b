//! Framing tests for meetlink core

use bytes::Bytes;
use meetlink_core::frame::{Frame, HEADER_SIZE};
use meetlink_core::{
    codec, time, LeaveFrame, PingPongFrame, PingPongType, SignalFrame, SignalMessage,
    FRAME_TYPE_RTC,
};

#[test]
fn test_encoded_message_starts_with_frame_type() {
    let msg = SignalMessage::new(SignalFrame::Leave(LeaveFrame {}));
    let encoded = codec::encode(&msg).unwrap();

    assert_eq!(encoded[0], FRAME_TYPE_RTC);
    let payload = codec::encode_message(&msg).unwrap();
    assert_eq!(encoded.len(), payload.len() + HEADER_SIZE);
    assert_eq!(&encoded[HEADER_SIZE..], &payload[..]);
}

#[test]
fn test_legacy_frame_type_is_decoded() {
    let msg = SignalMessage::new(SignalFrame::PingPong(PingPongFrame {
        ping_pong_type: PingPongType::Pong,
        ping_id: 42,
    }));
    let payload = codec::encode_message(&msg).unwrap();
    let mut legacy = vec![0x02];
    legacy.extend_from_slice(&payload);

    let decoded = codec::decode(&Bytes::from(legacy)).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_unexpected_frame_type_is_still_decoded() {
    let msg = SignalMessage::new(SignalFrame::Leave(LeaveFrame {}));
    let frame = Frame {
        frame_type: 0x7F,
        payload: codec::encode_message(&msg).unwrap(),
    };

    let decoded = codec::decode(&frame.encode()).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_timestamp_is_not_earlier_than_stamping_time() {
    let before = time::now_ms();
    let msg = SignalMessage::new(SignalFrame::Leave(LeaveFrame {})).with_timestamp(time::now_ms());
    let decoded = codec::decode(&codec::encode(&msg).unwrap()).unwrap();

    assert!(decoded.timestamp_ms.unwrap() >= before);
}
