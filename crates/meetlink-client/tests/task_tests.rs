//! Negotiation task tests
//!
//! Each task runs against a real `DefaultSignalingClient` over the mock
//! WebSocket; the test plays the server.

use meetlink_client::task::{
    JoinAndReceiveIndexTask, LeaveAndReceiveLeaveAckTask, OpenSignalingConnectionTask,
    PrimaryMeetingStatus, PromoteToPrimaryMeetingTask, SetLocalDescriptionTask,
    SubscribeAndReceiveSubscribeAckTask,
};
use meetlink_client::{
    ClientError, DefaultBrowserBehavior, DefaultSignalingClient, MeetingConfiguration,
    NegotiationContext, SignalingClient, SignalingClientConnectionRequest, Task,
};
use meetlink_core::{
    ErrorFrame, IndexFrame, LeaveAckFrame, MeetingSessionCredentials, PrimaryMeetingJoinAckFrame,
    SignalFrame, SignalMessage, StreamDescriptor, SubscribeAckFrame,
};
use meetlink_sdp::Sdp;
use meetlink_test_utils::{
    wait_for, MockPeerConnection, MockWebSocketAdapter, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const OPUS_OFFER: &str = "v=0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n";

const H264_OFFER: &str = "v=0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 102 103\r\n\
a=sendrecv\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtpmap:102 H264/90000\r\n\
a=fmtp:102 profile-level-id=42e01f\r\n\
a=rtpmap:103 rtx/90000\r\n\
a=fmtp:103 apt=102\r\n";

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    ws: Arc<MockWebSocketAdapter>,
    client: DefaultSignalingClient,
    peer: Arc<MockPeerConnection>,
    context: Arc<NegotiationContext>,
}

fn meeting() -> MeetingConfiguration {
    MeetingConfiguration {
        signaling_url: "wss://signal.test/control/meeting".to_string(),
        join_token: "join-token".to_string(),
        attendee_id: "attendee-1".to_string(),
        audio_host_url: "audio.test:3478".to_string(),
    }
}

fn harness_with_browser(browser: DefaultBrowserBehavior) -> Harness {
    let ws = MockWebSocketAdapter::new();
    let client = DefaultSignalingClient::new(ws.clone());
    let peer = MockPeerConnection::new();
    let context = NegotiationContext::new(Arc::new(client.clone()), Arc::new(browser), meeting())
        .with_peer(peer.clone());
    Harness {
        ws,
        client,
        peer,
        context: Arc::new(context),
    }
}

fn harness() -> Harness {
    harness_with_browser(DefaultBrowserBehavior::default())
}

/// Harness whose client is already open
fn connected() -> Harness {
    let h = harness();
    h.client
        .open_connection(SignalingClientConnectionRequest::new("wss://signal.test/control/meeting", "t"));
    h.ws.open();
    assert!(h.client.ready());
    h
}

fn spawn<T: Task + 'static>(task: Arc<T>) -> tokio::task::JoinHandle<meetlink_client::Result<()>> {
    tokio::spawn(async move { task.run().await })
}

async fn wait_sent(ws: &MockWebSocketAdapter, count: usize) -> bool {
    wait_for(
        || async { ws.sent_count() >= count },
        DEFAULT_CHECK_INTERVAL,
        DEFAULT_TIMEOUT,
    )
    .await
}

async fn wait_created(ws: &MockWebSocketAdapter, count: usize) -> bool {
    wait_for(
        || async { ws.create_count() >= count },
        DEFAULT_CHECK_INTERVAL,
        DEFAULT_TIMEOUT,
    )
    .await
}

// ============================================================================
// OpenSignalingConnectionTask
// ============================================================================

#[tokio::test]
async fn test_open_succeeds_on_open() {
    let h = harness();
    let task = Arc::new(OpenSignalingConnectionTask::new(h.context.clone()));
    assert_eq!(task.name(), "OpenSignalingConnectionTask");
    let handle = spawn(task);

    assert!(wait_created(&h.ws, 1).await);
    assert_eq!(h.ws.protocols()[0][1], "join-token");
    h.ws.open();

    handle.await.unwrap().unwrap();
    assert!(h.context.snapshot().signaling_open_duration_ms.is_some());
}

#[tokio::test]
async fn test_open_fails_on_failed() {
    let h = harness();
    let handle = spawn(Arc::new(OpenSignalingConnectionTask::new(h.context.clone())));

    assert!(wait_created(&h.ws, 1).await);
    h.ws.fail_connect();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::ConnectionFailed(_)));
    assert!(h.context.snapshot().signaling_open_duration_ms.is_some());
}

#[tokio::test]
async fn test_open_cancel() {
    let h = harness();
    let task = Arc::new(OpenSignalingConnectionTask::new(h.context.clone()));
    let handle = spawn(task.clone());

    assert!(wait_created(&h.ws, 1).await);
    task.cancel();
    task.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_canceled());
    assert_eq!(err.to_string(), "OpenSignalingConnectionTask got canceled");
    // the interceptor is gone once run returns
    assert_eq!(h.client.observer_count(), 0);
}

// ============================================================================
// JoinAndReceiveIndexTask
// ============================================================================

#[tokio::test]
async fn test_join_stores_first_index() {
    let h = connected();
    let handle = spawn(Arc::new(JoinAndReceiveIndexTask::new(h.context.clone())));

    assert!(wait_sent(&h.ws, 1).await);
    assert!(matches!(h.ws.sent_messages()[0].frame, SignalFrame::Join(_)));

    // unrelated frames are passed over
    h.ws.receive_frame(SignalFrame::LeaveAck(LeaveAckFrame::default()));
    h.ws.receive_frame(SignalFrame::Index(IndexFrame {
        sources: vec![StreamDescriptor {
            stream_id: 7,
            ..Default::default()
        }],
        ..Default::default()
    }));

    handle.await.unwrap().unwrap();
    let index = h.context.snapshot().index_frame.unwrap();
    assert_eq!(index.sources[0].stream_id, 7);
}

#[tokio::test]
async fn test_join_cancel() {
    let h = connected();
    let task = Arc::new(JoinAndReceiveIndexTask::new(h.context.clone()));
    let handle = spawn(task.clone());

    assert!(wait_sent(&h.ws, 1).await);
    task.cancel();
    assert!(handle.await.unwrap().unwrap_err().is_canceled());
    assert!(h.context.snapshot().index_frame.is_none());
}

// ============================================================================
// SubscribeAndReceiveSubscribeAckTask
// ============================================================================

#[tokio::test]
async fn test_subscribe_sends_local_description_and_stores_answer() {
    let h = connected();
    {
        let mut state = h.context.state();
        state.local_offer = Some(Sdp::new("v=0\r\noffer\r\n"));
        state.local_description = Some(Sdp::new("v=0\r\nmunged\r\n"));
        state.audio_muted = true;
    }
    let handle = spawn(Arc::new(SubscribeAndReceiveSubscribeAckTask::new(h.context.clone())));

    assert!(wait_sent(&h.ws, 1).await);
    let sent = h.ws.sent_messages();
    let SignalFrame::Subscribe(subscribe) = &sent[0].frame else {
        panic!("expected subscribe");
    };
    assert_eq!(subscribe.sdp_offer.as_deref(), Some("v=0\r\nmunged\r\n"));
    assert_eq!(subscribe.audio_host, "audio.test:3478");
    assert!(subscribe.audio_muted);

    h.ws.receive_frame(SignalFrame::SubscribeAck(SubscribeAckFrame {
        sdp_answer: Some("v=0\r\nanswer\r\n".to_string()),
        ..Default::default()
    }));

    handle.await.unwrap().unwrap();
    assert_eq!(
        h.context.snapshot().sdp_answer.unwrap().as_str(),
        "v=0\r\nanswer\r\n"
    );
}

#[tokio::test]
async fn test_subscribe_fails_when_connection_closes() {
    let h = connected();
    h.context.state().local_offer = Some(Sdp::new("v=0\r\n"));
    let handle = spawn(Arc::new(SubscribeAndReceiveSubscribeAckTask::new(h.context.clone())));

    assert!(wait_sent(&h.ws, 1).await);
    h.ws.server_close(4410, "gone");

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::TaskFailed { ref task, .. } if task == "SubscribeAndReceiveSubscribeAckTask"));
}

// ============================================================================
// LeaveAndReceiveLeaveAckTask
// ============================================================================

#[tokio::test]
async fn test_leave_skipped_when_not_ready() {
    let h = harness();
    LeaveAndReceiveLeaveAckTask::new(h.context.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(h.ws.sent_count(), 0);
}

#[tokio::test]
async fn test_leave_completes_on_ack() {
    let h = connected();
    let handle = spawn(Arc::new(LeaveAndReceiveLeaveAckTask::new(h.context.clone())));

    assert!(wait_sent(&h.ws, 1).await);
    assert!(matches!(h.ws.sent_messages()[0].frame, SignalFrame::Leave(_)));
    h.ws.receive_frame(SignalFrame::LeaveAck(LeaveAckFrame::default()));
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_leave_completes_on_close() {
    let h = connected();
    let handle = spawn(Arc::new(LeaveAndReceiveLeaveAckTask::new(h.context.clone())));

    assert!(wait_sent(&h.ws, 1).await);
    h.ws.server_close(1000, "");
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_leave_cancel() {
    let h = connected();
    let task = Arc::new(LeaveAndReceiveLeaveAckTask::new(h.context.clone()));
    let handle = spawn(task.clone());

    assert!(wait_sent(&h.ws, 1).await);
    task.cancel();
    assert!(handle.await.unwrap().unwrap_err().is_canceled());
}

// ============================================================================
// PromoteToPrimaryMeetingTask
// ============================================================================

fn recording() -> (Arc<Mutex<Vec<PrimaryMeetingStatus>>>, impl Fn(PrimaryMeetingStatus) + Send + Sync + 'static) {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    (statuses, move |status| sink.lock().push(status))
}

fn credentials() -> MeetingSessionCredentials {
    MeetingSessionCredentials {
        attendee_id: "primary-attendee".to_string(),
        external_user_id: "user".to_string(),
        join_token: "primary-token".to_string(),
    }
}

#[tokio::test]
async fn test_promote_joined() {
    let h = connected();
    let (statuses, completion) = recording();
    let handle = spawn(Arc::new(PromoteToPrimaryMeetingTask::new(
        h.context.clone(),
        credentials(),
        completion,
    )));

    assert!(wait_sent(&h.ws, 1).await);
    let sent = h.ws.sent_messages();
    assert!(matches!(&sent[0].frame, SignalFrame::PrimaryMeetingJoin(f) if f.credentials.join_token == "primary-token"));

    h.ws.receive_frame(SignalFrame::PrimaryMeetingJoinAck(PrimaryMeetingJoinAckFrame::default()));
    handle.await.unwrap().unwrap();
    assert_eq!(*statuses.lock(), vec![PrimaryMeetingStatus::Joined]);
}

#[tokio::test]
async fn test_promote_rejected() {
    let h = connected();
    let (statuses, completion) = recording();
    let handle = spawn(Arc::new(PromoteToPrimaryMeetingTask::new(
        h.context.clone(),
        credentials(),
        completion,
    )));

    assert!(wait_sent(&h.ws, 1).await);
    h.ws.receive(
        &SignalMessage::new(SignalFrame::PrimaryMeetingJoinAck(PrimaryMeetingJoinAckFrame::default()))
            .with_timestamp(1)
            .with_error(ErrorFrame {
                status: 403,
                description: "not allowed".to_string(),
            }),
    );
    handle.await.unwrap().unwrap();
    assert_eq!(
        *statuses.lock(),
        vec![PrimaryMeetingStatus::Rejected {
            status: 403,
            description: "not allowed".to_string()
        }]
    );
}

#[tokio::test]
async fn test_promote_not_ready() {
    let h = harness();
    let (statuses, completion) = recording();
    PromoteToPrimaryMeetingTask::new(h.context.clone(), credentials(), completion)
        .run()
        .await
        .unwrap();
    assert_eq!(*statuses.lock(), vec![PrimaryMeetingStatus::SignalingRequestFailed]);
    assert_eq!(h.ws.sent_count(), 0);
}

#[tokio::test]
async fn test_promote_connection_lost() {
    let h = connected();
    let (statuses, completion) = recording();
    let handle = spawn(Arc::new(PromoteToPrimaryMeetingTask::new(
        h.context.clone(),
        credentials(),
        completion,
    )));

    assert!(wait_sent(&h.ws, 1).await);
    h.ws.error("reset");
    handle.await.unwrap().unwrap();
    assert_eq!(*statuses.lock(), vec![PrimaryMeetingStatus::SignalingRequestFailed]);
}

#[tokio::test]
async fn test_promote_cancel_reports_once() {
    let h = connected();
    let (statuses, completion) = recording();
    let task = Arc::new(PromoteToPrimaryMeetingTask::new(h.context.clone(), credentials(), completion));
    let handle = spawn(task.clone());

    assert!(wait_sent(&h.ws, 1).await);
    task.cancel();
    assert!(handle.await.unwrap().unwrap_err().is_canceled());

    // a late ack has no one to report to
    h.ws.receive_frame(SignalFrame::PrimaryMeetingJoinAck(PrimaryMeetingJoinAckFrame::default()));
    assert_eq!(*statuses.lock(), vec![PrimaryMeetingStatus::SignalingRequestFailed]);
}

// ============================================================================
// SetLocalDescriptionTask
// ============================================================================

#[tokio::test]
async fn test_set_local_description_applies_audio_munging() {
    let h = harness();
    {
        let mut state = h.context.state();
        state.local_offer = Some(Sdp::new(OPUS_OFFER));
        state.audio_max_average_bitrate_bps = Some(64000.0);
        state.stereo_audio_enabled = true;
    }
    SetLocalDescriptionTask::new(h.context.clone()).run().await.unwrap();

    let applied = h.peer.local_descriptions();
    assert_eq!(applied.len(), 1);
    assert!(applied[0]
        .as_str()
        .contains("a=fmtp:111 minptime=10;useinbandfec=1;maxaveragebitrate=64000;stereo=1;sprop-stereo=1"));
    assert_eq!(h.context.snapshot().local_description, Some(applied[0].clone()));
}

#[tokio::test]
async fn test_set_local_description_untouched_by_default() {
    let h = harness();
    h.context.state().local_offer = Some(Sdp::new(OPUS_OFFER));
    SetLocalDescriptionTask::new(h.context.clone()).run().await.unwrap();
    assert_eq!(h.peer.local_descriptions()[0].as_str(), OPUS_OFFER);
}

#[tokio::test]
async fn test_set_local_description_removes_h264_when_required() {
    let h = harness_with_browser(DefaultBrowserBehavior {
        h264_removal: true,
        ..Default::default()
    });
    h.context.state().local_offer = Some(Sdp::new(H264_OFFER));
    SetLocalDescriptionTask::new(h.context.clone()).run().await.unwrap();

    let applied = h.peer.local_descriptions()[0].clone();
    assert!(applied.as_str().contains("m=video 9 UDP/TLS/RTP/SAVPF 96\r\n"));
    assert!(!applied.as_str().contains("H264"));
    assert!(!applied.as_str().contains("apt=102"));
}

#[tokio::test]
async fn test_set_local_description_requires_offer() {
    let h = harness();
    let err = SetLocalDescriptionTask::new(h.context.clone())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::TaskFailed { .. }));
    assert!(h.peer.local_descriptions().is_empty());
}

#[tokio::test]
async fn test_set_local_description_peer_rejects() {
    let h = harness();
    h.context.state().local_offer = Some(Sdp::new(OPUS_OFFER));
    h.peer.set_fail(true);
    let err = SetLocalDescriptionTask::new(h.context.clone())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::TaskFailed { ref reason, .. } if reason.contains("rejected")));
    assert!(h.context.snapshot().local_description.is_none());
}

#[tokio::test]
async fn test_set_local_description_cancel() {
    let h = harness();
    h.context.state().local_offer = Some(Sdp::new(OPUS_OFFER));
    h.peer.set_hang(true);
    let task = Arc::new(SetLocalDescriptionTask::new(h.context.clone()));
    let handle = spawn(task.clone());

    tokio::time::sleep(Duration::from_millis(20)).await;
    task.cancel();
    assert!(handle.await.unwrap().unwrap_err().is_canceled());
    assert!(h.context.snapshot().local_description.is_none());
}
