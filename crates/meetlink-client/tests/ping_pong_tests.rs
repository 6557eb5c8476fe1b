//! Keepalive tests
//!
//! Time is paused so interval ticks are deterministic.

use meetlink_client::{
    DefaultPingPong, DefaultSignalingClient, SignalingClient, SignalingClientConnectionRequest,
};
use meetlink_core::{PingPongFrame, PingPongType, SignalFrame, SignalMessage};
use meetlink_test_utils::{MockWebSocketAdapter, PingPongCollector};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(10);

fn setup() -> (DefaultSignalingClient, Arc<MockWebSocketAdapter>, DefaultPingPong, PingPongCollector) {
    let ws = MockWebSocketAdapter::new();
    let client = DefaultSignalingClient::new(ws.clone());
    let ping_pong = DefaultPingPong::new(Arc::new(client.clone()), INTERVAL);
    let collector = PingPongCollector::new();
    ping_pong.add_observer(collector.observer());
    (client, ws, ping_pong, collector)
}

fn open(client: &DefaultSignalingClient, ws: &MockWebSocketAdapter) {
    client.open_connection(SignalingClientConnectionRequest::new("wss://signal.test/control/m", "t"));
    ws.open();
}

fn pings(ws: &MockWebSocketAdapter) -> Vec<(PingPongFrame, Option<u64>)> {
    ws.sent_messages()
        .into_iter()
        .filter_map(|m| match m.frame {
            SignalFrame::PingPong(f) => Some((f, m.timestamp_ms)),
            _ => None,
        })
        .collect()
}

fn pong(ping_id: u32) -> SignalFrame {
    SignalFrame::PingPong(PingPongFrame {
        ping_pong_type: PingPongType::Pong,
        ping_id,
    })
}

#[tokio::test(start_paused = true)]
async fn test_first_ping_immediate_then_every_interval() {
    let (client, ws, ping_pong, _collector) = setup();
    open(&client, &ws);
    ping_pong.start();

    let sent = pings(&ws);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.ping_pong_type, PingPongType::Ping);
    assert_eq!(sent[0].0.ping_id, 1);

    tokio::time::sleep(INTERVAL - Duration::from_millis(1)).await;
    assert_eq!(pings(&ws).len(), 1);

    tokio::time::sleep(Duration::from_millis(2)).await;
    let sent = pings(&ws);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].0.ping_id, 2);
}

#[tokio::test(start_paused = true)]
async fn test_missed_pongs_reported_before_each_ping() {
    let (client, ws, ping_pong, collector) = setup();
    open(&client, &ws);
    ping_pong.start();

    tokio::time::sleep(INTERVAL * 2 + Duration::from_millis(1)).await;
    assert_eq!(pings(&ws).len(), 3);
    assert_eq!(collector.misses(), vec![1, 2]);
    assert_eq!(ping_pong.consecutive_pongs_unaccounted_for(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_matching_pong_resets_count_and_reports_skew() {
    let (client, ws, ping_pong, collector) = setup();
    open(&client, &ws);
    ping_pong.start();

    let sent_at = pings(&ws)[0].1.unwrap();
    ws.receive(&SignalMessage::new(pong(1)).with_timestamp(sent_at + 50));

    assert_eq!(ping_pong.consecutive_pongs_unaccounted_for(), 0);
    let pongs = collector.pongs();
    assert_eq!(pongs.len(), 1);
    let (ping_id, latency_ms, clock_skew_ms) = pongs[0];
    assert_eq!(ping_id, 1);
    assert!(latency_ms >= 0);
    assert_eq!(clock_skew_ms, 50);

    // answered: no miss reported on the next ping
    tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
    assert!(collector.misses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_pong_ignored() {
    let (client, ws, ping_pong, collector) = setup();
    open(&client, &ws);
    ping_pong.start();

    ws.receive(&SignalMessage::new(pong(99)).with_timestamp(1));
    assert_eq!(ping_pong.consecutive_pongs_unaccounted_for(), 1);
    assert!(collector.pongs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pong_without_timestamp_only_resets() {
    let (client, ws, ping_pong, collector) = setup();
    open(&client, &ws);
    ping_pong.start();

    ws.receive(&SignalMessage::new(pong(1)));
    assert_eq!(ping_pong.consecutive_pongs_unaccounted_for(), 0);
    assert!(collector.pongs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_server_ping_answered() {
    let (client, ws, ping_pong, _collector) = setup();
    open(&client, &ws);
    ping_pong.start();
    ws.clear_sent();

    ws.receive_frame(SignalFrame::PingPong(PingPongFrame {
        ping_pong_type: PingPongType::Ping,
        ping_id: 42,
    }));
    let sent = pings(&ws);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.ping_pong_type, PingPongType::Pong);
    assert_eq!(sent[0].0.ping_id, 42);
}

#[tokio::test(start_paused = true)]
async fn test_start_before_open_waits_for_open() {
    let (client, ws, ping_pong, _collector) = setup();
    ping_pong.start();
    assert!(pings(&ws).is_empty());

    open(&client, &ws);
    assert_eq!(pings(&ws).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_and_reopen_restarts() {
    let (client, ws, ping_pong, _collector) = setup();
    open(&client, &ws);
    ping_pong.start();
    assert_eq!(ping_pong.ping_id(), 1);

    ws.server_close(1000, "");
    assert_eq!(ping_pong.ping_id(), 0);
    assert_eq!(ping_pong.consecutive_pongs_unaccounted_for(), 0);

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(ping_pong.ping_id(), 0);

    ws.clear_sent();
    open(&client, &ws);
    let sent = pings(&ws);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.ping_id, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_unregisters() {
    let (client, ws, ping_pong, _collector) = setup();
    let baseline = client.observer_count();
    ping_pong.start();
    assert_eq!(client.observer_count(), baseline + 1);

    ping_pong.stop();
    assert_eq!(client.observer_count(), baseline);

    open(&client, &ws);
    assert!(pings(&ws).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_does_not_double_register() {
    let (client, ws, ping_pong, _collector) = setup();
    let baseline = client.observer_count();
    ping_pong.start();
    ping_pong.start();
    assert_eq!(client.observer_count(), baseline + 1);

    open(&client, &ws);
    assert_eq!(pings(&ws).len(), 1);
}
