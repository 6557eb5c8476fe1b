//! Live signaling session for the `connect` command

use anyhow::{bail, Result};
use colored::Colorize;
use meetlink_client::task::{
    JoinAndReceiveIndexTask, LeaveAndReceiveLeaveAckTask, OpenSignalingConnectionTask,
};
use meetlink_client::{
    DefaultPingPong, DefaultSignalingClient, MeetingConfiguration, NegotiationContext,
    PingPongObserver, SignalingClient, SignalingClientEvent, SignalingClientEventType,
    SignalingClientJoin, Task,
};
use meetlink_transport::TungsteniteWebSocketAdapter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::config::CliConfig;

const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

struct PongLogger;

impl PingPongObserver for PongLogger {
    fn did_receive_pong(&self, ping_id: u32, latency_ms: i64, clock_skew_ms: i64) {
        info!(ping_id, latency_ms, clock_skew_ms, "pong");
    }

    fn did_miss_pongs(&self, count: u32) {
        warn!("{} pong(s) missed", count);
    }
}

pub async fn run_connect(
    url: &str,
    token: &str,
    config: &CliConfig,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    println!("{} Connecting to {}", "MEETLINK".cyan().bold(), url);

    let client = DefaultSignalingClient::with_config(
        Arc::new(TungsteniteWebSocketAdapter::new()),
        Arc::new(config.browser.clone()),
        config.signaling.clone(),
    );
    client.check_config()?;

    // print every received frame as one JSON line; wake on close
    let closed = Arc::new(Notify::new());
    {
        let closed = closed.clone();
        client.register_observer(Arc::new(move |event: &SignalingClientEvent| {
            match event.event_type {
                SignalingClientEventType::ReceivedSignalFrame => {
                    if let Some(message) = &event.message {
                        match serde_json::to_string(message) {
                            Ok(json) => println!("{}", json),
                            Err(e) => warn!("failed to serialize frame: {}", e),
                        }
                    }
                }
                SignalingClientEventType::WebSocketClosed => {
                    info!(
                        "closed: {} {}",
                        event.close_code.unwrap_or_default(),
                        event.close_reason.as_deref().unwrap_or("")
                    );
                    closed.notify_one();
                }
                _ => {}
            }
        }));
    }

    let meeting = MeetingConfiguration {
        signaling_url: url.to_string(),
        join_token: token.to_string(),
        ..Default::default()
    };
    let signaling: Arc<dyn SignalingClient> = Arc::new(client.clone());
    let context = Arc::new(NegotiationContext::new(
        signaling.clone(),
        Arc::new(config.browser.clone()),
        meeting,
    ));
    context.state().join = SignalingClientJoin::new(config.signaling.send_bitrates);

    let open = OpenSignalingConnectionTask::new(context.clone());
    tokio::select! {
        result = open.run() => result?,
        _ = shutdown_rx.recv() => {
            open.cancel();
            client.close_connection();
            return Ok(());
        }
    }
    if let Some(ms) = context.snapshot().signaling_open_duration_ms {
        println!("{} Signaling open after {}ms", "OK".green().bold(), ms);
    }

    let join = JoinAndReceiveIndexTask::new(context.clone());
    tokio::select! {
        result = join.run() => result?,
        _ = shutdown_rx.recv() => {
            join.cancel();
            client.close_connection();
            return Ok(());
        }
    }
    if let Some(index) = context.snapshot().index_frame {
        println!(
            "{} Joined: {} source(s){}",
            "OK".green().bold(),
            index.sources.len(),
            if index.at_capacity { ", at capacity" } else { "" }
        );
    }

    let ping_pong = DefaultPingPong::new(signaling, config.signaling.ping_pong_interval());
    ping_pong.add_observer(Arc::new(PongLogger));
    ping_pong.start();

    let server_closed = tokio::select! {
        _ = shutdown_rx.recv() => false,
        _ = closed.notified() => true,
    };
    ping_pong.stop();

    if server_closed {
        bail!("signaling connection closed by server");
    }

    info!("leaving");
    let leave = LeaveAndReceiveLeaveAckTask::new(context);
    if tokio::time::timeout(LEAVE_TIMEOUT, leave.run()).await.is_err() {
        leave.cancel();
        warn!("no leave ack within {:?}", LEAVE_TIMEOUT);
    }

    client.close_connection();
    // the client synthesizes a close after its own timeout
    let _ = tokio::time::timeout(
        config.signaling.close_timeout() + Duration::from_millis(500),
        closed.notified(),
    )
    .await;
    println!("{} Left", "OK".green().bold());
    Ok(())
}
