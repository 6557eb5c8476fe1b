//! Ping/pong keepalive over the signaling channel
//!
//! Pings go out once per interval while the client is ready. Each ping
//! counts as unaccounted for until the matching pong arrives; the count of
//! misses is reported before every new ping so the owner can decide when to
//! reconnect.

use meetlink_core::time::now_ms;
use meetlink_core::{PingPongFrame, PingPongType, SignalFrame};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::SignalingClient;
use crate::event::{SignalingClientEvent, SignalingClientEventType};
use crate::observer::{ObserverSet, SignalingClientObserver};

pub trait PingPongObserver: Send + Sync {
    /// A pong matched the outstanding ping
    fn did_receive_pong(&self, _ping_id: u32, _latency_ms: i64, _clock_skew_ms: i64) {}

    /// `count` pings in a row went unanswered
    fn did_miss_pongs(&self, _count: u32) {}
}

#[derive(Default)]
struct PingState {
    ping_id: u32,
    consecutive_pongs_unaccounted_for: u32,
    ping_timestamp_local_ms: u64,
    ticker: Option<JoinHandle<()>>,
}

struct Inner {
    client: Arc<dyn SignalingClient>,
    interval: Duration,
    state: Mutex<PingState>,
    observers: ObserverSet<dyn PingPongObserver>,
    this: Weak<Inner>,
}

pub struct DefaultPingPong {
    inner: Arc<Inner>,
}

impl DefaultPingPong {
    pub fn new(client: Arc<dyn SignalingClient>, interval: Duration) -> Self {
        let inner = Arc::new_cyclic(|this| Inner {
            client,
            interval,
            state: Mutex::new(PingState::default()),
            observers: ObserverSet::new(),
            this: this.clone(),
        });
        Self { inner }
    }

    pub fn add_observer(&self, observer: Arc<dyn PingPongObserver>) {
        info!("adding a ping-pong observer");
        self.inner.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn PingPongObserver>) {
        info!("removing a ping-pong observer");
        self.inner.observers.remove(observer);
    }

    /// Begin pinging now if the client is ready, otherwise on the next open
    pub fn start(&self) {
        self.stop();
        self.inner.client.register_observer(self.as_observer());
        if self.inner.client.ready() {
            self.inner.start_ping_interval();
        }
    }

    pub fn stop(&self) {
        self.inner.stop_ping_interval();
        self.inner.client.remove_observer(&self.as_observer());
    }

    pub fn ping_id(&self) -> u32 {
        self.inner.state.lock().ping_id
    }

    pub fn consecutive_pongs_unaccounted_for(&self) -> u32 {
        self.inner.state.lock().consecutive_pongs_unaccounted_for
    }

    fn as_observer(&self) -> Arc<dyn SignalingClientObserver> {
        self.inner.clone()
    }
}

impl Drop for DefaultPingPong {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn start_ping_interval(&self) {
        let ticker = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let this = self.this.clone();
                let period = self.interval;
                Some(runtime.spawn(async move {
                    let mut ticks = interval_at(Instant::now() + period, period);
                    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticks.tick().await;
                        match this.upgrade() {
                            Some(inner) => inner.ping(),
                            None => break,
                        }
                    }
                }))
            }
            Err(_) => {
                warn!("no runtime, pinging once only");
                None
            }
        };
        if let Some(previous) = std::mem::replace(&mut self.state.lock().ticker, ticker) {
            previous.abort();
        }
        self.ping();
    }

    fn stop_ping_interval(&self) {
        let mut state = self.state.lock();
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        state.ping_id = 0;
        state.consecutive_pongs_unaccounted_for = 0;
    }

    fn ping(&self) {
        let (missed, ping_id) = {
            let mut state = self.state.lock();
            let missed = state.consecutive_pongs_unaccounted_for;
            state.consecutive_pongs_unaccounted_for += 1;
            state.ping_id = state.ping_id.wrapping_add(1);
            // provisional; a fast pong may land before send returns
            state.ping_timestamp_local_ms = now_ms();
            (missed, state.ping_id)
        };

        if missed > 0 {
            warn!("missed pong {} time(s)", missed);
            self.observers
                .for_each("did_miss_pongs", |observer| observer.did_miss_pongs(missed));
        }

        let sent_at = self.client.ping_pong(PingPongFrame {
            ping_pong_type: PingPongType::Ping,
            ping_id,
        });
        let mut state = self.state.lock();
        if state.ping_id == ping_id {
            state.ping_timestamp_local_ms = sent_at;
        }
        debug!("sent ping {}", ping_id);
    }

    fn pong(&self, ping_id: u32) {
        self.client.ping_pong(PingPongFrame {
            ping_pong_type: PingPongType::Pong,
            ping_id,
        });
    }

    fn handle_pong(&self, ping_id: u32, remote_timestamp_ms: Option<u64>, received_at_ms: u64) {
        let ping_timestamp_local_ms = {
            let mut state = self.state.lock();
            if ping_id != state.ping_id {
                warn!("unexpected ping id {} (expected {})", ping_id, state.ping_id);
                return;
            }
            state.consecutive_pongs_unaccounted_for = 0;
            state.ping_timestamp_local_ms
        };
        let Some(remote_timestamp_ms) = remote_timestamp_ms else {
            return;
        };
        debug!("received pong {} with timestamp {}", ping_id, remote_timestamp_ms);

        let latency_ms = received_at_ms as i64 - ping_timestamp_local_ms as i64;
        let clock_skew_ms = remote_timestamp_ms as i64 - ping_timestamp_local_ms as i64;
        info!(
            "clock skew estimate={}ms from ping-pong time={}ms",
            clock_skew_ms, latency_ms
        );
        self.observers.for_each("did_receive_pong", |observer| {
            observer.did_receive_pong(ping_id, latency_ms, clock_skew_ms)
        });
    }
}

impl SignalingClientObserver for Inner {
    fn handle_signaling_client_event(&self, event: &SignalingClientEvent) {
        match event.event_type {
            SignalingClientEventType::WebSocketOpen => self.start_ping_interval(),
            SignalingClientEventType::WebSocketFailed | SignalingClientEventType::WebSocketError => {
                warn!("stopped pinging ({})", event.event_type);
                self.stop_ping_interval();
            }
            SignalingClientEventType::WebSocketClosing | SignalingClientEventType::WebSocketClosed => {
                info!("stopped pinging ({})", event.event_type);
                self.stop_ping_interval();
            }
            SignalingClientEventType::ReceivedSignalFrame => {
                let Some(message) = &event.message else {
                    return;
                };
                let SignalFrame::PingPong(frame) = &message.frame else {
                    return;
                };
                match frame.ping_pong_type {
                    PingPongType::Pong => {
                        self.handle_pong(frame.ping_id, message.timestamp_ms, event.timestamp_ms)
                    }
                    PingPongType::Ping => self.pong(frame.ping_id),
                }
            }
            _ => {}
        }
    }
}
