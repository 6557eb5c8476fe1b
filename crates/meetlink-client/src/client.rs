//! Signaling client
//!
//! Owns one [`WebSocketAdapter`] and runs at most one connection on it at a
//! time. Connection requests are queued and serviced in order, each only
//! after the previous connection's close was confirmed, or given up on when
//! the close timeout fires.

use bytes::Bytes;
use meetlink_core::time::now_ms;
use meetlink_core::{
    codec, AudioControlFrame, ClientMetricFrame, DataMessageFrame, LeaveFrame,
    MeetingSessionCredentials, PauseResumeFrame, PingPongFrame, PrimaryMeetingJoinFrame,
    PrimaryMeetingLeaveFrame, RemoteVideoUpdateFrame, SignalFrame, SignalMessage,
    VideoSubscriptionConfiguration,
};
use meetlink_transport::{
    WebSocketAdapter, WebSocketEvent, WebSocketEventHandler, WebSocketReadyState, CLOSE_ABNORMAL,
    CLOSE_NORMAL,
};
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserBehavior, DefaultBrowserBehavior};
use crate::config::SignalingClientConfig;
use crate::error::Result;
use crate::event::{SignalingClientEvent, SignalingClientEventType};
use crate::join::SignalingClientJoin;
use crate::observer::{ObserverSet, SignalingClientObserver};
use crate::request::SignalingClientConnectionRequest;
use crate::subscribe::SignalingClientSubscribe;

/// The signaling operations tasks and keepalive depend on
pub trait SignalingClient: Send + Sync {
    fn register_observer(&self, observer: Arc<dyn SignalingClientObserver>);

    fn remove_observer(&self, observer: &Arc<dyn SignalingClientObserver>);

    /// Queue a connection and close the current one
    fn open_connection(&self, request: SignalingClientConnectionRequest);

    fn close_connection(&self);

    /// Open, opened at least once, and not closing
    fn ready(&self) -> bool;

    fn join(&self, settings: &SignalingClientJoin);

    fn subscribe(&self, settings: &SignalingClientSubscribe);

    fn leave(&self);

    /// Send a ping or pong; returns the timestamp stamped on the message
    fn ping_pong(&self, frame: PingPongFrame) -> u64;

    fn mute(&self, muted: bool);

    fn pause(&self, stream_ids: &[u32]);

    fn resume(&self, stream_ids: &[u32]);

    fn send_client_metrics(&self, frame: ClientMetricFrame);

    fn send_data_message(&self, frame: DataMessageFrame);

    fn remote_video_update(
        &self,
        added_or_updated: Vec<VideoSubscriptionConfiguration>,
        removed_mids: Vec<String>,
    );

    fn promote_to_primary_meeting(&self, credentials: &MeetingSessionCredentials);

    fn demote_from_primary_meeting(&self);
}

#[derive(Default)]
struct ConnectionState {
    was_opened: bool,
    /// Close was requested by us and not yet confirmed
    is_closing: bool,
    queue: VecDeque<SignalingClientConnectionRequest>,
    unload_hook_active: bool,
    /// Bumped whenever a connection ends or starts; stale events are dropped
    generation: u64,
    close_timer: Option<JoinHandle<()>>,
}

struct Inner {
    websocket: Arc<dyn WebSocketAdapter>,
    browser: Arc<dyn BrowserBehavior>,
    config: SignalingClientConfig,
    audio_session_id: u64,
    state: Mutex<ConnectionState>,
    observers: ObserverSet<dyn SignalingClientObserver>,
}

/// Cheap to clone; clones share one connection
#[derive(Clone)]
pub struct DefaultSignalingClient {
    inner: Arc<Inner>,
}

impl DefaultSignalingClient {
    pub fn new(websocket: Arc<dyn WebSocketAdapter>) -> Self {
        Self::with_config(
            websocket,
            Arc::new(DefaultBrowserBehavior::default()),
            SignalingClientConfig::default(),
        )
    }

    pub fn with_config(
        websocket: Arc<dyn WebSocketAdapter>,
        browser: Arc<dyn BrowserBehavior>,
        config: SignalingClientConfig,
    ) -> Self {
        let audio_session_id = u64::from(rand::rngs::OsRng.next_u32());
        let inner = Inner {
            websocket,
            browser,
            config,
            audio_session_id,
            state: Mutex::new(ConnectionState::default()),
            observers: ObserverSet::new(),
        };
        inner.reset_connection();
        debug!("signaling client init");
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &SignalingClientConfig {
        &self.inner.config
    }

    pub fn browser(&self) -> &Arc<dyn BrowserBehavior> {
        &self.inner.browser
    }

    /// Random per-client id sent with JOIN
    pub fn audio_session_id(&self) -> u64 {
        self.inner.audio_session_id
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// The host is going away (process exit, page unload). Sends a
    /// best-effort LEAVE if a connection is open.
    pub fn notify_unload(&self) {
        let active = self.inner.state.lock().unload_hook_active;
        if active {
            info!("unloading, sending leave");
            self.leave();
        }
    }

    /// Validate the configuration up front
    pub fn check_config(&self) -> Result<()> {
        self.inner.config.validate()
    }
}

impl SignalingClient for DefaultSignalingClient {
    fn register_observer(&self, observer: Arc<dyn SignalingClientObserver>) {
        debug!("registering signaling client observer");
        self.inner.observers.add(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn SignalingClientObserver>) {
        debug!("removing signaling client observer");
        self.inner.observers.remove(observer);
    }

    fn open_connection(&self, request: SignalingClientConnectionRequest) {
        info!("adding connection request to queue: {}", request.url());
        self.inner.state.lock().queue.push_back(request);
        self.inner.close_connection();
    }

    fn close_connection(&self) {
        self.inner.close_connection();
    }

    fn ready(&self) -> bool {
        self.inner.ready()
    }

    fn join(&self, settings: &SignalingClientJoin) {
        info!("sending join");
        let frame = settings.to_frame(
            &self.inner.config,
            self.inner.browser.as_ref(),
            self.inner.audio_session_id,
        );
        self.inner.send_message(SignalFrame::Join(frame));
    }

    fn subscribe(&self, settings: &SignalingClientSubscribe) {
        info!("sending subscribe");
        self.inner.send_message(SignalFrame::Subscribe(settings.to_frame()));
    }

    fn leave(&self) {
        self.inner.send_message(SignalFrame::Leave(LeaveFrame::default()));
        debug!("sent leave");
    }

    fn ping_pong(&self, frame: PingPongFrame) -> u64 {
        debug!("sending {:?} {}", frame.ping_pong_type, frame.ping_id);
        self.inner.send_message(SignalFrame::PingPong(frame))
    }

    fn mute(&self, muted: bool) {
        self.inner
            .send_message(SignalFrame::AudioControl(AudioControlFrame { muted }));
    }

    fn pause(&self, stream_ids: &[u32]) {
        self.inner.send_message(SignalFrame::Pause(PauseResumeFrame {
            stream_ids: stream_ids.to_vec(),
            group_ids: Vec::new(),
        }));
    }

    fn resume(&self, stream_ids: &[u32]) {
        self.inner.send_message(SignalFrame::Resume(PauseResumeFrame {
            stream_ids: stream_ids.to_vec(),
            group_ids: Vec::new(),
        }));
    }

    fn send_client_metrics(&self, frame: ClientMetricFrame) {
        self.inner.send_message(SignalFrame::ClientMetric(frame));
    }

    fn send_data_message(&self, frame: DataMessageFrame) {
        self.inner.send_message(SignalFrame::DataMessage(frame));
    }

    fn remote_video_update(
        &self,
        added_or_updated: Vec<VideoSubscriptionConfiguration>,
        removed_mids: Vec<String>,
    ) {
        self.inner
            .send_message(SignalFrame::RemoteVideoUpdate(RemoteVideoUpdateFrame {
                added_or_updated_video_subscriptions: added_or_updated,
                removed_video_subscription_mids: removed_mids,
            }));
    }

    fn promote_to_primary_meeting(&self, credentials: &MeetingSessionCredentials) {
        info!("sending primary meeting join");
        self.inner
            .send_message(SignalFrame::PrimaryMeetingJoin(PrimaryMeetingJoinFrame {
                credentials: credentials.clone(),
            }));
    }

    fn demote_from_primary_meeting(&self) {
        info!("sending primary meeting leave");
        self.inner
            .send_message(SignalFrame::PrimaryMeetingLeave(PrimaryMeetingLeaveFrame::default()));
    }
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseCause {
    Transport,
    TimedOut,
}

impl Inner {
    fn ready(&self) -> bool {
        if self.websocket.ready_state() != WebSocketReadyState::Open {
            return false;
        }
        let state = self.state.lock();
        !state.is_closing && state.was_opened
    }

    fn reset_connection(&self) {
        self.websocket.destroy();
        self.state.lock().was_opened = false;
    }

    fn close_connection(self: &Arc<Self>) {
        let ready_state = self.websocket.ready_state();
        if ready_state == WebSocketReadyState::None || ready_state == WebSocketReadyState::Closed {
            info!("no existing connection needs closing");
            self.service_connection_request_queue();
            return;
        }

        let generation = {
            let mut state = self.state.lock();
            state.is_closing = true;
            state.unload_hook_active = false;
            state.generation
        };
        self.send_event(SignalingClientEvent::new(SignalingClientEventType::WebSocketClosing));

        // armed before close(): the adapter may report the close synchronously
        self.arm_close_timer(generation);
        self.websocket.close(CLOSE_NORMAL, "");
    }

    fn arm_close_timer(self: &Arc<Self>, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no runtime, close timeout disabled");
            return;
        };
        let weak = Arc::downgrade(self);
        let timeout = self.config.close_timeout();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_close_timeout(generation);
            }
        });
        if let Some(previous) = self.state.lock().close_timer.replace(timer) {
            previous.abort();
        }
    }

    fn on_close_timeout(self: &Arc<Self>, generation: u64) {
        if self.state.lock().generation != generation {
            return;
        }
        warn!(
            "no close event within {}ms, forcing abnormal closure",
            self.config.close_timeout_ms
        );
        self.on_close(generation, CLOSE_ABNORMAL, "abnormal closure".to_string(), CloseCause::TimedOut);
    }

    fn on_close(self: &Arc<Self>, generation: u64, code: u16, reason: String, cause: CloseCause) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.generation += 1;
            state.unload_hook_active = false;
            if let Some(timer) = state.close_timer.take() {
                if cause == CloseCause::Transport {
                    timer.abort();
                }
            }
        }
        debug!("connection closed ({:?}): {} {}", cause, code, reason);
        self.reset_connection();
        self.send_event(SignalingClientEvent::closed(code, reason));
        self.service_connection_request_queue();
    }

    fn service_connection_request_queue(self: &Arc<Self>) {
        let (request, generation) = {
            let mut state = self.state.lock();
            let Some(request) = state.queue.pop_front() else {
                info!("no connection requests to service");
                return;
            };
            state.is_closing = false;
            state.generation += 1;
            (request, state.generation)
        };

        info!("opening connection to {}", request.url());
        let weak = Arc::downgrade(self);
        let handler: WebSocketEventHandler = Arc::new(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.handle_websocket_event(generation, event);
            }
        });

        match self.websocket.create(&request.url(), &request.protocols(), handler) {
            Ok(()) => {
                self.send_event(SignalingClientEvent::new(SignalingClientEventType::WebSocketConnecting));
            }
            Err(e) => {
                error!("failed to create connection: {}", e);
                self.send_event(SignalingClientEvent::new(SignalingClientEventType::WebSocketFailed));
            }
        }
    }

    fn handle_websocket_event(self: &Arc<Self>, generation: u64, event: WebSocketEvent) {
        if self.state.lock().generation != generation {
            debug!("dropping event from superseded connection");
            return;
        }
        match event {
            WebSocketEvent::Open => {
                {
                    let mut state = self.state.lock();
                    state.unload_hook_active = true;
                    state.was_opened = true;
                }
                self.send_event(SignalingClientEvent::new(SignalingClientEventType::WebSocketOpen));
            }
            WebSocketEvent::Message(data) => {
                self.send_event(SignalingClientEvent::new(SignalingClientEventType::WebSocketMessage));
                self.receive_message(data);
            }
            WebSocketEvent::Close { code, reason } => {
                self.on_close(generation, code, reason, CloseCause::Transport);
            }
            WebSocketEvent::Error(reason) => {
                let (is_closing, was_opened) = {
                    let state = self.state.lock();
                    (state.is_closing, state.was_opened)
                };
                if is_closing && !was_opened {
                    info!("ignoring error closing signaling while connecting");
                } else if was_opened {
                    error!("received error while connected: {}", reason);
                    self.send_event(SignalingClientEvent::new(SignalingClientEventType::WebSocketError));
                } else {
                    error!("failed to connect: {}", reason);
                    self.send_event(SignalingClientEvent::new(SignalingClientEventType::WebSocketFailed));
                }
            }
        }
    }

    fn receive_message(&self, data: Bytes) {
        let message = match codec::decode(&data) {
            Ok(message) => message,
            Err(e) => {
                info!("failed to decode {} byte frame: {}", data.len(), e);
                self.send_event(SignalingClientEvent::new(SignalingClientEventType::ProtocolDecodeFailure));
                return;
            }
        };
        debug!("received: {:?}", message.message_type());
        if self.websocket.ready_state() == WebSocketReadyState::Open {
            self.send_event(SignalingClientEvent::with_message(
                SignalingClientEventType::ReceivedSignalFrame,
                message,
            ));
        } else {
            info!(
                "skipping notification of {:?} since WebSocket is not open",
                message.message_type()
            );
        }
    }

    /// The single send path: stamp, encode, and write if ready
    fn send_message(&self, frame: SignalFrame) -> u64 {
        let timestamp_ms = now_ms();
        let message = SignalMessage::new(frame).with_timestamp(timestamp_ms);
        debug!("sending: {:?}", message.message_type());

        let bytes = match codec::encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("failed to encode {:?}: {}", message.message_type(), e);
                self.send_event(SignalingClientEvent::new(
                    SignalingClientEventType::WebSocketSendMessageFailure,
                ));
                return timestamp_ms;
            }
        };

        let event_type = if !self.ready() {
            SignalingClientEventType::WebSocketSkippedMessage
        } else if self.websocket.send(bytes) {
            SignalingClientEventType::WebSocketSentMessage
        } else {
            SignalingClientEventType::WebSocketSendMessageFailure
        };
        self.send_event(SignalingClientEvent::new(event_type));
        timestamp_ms
    }

    fn send_event(&self, event: SignalingClientEvent) {
        if event.event_type == SignalingClientEventType::WebSocketSkippedMessage {
            debug!(
                "notifying event: {}, websocket state={}",
                event.event_type,
                self.websocket.ready_state()
            );
        } else if event.event_type.is_chatty() {
            debug!("notifying event: {}", event.event_type);
        } else {
            info!("notifying event: {}", event.event_type);
        }

        self.observers
            .for_each(event.event_type.as_str(), |observer| {
                observer.handle_signaling_client_event(&event)
            });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().close_timer.take() {
            timer.abort();
        }
        self.websocket.destroy();
    }
}
