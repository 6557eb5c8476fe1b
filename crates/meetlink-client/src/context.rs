//! State shared by the negotiation tasks

use async_trait::async_trait;
use meetlink_core::{IndexFrame, StreamDescriptor, VideoSubscriptionConfiguration};
use meetlink_sdp::Sdp;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

use crate::browser::BrowserBehavior;
use crate::client::SignalingClient;
use crate::error::Result;
use crate::join::SignalingClientJoin;

/// The local WebRTC peer connection, as far as negotiation needs it
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn set_local_description(&self, sdp: &Sdp) -> Result<()>;
}

/// Where and as whom to join
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingConfiguration {
    pub signaling_url: String,
    pub join_token: String,
    pub attendee_id: String,
    pub audio_host_url: String,
}

/// Mutable negotiation state; tasks read inputs and store results here
#[derive(Debug, Clone, Default)]
pub struct NegotiationState {
    /// Offer produced by the peer connection, before munging
    pub local_offer: Option<Sdp>,
    /// Offer of the previous negotiation, for stable extension IDs
    pub previous_sdp_offer: Option<Sdp>,
    /// Munged offer handed to the peer connection
    pub local_description: Option<Sdp>,
    pub sdp_answer: Option<Sdp>,
    pub index_frame: Option<IndexFrame>,
    pub signaling_open_duration_ms: Option<u64>,

    pub video_layers_allocation_enabled: bool,
    pub audio_max_average_bitrate_bps: Option<f64>,
    pub stereo_audio_enabled: bool,

    pub join: SignalingClientJoin,
    pub audio_muted: bool,
    pub local_video_enabled: bool,
    pub connection_type_has_video: bool,
    pub receive_stream_ids: Vec<u32>,
    pub video_stream_descriptions: Vec<StreamDescriptor>,
    pub video_subscription_configuration: Vec<VideoSubscriptionConfiguration>,
}

pub struct NegotiationContext {
    pub signaling_client: Arc<dyn SignalingClient>,
    pub peer: Option<Arc<dyn PeerConnection>>,
    pub browser: Arc<dyn BrowserBehavior>,
    pub meeting: MeetingConfiguration,
    state: Mutex<NegotiationState>,
}

impl NegotiationContext {
    pub fn new(
        signaling_client: Arc<dyn SignalingClient>,
        browser: Arc<dyn BrowserBehavior>,
        meeting: MeetingConfiguration,
    ) -> Self {
        Self {
            signaling_client,
            peer: None,
            browser,
            meeting,
            state: Mutex::new(NegotiationState::default()),
        }
    }

    pub fn with_peer(mut self, peer: Arc<dyn PeerConnection>) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Lock the state. Never hold the guard across an await.
    pub fn state(&self) -> MutexGuard<'_, NegotiationState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> NegotiationState {
        self.state.lock().clone()
    }
}
