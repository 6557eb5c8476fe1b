use async_trait::async_trait;
use meetlink_core::{SignalFrame, SubscribeAckFrame};
use meetlink_sdp::Sdp;
use std::sync::Arc;
use tracing::info;

use super::{EventInterceptor, Task, TaskCanceler};
use crate::context::NegotiationContext;
use crate::error::{ClientError, Result};
use crate::event::SignalingClientEventType;
use crate::subscribe::SignalingClientSubscribe;

const NAME: &str = "SubscribeAndReceiveSubscribeAckTask";

/// Sends SUBSCRIBE with the local description and waits for the answer
pub struct SubscribeAndReceiveSubscribeAckTask {
    context: Arc<NegotiationContext>,
    canceler: TaskCanceler,
}

impl SubscribeAndReceiveSubscribeAckTask {
    pub fn new(context: Arc<NegotiationContext>) -> Self {
        Self {
            context,
            canceler: TaskCanceler::new(),
        }
    }

    fn build_subscribe(&self) -> SignalingClientSubscribe {
        let state = self.context.snapshot();
        let mut local_sdp = state
            .local_description
            .or(state.local_offer)
            .unwrap_or_default();
        if self.context.browser.requires_unified_plan_munging() {
            local_sdp = local_sdp.with_unified_plan_format();
        }

        SignalingClientSubscribe {
            attendee_id: self.context.meeting.attendee_id.clone(),
            sdp_offer: local_sdp.into_string(),
            compressed_sdp_offer: None,
            audio_host: self.context.meeting.audio_host_url.clone(),
            audio_muted: state.audio_muted,
            audio_checkin: false,
            receive_stream_ids: state.receive_stream_ids,
            local_video_enabled: state.local_video_enabled,
            video_stream_descriptions: state.video_stream_descriptions,
            connection_type_has_video: state.connection_type_has_video,
            video_subscription_configuration: state.video_subscription_configuration,
        }
    }
}

#[async_trait]
impl Task for SubscribeAndReceiveSubscribeAckTask {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> Result<()> {
        let client = self.context.signaling_client.clone();
        let mut interceptor = EventInterceptor::register(client.clone());
        client.subscribe(&self.build_subscribe());

        let ack: SubscribeAckFrame = self
            .canceler
            .guard(NAME, async {
                interceptor
                    .next(|event| {
                        if event.is_connection_terminated() {
                            return Some(Err(ClientError::task_failed(
                                NAME,
                                format!("connection terminated ({})", event.event_type),
                            )));
                        }
                        if event.event_type != SignalingClientEventType::ReceivedSignalFrame {
                            return None;
                        }
                        match &event.message.as_ref()?.frame {
                            SignalFrame::SubscribeAck(ack) => Some(Ok(ack.clone())),
                            _ => None,
                        }
                    })
                    .await
                    .unwrap_or_else(|| Err(ClientError::task_failed(NAME, "signaling client went away")))
            })
            .await?;

        info!(
            "got subscribe ack: {} allocations, {} tracks",
            ack.allocations.len(),
            ack.tracks.len()
        );
        self.context.state().sdp_answer = ack.sdp_answer.map(Sdp::new);
        Ok(())
    }

    fn cancel(&self) {
        self.canceler.cancel();
    }
}
