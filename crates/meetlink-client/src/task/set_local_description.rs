use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Task, TaskCanceler};
use crate::context::NegotiationContext;
use crate::error::{ClientError, Result};

const NAME: &str = "SetLocalDescriptionTask";

/// Munges the pending local offer and applies it to the peer connection.
///
/// Transforms run in a fixed order, each behind its own switch: layers
/// allocation extension, H.264 removal, Opus max bitrate, stereo.
pub struct SetLocalDescriptionTask {
    context: Arc<NegotiationContext>,
    canceler: TaskCanceler,
}

impl SetLocalDescriptionTask {
    pub fn new(context: Arc<NegotiationContext>) -> Self {
        Self {
            context,
            canceler: TaskCanceler::new(),
        }
    }
}

#[async_trait]
impl Task for SetLocalDescriptionTask {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> Result<()> {
        let state = self.context.snapshot();
        let offer = state
            .local_offer
            .ok_or_else(|| ClientError::task_failed(NAME, "no local offer"))?;
        let peer = self
            .context
            .peer
            .clone()
            .ok_or_else(|| ClientError::task_failed(NAME, "no peer connection"))?;

        let mut sdp = offer;
        if state.video_layers_allocation_enabled {
            sdp = sdp.with_video_layers_allocation_rtp_header_extension(state.previous_sdp_offer.as_ref());
        }
        if self.context.browser.requires_h264_removal() {
            debug!("removing H.264 from the send section");
            sdp = sdp.remove_h264_support_from_send_section();
        }
        if state.audio_max_average_bitrate_bps.is_some() {
            sdp = sdp.with_audio_max_average_bitrate(state.audio_max_average_bitrate_bps);
        }
        if state.stereo_audio_enabled {
            sdp = sdp.with_stereo_audio();
        }

        self.canceler
            .guard(NAME, async {
                peer.set_local_description(&sdp)
                    .await
                    .map_err(|e| ClientError::task_failed(NAME, e.to_string()))
            })
            .await?;

        info!("set local description ({} bytes)", sdp.as_str().len());
        self.context.state().local_description = Some(sdp);
        Ok(())
    }

    fn cancel(&self) {
        self.canceler.cancel();
    }
}
