use async_trait::async_trait;
use meetlink_core::{MeetingSessionCredentials, SignalFrame};
use std::sync::Arc;
use tracing::info;

use super::{EventInterceptor, Task, TaskCanceler};
use crate::context::NegotiationContext;
use crate::error::Result;
use crate::event::SignalingClientEventType;

const NAME: &str = "PromoteToPrimaryMeetingTask";

/// Outcome reported to the completion callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryMeetingStatus {
    Joined,
    /// The server answered with an error status
    Rejected { status: u32, description: String },
    /// Not sent, connection lost, or canceled
    SignalingRequestFailed,
}

pub type PrimaryMeetingCompletion = Box<dyn Fn(PrimaryMeetingStatus) + Send + Sync>;

/// Sends PRIMARY_MEETING_JOIN and waits for the ack. Every path reports
/// exactly one status through the completion callback.
pub struct PromoteToPrimaryMeetingTask {
    context: Arc<NegotiationContext>,
    credentials: MeetingSessionCredentials,
    completion: PrimaryMeetingCompletion,
    canceler: TaskCanceler,
}

impl PromoteToPrimaryMeetingTask {
    pub fn new(
        context: Arc<NegotiationContext>,
        credentials: MeetingSessionCredentials,
        completion: impl Fn(PrimaryMeetingStatus) + Send + Sync + 'static,
    ) -> Self {
        Self {
            context,
            credentials,
            completion: Box::new(completion),
            canceler: TaskCanceler::new(),
        }
    }
}

#[async_trait]
impl Task for PromoteToPrimaryMeetingTask {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> Result<()> {
        let client = self.context.signaling_client.clone();
        if !client.ready() {
            (self.completion)(PrimaryMeetingStatus::SignalingRequestFailed);
            return Ok(());
        }

        let mut interceptor = EventInterceptor::register(client.clone());
        client.promote_to_primary_meeting(&self.credentials);
        info!("sent request to join primary meeting");

        let result = self
            .canceler
            .guard(NAME, async {
                let status = interceptor
                    .next(|event| {
                        if event.is_connection_terminated() {
                            info!("{} connection terminated", NAME);
                            return Some(PrimaryMeetingStatus::SignalingRequestFailed);
                        }
                        if event.event_type != SignalingClientEventType::ReceivedSignalFrame {
                            return None;
                        }
                        let message = event.message.as_ref()?;
                        if !matches!(message.frame, SignalFrame::PrimaryMeetingJoinAck(_)) {
                            return None;
                        }
                        info!("got a primary meeting join ack");
                        Some(match &message.error {
                            Some(error) => PrimaryMeetingStatus::Rejected {
                                status: error.status,
                                description: error.description.clone(),
                            },
                            None => PrimaryMeetingStatus::Joined,
                        })
                    })
                    .await
                    .unwrap_or(PrimaryMeetingStatus::SignalingRequestFailed);
                Ok(status)
            })
            .await;

        match result {
            Ok(status) => {
                (self.completion)(status);
                Ok(())
            }
            Err(e) => {
                (self.completion)(PrimaryMeetingStatus::SignalingRequestFailed);
                Err(e)
            }
        }
    }

    fn cancel(&self) {
        self.canceler.cancel();
    }
}
