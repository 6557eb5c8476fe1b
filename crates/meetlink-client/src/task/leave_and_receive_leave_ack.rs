use async_trait::async_trait;
use meetlink_core::SignalFrame;
use std::sync::Arc;
use tracing::info;

use super::{EventInterceptor, Task, TaskCanceler};
use crate::context::NegotiationContext;
use crate::error::Result;
use crate::event::SignalingClientEventType;

const NAME: &str = "LeaveAndReceiveLeaveAckTask";

/// Sends LEAVE and waits for the server to acknowledge it.
///
/// Nothing to do when the client is not ready. A connection that goes away
/// while waiting also counts as left.
pub struct LeaveAndReceiveLeaveAckTask {
    context: Arc<NegotiationContext>,
    canceler: TaskCanceler,
}

impl LeaveAndReceiveLeaveAckTask {
    pub fn new(context: Arc<NegotiationContext>) -> Self {
        Self {
            context,
            canceler: TaskCanceler::new(),
        }
    }
}

#[async_trait]
impl Task for LeaveAndReceiveLeaveAckTask {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> Result<()> {
        let client = self.context.signaling_client.clone();
        if !client.ready() {
            info!("signaling client not ready, skipping leave");
            return Ok(());
        }

        let mut interceptor = EventInterceptor::register(client.clone());
        client.leave();

        self.canceler
            .guard(NAME, async {
                let acked = interceptor
                    .next(|event| {
                        if event.is_connection_terminated() {
                            return Some(false);
                        }
                        if event.event_type != SignalingClientEventType::ReceivedSignalFrame {
                            return None;
                        }
                        match event.message.as_ref()?.frame {
                            SignalFrame::LeaveAck(_) => Some(true),
                            _ => None,
                        }
                    })
                    .await;
                match acked {
                    Some(true) => info!("got leave ack"),
                    _ => info!("connection ended before leave ack"),
                }
                Ok(())
            })
            .await
    }

    fn cancel(&self) {
        self.canceler.cancel();
    }
}
