use async_trait::async_trait;
use meetlink_core::SignalFrame;
use std::sync::Arc;
use tracing::info;

use super::{EventInterceptor, Task, TaskCanceler};
use crate::context::NegotiationContext;
use crate::error::{ClientError, Result};
use crate::event::SignalingClientEventType;

const NAME: &str = "JoinAndReceiveIndexTask";

/// Sends JOIN and waits for the first INDEX
pub struct JoinAndReceiveIndexTask {
    context: Arc<NegotiationContext>,
    canceler: TaskCanceler,
}

impl JoinAndReceiveIndexTask {
    pub fn new(context: Arc<NegotiationContext>) -> Self {
        Self {
            context,
            canceler: TaskCanceler::new(),
        }
    }
}

#[async_trait]
impl Task for JoinAndReceiveIndexTask {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> Result<()> {
        let client = self.context.signaling_client.clone();
        let mut interceptor = EventInterceptor::register(client.clone());
        let join = self.context.state().join.clone();
        client.join(&join);

        let index = self
            .canceler
            .guard(NAME, async {
                interceptor
                    .next(|event| {
                        if event.event_type != SignalingClientEventType::ReceivedSignalFrame {
                            return None;
                        }
                        match &event.message.as_ref()?.frame {
                            SignalFrame::Index(index) => Some(index.clone()),
                            _ => None,
                        }
                    })
                    .await
                    .ok_or_else(|| ClientError::task_failed(NAME, "signaling client went away"))
            })
            .await?;

        info!(
            "received first index: {} sources, at capacity: {}",
            index.sources.len(),
            index.at_capacity
        );
        self.context.state().index_frame = Some(index);
        Ok(())
    }

    fn cancel(&self) {
        self.canceler.cancel();
    }
}
