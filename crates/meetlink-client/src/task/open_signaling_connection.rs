use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

use super::{EventInterceptor, Task, TaskCanceler};
use crate::context::NegotiationContext;
use crate::error::{ClientError, Result};
use crate::event::SignalingClientEventType;
use crate::request::SignalingClientConnectionRequest;

const NAME: &str = "OpenSignalingConnectionTask";

/// Opens the signaling connection and waits for it to be open
pub struct OpenSignalingConnectionTask {
    context: Arc<NegotiationContext>,
    canceler: TaskCanceler,
}

impl OpenSignalingConnectionTask {
    pub fn new(context: Arc<NegotiationContext>) -> Self {
        Self {
            context,
            canceler: TaskCanceler::new(),
        }
    }
}

#[async_trait]
impl Task for OpenSignalingConnectionTask {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> Result<()> {
        let client = self.context.signaling_client.clone();
        let mut interceptor = EventInterceptor::register(client.clone());
        client.open_connection(SignalingClientConnectionRequest::new(
            &self.context.meeting.signaling_url,
            &self.context.meeting.join_token,
        ));

        let started = Instant::now();
        let result = self
            .canceler
            .guard(NAME, async {
                let outcome = interceptor
                    .next(|event| match event.event_type {
                        SignalingClientEventType::WebSocketOpen => Some(Ok(())),
                        SignalingClientEventType::WebSocketFailed => {
                            Some(Err(ClientError::ConnectionFailed("WebSocket connection failed".into())))
                        }
                        _ => None,
                    })
                    .await;
                outcome.unwrap_or_else(|| Err(ClientError::task_failed(NAME, "signaling client went away")))
            })
            .await;

        let elapsed = started.elapsed().as_millis() as u64;
        self.context.state().signaling_open_duration_ms = Some(elapsed);
        if result.is_ok() {
            info!("signaling connection open after {}ms", elapsed);
        }
        result
    }

    fn cancel(&self) {
        self.canceler.cancel();
    }
}
