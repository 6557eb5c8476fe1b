//! Negotiation tasks
//!
//! Each task is one cancelable attempt at a step of session setup. `run`
//! resolves on success and fails on error or cancellation; `cancel` may be
//! called any number of times, before, during or after `run`.

mod join_and_receive_index;
mod leave_and_receive_leave_ack;
mod open_signaling_connection;
mod promote_to_primary_meeting;
mod set_local_description;
mod subscribe_and_receive_subscribe_ack;

pub use join_and_receive_index::JoinAndReceiveIndexTask;
pub use leave_and_receive_leave_ack::LeaveAndReceiveLeaveAckTask;
pub use open_signaling_connection::OpenSignalingConnectionTask;
pub use promote_to_primary_meeting::{PrimaryMeetingStatus, PromoteToPrimaryMeetingTask};
pub use set_local_description::SetLocalDescriptionTask;
pub use subscribe_and_receive_subscribe_ack::SubscribeAndReceiveSubscribeAckTask;

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use crate::client::SignalingClient;
use crate::error::{ClientError, Result};
use crate::event::SignalingClientEvent;
use crate::observer::SignalingClientObserver;

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;

    fn cancel(&self);
}

/// One-shot cancellation flag that wakes waiters
#[derive(Debug, Default)]
pub struct TaskCanceler {
    canceled: AtomicBool,
    notify: Notify,
}

impl TaskCanceler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only for the call that actually canceled
    pub fn cancel(&self) -> bool {
        let first = !self.canceled.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn canceled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `work` unless canceled first; cancellation wins ties
    pub async fn guard<T>(&self, task: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.canceled() => Err(ClientError::TaskCanceled(task.to_string())),
            result = work => result,
        }
    }
}

/// Observer that forwards client events into a channel, removed on drop
pub(crate) struct EventInterceptor {
    client: Arc<dyn SignalingClient>,
    observer: Arc<dyn SignalingClientObserver>,
    rx: mpsc::UnboundedReceiver<SignalingClientEvent>,
}

impl EventInterceptor {
    /// Register before sending the request so the response cannot be missed
    pub(crate) fn register(client: Arc<dyn SignalingClient>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer: Arc<dyn SignalingClientObserver> =
            Arc::new(move |event: &SignalingClientEvent| {
                let _ = tx.send(event.clone());
            });
        client.register_observer(observer.clone());
        Self { client, observer, rx }
    }

    /// Next event for which `select` returns a value
    pub(crate) async fn next<T>(
        &mut self,
        mut select: impl FnMut(&SignalingClientEvent) -> Option<T>,
    ) -> Option<T> {
        while let Some(event) = self.rx.recv().await {
            if let Some(value) = select(&event) {
                return Some(value);
            }
        }
        None
    }
}

impl Drop for EventInterceptor {
    fn drop(&mut self) {
        self.client.remove_observer(&self.observer);
    }
}
