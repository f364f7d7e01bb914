//! Receiver registry.
//!
//! Holds at most one inbound subscription. Registering again tears the old
//! one down first, so a frame is never delivered twice. Teardown aborts the
//! forwarding task and waits for it to finish before returning: once
//! [`ReceiverRegistry::unregister`] completes, the old handlers are never
//! called again.
//!
//! If the platform ends the inbound stream on its own, the handle is
//! dropped the next time the registry is touched and the state reads
//! [`ReceiverState::Unregistered`]. No unsubscribe is sent for it.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::callbacks::ReceiverCallbacks;
use crate::config::Counterpart;
use crate::deadline;
use crate::device::CompanionDevice;
use crate::error::{LinkError, Result, Stage};
use crate::message::decode_inbound;
use crate::platform::{InboundFrames, P2pClient, SubscriptionId};

/// Registration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// No live subscription.
    Unregistered,
    /// One live subscription.
    Registered,
}

#[derive(Debug)]
struct ReceiverHandle {
    subscription: SubscriptionId,
    device: CompanionDevice,
    forwarder: JoinHandle<()>,
}

/// Owns the single inbound receiver handle.
#[derive(Debug, Default)]
pub struct ReceiverRegistry {
    slot: Mutex<Option<ReceiverHandle>>,
    deadline: Option<Duration>,
}

impl ReceiverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each subscribe and unsubscribe call by `limit`.
    #[must_use]
    pub const fn with_deadline(mut self, limit: Option<Duration>) -> Self {
        self.deadline = limit;
        self
    }

    /// Current state.
    pub async fn state(&self) -> ReceiverState {
        let mut slot = self.slot.lock().await;
        prune_ended(&mut slot);
        if slot.is_some() {
            ReceiverState::Registered
        } else {
            ReceiverState::Unregistered
        }
    }

    /// Subscribe to frames from `device`, replacing any previous receiver.
    ///
    /// On success `callbacks` is told the device name and then receives
    /// every inbound frame as text.
    ///
    /// # Errors
    ///
    /// Returns the platform's error if the subscription is rejected, or
    /// [`LinkError::StageTimedOut`] if it does not complete within the
    /// deadline; the registry is then left unregistered.
    pub async fn register(
        &self,
        p2p: &dyn P2pClient,
        device: CompanionDevice,
        counterpart: Counterpart<'_>,
        callbacks: ReceiverCallbacks,
    ) -> Result<()> {
        let mut slot = self.slot.lock().await;
        prune_ended(&mut slot);
        if let Some(previous) = slot.take() {
            debug!(subscription = %previous.subscription, "Replacing existing receiver");
            self.teardown(p2p, previous).await;
        }

        let subscription = deadline::within(Stage::Registration, self.deadline, async {
            p2p.subscribe(&device, counterpart).await.map_err(|e| {
                warn!(error = %e, code = e.code, "Receiver registration rejected");
                LinkError::from(e)
            })
        })
        .await?;

        info!(subscription = %subscription.id, device = %device.name, "Receiver registered");
        callbacks.device_connected(&device.name);
        let forwarder = tokio::spawn(forward(subscription.frames, callbacks));
        *slot = Some(ReceiverHandle {
            subscription: subscription.id,
            device,
            forwarder,
        });
        Ok(())
    }

    /// Tear down the receiver. Returns `false` if none was registered.
    pub async fn unregister(&self, p2p: &dyn P2pClient) -> bool {
        let mut slot = self.slot.lock().await;
        prune_ended(&mut slot);
        match slot.take() {
            Some(handle) => {
                self.teardown(p2p, handle).await;
                true
            }
            None => false,
        }
    }

    async fn teardown(&self, p2p: &dyn P2pClient, handle: ReceiverHandle) {
        handle.forwarder.abort();
        // Wait for the task so no handler runs after this returns.
        let _ = handle.forwarder.await;

        let unsubscribe = deadline::within(Stage::Registration, self.deadline, async {
            Ok(p2p.unsubscribe(&handle.device, handle.subscription).await?)
        });
        if let Err(e) = unsubscribe.await {
            warn!(subscription = %handle.subscription, error = %e, "Platform unsubscribe failed");
        } else {
            info!(subscription = %handle.subscription, "Receiver unregistered");
        }
    }
}

/// Drop a handle whose inbound stream the platform already ended.
fn prune_ended(slot: &mut Option<ReceiverHandle>) {
    if slot.as_ref().is_some_and(|handle| handle.forwarder.is_finished()) {
        if let Some(handle) = slot.take() {
            info!(subscription = %handle.subscription, "Inbound stream closed by platform");
        }
    }
}

async fn forward(mut frames: InboundFrames, callbacks: ReceiverCallbacks) {
    while let Some(frame) = frames.next().await {
        debug!(bytes = frame.len(), "Inbound frame");
        callbacks.message_received(decode_inbound(&frame));
    }
    debug!("Inbound stream ended");
}
