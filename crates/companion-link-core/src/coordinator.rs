//! The companion link coordinator.
//!
//! [`CompanionLink`] is the outward surface used by the host application.
//! A send runs four stages in strict order and stops at the first failure:
//!
//! ```text
//! size check -> permission gate -> device resolver -> liveness prober -> dispatcher
//! ```
//!
//! Receiver registration runs the permission gate and device resolver, then
//! hands the device to the [`ReceiverRegistry`]. A configured stage timeout
//! bounds every platform call, subscribe and unsubscribe included.
//!
//! The coordinator is cheap to clone and can be driven from any task or
//! thread; the cached device and the receiver handle are each guarded by
//! their own lock.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::callbacks::{ReceiverCallbacks, SendCallbacks};
use crate::config::LinkConfig;
use crate::device::{CompanionDevice, DeviceCache};
use crate::dispatch::{DeliveryReport, MessageDispatcher};
use crate::error::{LinkError, Result};
use crate::liveness::LivenessProber;
use crate::message::OutboundMessage;
use crate::permission::PermissionGate;
use crate::platform::Platform;
use crate::receiver::{ReceiverRegistry, ReceiverState};
use crate::resolver::DeviceResolver;

/// Coordinates permission, device, liveness and messaging stages.
#[derive(Clone)]
pub struct CompanionLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    config: LinkConfig,
    platform: Platform,
    device: DeviceCache,
    receiver: ReceiverRegistry,
}

impl CompanionLink {
    /// Create a coordinator with no cached device and no receiver.
    pub fn new(config: LinkConfig, platform: Platform) -> Self {
        let receiver = ReceiverRegistry::new().with_deadline(config.stage_timeout());
        Self {
            inner: Arc::new(LinkInner {
                config,
                platform,
                device: DeviceCache::new(),
                receiver,
            }),
        }
    }

    /// The configuration this coordinator was built with.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    /// The device resolved by the most recent operation, if any.
    pub async fn current_device(&self) -> Option<CompanionDevice> {
        self.inner.device.get().await
    }

    /// Whether an inbound receiver is registered.
    pub async fn receiver_state(&self) -> ReceiverState {
        self.inner.receiver.state().await
    }

    /// Returns `true` if permissions are granted and a connected device exists.
    ///
    /// Failures are logged and reported as `false`.
    #[instrument(skip_all, fields(tag = %self.inner.config.logging().log_tag))]
    pub async fn is_connected(&self) -> bool {
        if !self.permission_gate().ensure_granted().await {
            return false;
        }
        match self.resolver().resolve().await {
            Ok(_) => true,
            Err(e) => {
                info!(error = %e, "Companion link is not connected");
                false
            }
        }
    }

    /// Send `payload` to the counterpart app.
    ///
    /// Exactly one of `on_success` / `on_error` fires. Payloads over
    /// [`crate::MAX_PAYLOAD_BYTES`] are rejected before any platform call.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage; the same error is
    /// reported through `callbacks`.
    #[instrument(skip_all, fields(tag = %self.inner.config.logging().log_tag))]
    pub async fn send(
        &self,
        payload: impl Into<Vec<u8>>,
        callbacks: &SendCallbacks,
    ) -> Result<DeliveryReport> {
        let result = self.run_send(payload.into(), callbacks).await;
        match &result {
            Ok(report) => callbacks.success(report),
            Err(e) => {
                warn!(error = %e, code = e.code(), "Send failed");
                callbacks.error(e);
            }
        }
        result
    }

    async fn run_send(
        &self,
        payload: Vec<u8>,
        callbacks: &SendCallbacks,
    ) -> Result<DeliveryReport> {
        let message = OutboundMessage::new(payload)?;
        self.require_permissions().await?;
        let device = self.resolver().resolve().await?;
        callbacks.device_connected(&device.name);
        self.prober().probe().await?;
        self.dispatcher()
            .dispatch(message, |value| callbacks.progress(value))
            .await
    }

    /// Start delivering inbound messages to `callbacks`.
    ///
    /// Any receiver registered earlier is torn down first.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage; the same error is
    /// reported through `callbacks`.
    #[instrument(skip_all, fields(tag = %self.inner.config.logging().log_tag))]
    pub async fn register_receiver(&self, callbacks: ReceiverCallbacks) -> Result<()> {
        let result = self.run_register(callbacks.clone()).await;
        if let Err(e) = &result {
            warn!(error = %e, code = e.code(), "Receiver registration failed");
            callbacks.error(e);
        }
        result
    }

    async fn run_register(&self, callbacks: ReceiverCallbacks) -> Result<()> {
        self.require_permissions().await?;
        let device = self.resolver().resolve().await?;
        self.inner
            .receiver
            .register(
                self.inner.platform.p2p.as_ref(),
                device,
                self.inner.config.counterpart(),
                callbacks,
            )
            .await
    }

    /// Tear down the inbound receiver. A no-op if none is registered.
    #[instrument(skip_all, fields(tag = %self.inner.config.logging().log_tag))]
    pub async fn unregister_receiver(&self) {
        let removed = self
            .inner
            .receiver
            .unregister(self.inner.platform.p2p.as_ref())
            .await;
        if !removed {
            info!("No receiver to unregister");
        }
    }

    /// Tear down the receiver and forget the cached device.
    ///
    /// Afterwards the coordinator is back in its initial state.
    #[instrument(skip_all, fields(tag = %self.inner.config.logging().log_tag))]
    pub async fn release(&self) {
        self.unregister_receiver().await;
        if let Some(device) = self.inner.device.clear().await {
            info!(device = %device.name, "Released companion device");
        }
    }

    /// Run [`CompanionLink::send`] on the current tokio runtime, reporting
    /// only through `callbacks`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_send(
        &self,
        payload: impl Into<Vec<u8>>,
        callbacks: SendCallbacks,
    ) -> JoinHandle<()> {
        let link = self.clone();
        let payload = payload.into();
        tokio::spawn(async move {
            let _ = link.send(payload, &callbacks).await;
        })
    }

    /// Run [`CompanionLink::register_receiver`] on the current tokio
    /// runtime, reporting only through `callbacks`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_register_receiver(&self, callbacks: ReceiverCallbacks) -> JoinHandle<()> {
        let link = self.clone();
        tokio::spawn(async move {
            let _ = link.register_receiver(callbacks).await;
        })
    }

    async fn require_permissions(&self) -> Result<()> {
        if self.permission_gate().ensure_granted().await {
            Ok(())
        } else {
            Err(LinkError::PermissionDenied)
        }
    }

    fn permission_gate(&self) -> PermissionGate<'_> {
        PermissionGate::new(
            self.inner.platform.auth.as_ref(),
            self.inner.config.permissions(),
        )
        .with_deadline(self.inner.config.stage_timeout())
    }

    fn resolver(&self) -> DeviceResolver<'_> {
        DeviceResolver::new(self.inner.platform.devices.as_ref(), &self.inner.device)
            .with_deadline(self.inner.config.stage_timeout())
    }

    fn prober(&self) -> LivenessProber<'_> {
        LivenessProber::new(
            self.inner.platform.p2p.as_ref(),
            &self.inner.device,
            self.inner.config.counterpart(),
        )
        .with_deadline(self.inner.config.stage_timeout())
    }

    fn dispatcher(&self) -> MessageDispatcher<'_> {
        MessageDispatcher::new(
            self.inner.platform.p2p.as_ref(),
            &self.inner.device,
            self.inner.config.counterpart(),
        )
        .with_deadline(self.inner.config.stage_timeout())
    }
}

impl std::fmt::Debug for CompanionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionLink")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
