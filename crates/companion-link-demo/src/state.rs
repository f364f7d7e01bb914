//! Session state shared across the demo run.

use std::sync::Arc;
use std::time::Duration;

use companion_link_core::platform::mock::MockPlatform;
use companion_link_core::{
    CompanionLink, ConfigResult, DeliveryReport, LinkConfig, Platform, ReceiverCallbacks,
    SendCallbacks,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::error::DemoError;
use crate::scenario::Scenario;

/// Configuration used when no config file exists.
///
/// # Errors
///
/// Never fails for the built-in values; the `Result` mirrors
/// [`LinkConfig::load`].
pub fn sample_config() -> ConfigResult<LinkConfig> {
    LinkConfig::builder()
        .package_name("com.example.watchface")
        .next_gen_package_name("com.example.watchface.nextgen")
        .next_gen_app_id("com.example.watchface.companion")
        .debug_fingerprint(fingerprint("AB"))
        .release_fingerprint(fingerprint("CD"))
        .log_tag("companion-link-demo")
        .build()
}

fn fingerprint(pair: &str) -> String {
    vec![pair; 32].join(":")
}

/// Shared session state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    link: CompanionLink,
    platform: Arc<MockPlatform>,
    inbox_tx: mpsc::UnboundedSender<String>,
    inbox_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl AppState {
    /// Create a session against a platform scripted for `scenario`.
    #[must_use]
    pub fn new(config: LinkConfig, scenario: Scenario) -> Self {
        let platform = Arc::new(MockPlatform::new());
        scenario.apply(&platform);
        info!(%scenario, "Scripted platform ready");
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(AppStateInner {
                link: CompanionLink::new(config, Platform::from_shared(platform.clone())),
                platform,
                inbox_tx,
                inbox_rx: Mutex::new(inbox_rx),
            }),
        }
    }

    /// The coordinator.
    #[must_use]
    pub fn link(&self) -> &CompanionLink {
        &self.inner.link
    }

    /// Wait up to `limit` for the next inbound message, in arrival order.
    pub async fn next_message(&self, limit: Duration) -> Option<String> {
        let mut inbox = self.inner.inbox_rx.lock().await;
        tokio::time::timeout(limit, inbox.recv()).await.ok().flatten()
    }

    /// Register a receiver that queues inbound messages into the inbox.
    ///
    /// # Errors
    ///
    /// Returns the coordinator's error if registration fails.
    pub async fn listen(&self) -> Result<(), DemoError> {
        let inbox = self.inner.inbox_tx.clone();
        let callbacks = ReceiverCallbacks::new(move |text| {
            info!(message = %text, "Message from companion");
            let _ = inbox.send(text);
        })
        .on_device_connected(|name| info!(device = %name, "Listening on device"));

        self.inner.link.register_receiver(callbacks).await?;
        Ok(())
    }

    /// Simulate the companion app sending `text` back to the phone.
    ///
    /// Returns the number of receivers the frame reached.
    #[must_use]
    pub fn simulate_reply(&self, text: &str) -> usize {
        self.inner.platform.push_inbound(text.as_bytes())
    }

    /// Send `message` to the companion app.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error.
    pub async fn send(&self, message: &str) -> Result<DeliveryReport, DemoError> {
        let callbacks = SendCallbacks::new()
            .on_device_connected(|name| info!(device = %name, "Device connected"))
            .on_progress(|value| info!(progress = value, "Transfer progress"))
            .on_error(|message, code| warn!(code, "{message}"));

        Ok(self.inner.link.send(message, &callbacks).await?)
    }

    /// Tear the session down.
    pub async fn shutdown(&self) {
        self.inner.link.release().await;
    }
}
