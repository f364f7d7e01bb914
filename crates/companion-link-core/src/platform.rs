//! Boundary to the vendor companion platform.
//!
//! The platform SDK is a black box reached through three clients:
//!
//! - [`AuthClient`] - permission status and the interactive grant flow
//! - [`DeviceClient`] - bonded device listing
//! - [`P2pClient`] - counterpart ping, message send and inbound subscription
//!
//! Adapters over callback-based SDKs can use [`bridge`] to turn a single
//! completion callback into a future, and progress/frame callbacks into
//! streams.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::config::{Counterpart, Permission};
use crate::device::CompanionDevice;
use crate::error::PlatformError;
use crate::message::MessageEnvelope;

pub mod bridge;
#[cfg(any(test, feature = "mock-platform"))]
pub mod mock;

/// Result type for raw platform calls.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Events produced while a message is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendEvent {
    /// Transfer progress, as reported by the platform.
    Progress(u64),
    /// Terminal result code. Nothing after it is meaningful.
    Result(i32),
}

/// Stream of send events for one message.
pub type SendEvents = BoxStream<'static, SendEvent>;

/// Stream of raw inbound frames for one subscription.
pub type InboundFrames = BoxStream<'static, Vec<u8>>;

/// Outcome of the interactive permission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionGrant {
    /// The user granted this subset of the requested permissions.
    Granted(Vec<Permission>),
    /// The user dismissed the prompt.
    Cancelled,
}

/// Identifies a platform-side inbound subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live platform subscription.
pub struct InboundSubscription {
    /// Id to pass back when unsubscribing.
    pub id: SubscriptionId,
    /// Frames delivered until the subscription is torn down.
    pub frames: InboundFrames,
}

impl fmt::Debug for InboundSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Permission status and grant flow.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Current grant status, one entry per requested permission.
    async fn check_permissions(&self, permissions: &[Permission]) -> PlatformResult<Vec<bool>>;

    /// Show the interactive grant flow.
    async fn request_permissions(
        &self,
        permissions: &[Permission],
    ) -> PlatformResult<PermissionGrant>;
}

/// Bonded device listing.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// All devices bonded with this phone, connected or not.
    async fn bonded_devices(&self) -> PlatformResult<Vec<CompanionDevice>>;
}

/// Peer-to-peer messaging with the counterpart app.
#[async_trait]
pub trait P2pClient: Send + Sync {
    /// Ping the counterpart app. Returns the raw ping result code.
    async fn ping(
        &self,
        device: &CompanionDevice,
        counterpart: Counterpart<'_>,
    ) -> PlatformResult<i32>;

    /// Submit a message. The stream yields progress events followed by one
    /// result event.
    async fn send(
        &self,
        device: &CompanionDevice,
        counterpart: Counterpart<'_>,
        envelope: MessageEnvelope,
    ) -> PlatformResult<SendEvents>;

    /// Start receiving frames from the counterpart app.
    async fn subscribe(
        &self,
        device: &CompanionDevice,
        counterpart: Counterpart<'_>,
    ) -> PlatformResult<InboundSubscription>;

    /// Stop a subscription created by [`P2pClient::subscribe`].
    async fn unsubscribe(
        &self,
        device: &CompanionDevice,
        subscription: SubscriptionId,
    ) -> PlatformResult<()>;
}

/// The three platform clients, shared.
#[derive(Clone)]
pub struct Platform {
    /// Permission client.
    pub auth: Arc<dyn AuthClient>,
    /// Device client.
    pub devices: Arc<dyn DeviceClient>,
    /// Messaging client.
    pub p2p: Arc<dyn P2pClient>,
}

impl Platform {
    /// Bundle separate clients.
    pub fn new(
        auth: Arc<dyn AuthClient>,
        devices: Arc<dyn DeviceClient>,
        p2p: Arc<dyn P2pClient>,
    ) -> Self {
        Self { auth, devices, p2p }
    }

    /// Use one object for all three clients.
    pub fn from_shared<T>(client: Arc<T>) -> Self
    where
        T: AuthClient + DeviceClient + P2pClient + 'static,
    {
        Self {
            auth: client.clone(),
            devices: client.clone(),
            p2p: client,
        }
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_are_object_safe() {
        let mock = Arc::new(mock::MockPlatform::new());
        let platform = Platform::from_shared(mock);
        let _auth: &dyn AuthClient = platform.auth.as_ref();
        let _devices: &dyn DeviceClient = platform.devices.as_ref();
        let _p2p: &dyn P2pClient = platform.p2p.as_ref();
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }
}
