//! Companion device records and the coordinator's cached device.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{DisconnectReason, LinkError, Result};

/// A bonded wearable as reported by the platform.
///
/// This is a snapshot of state owned by the platform service; the
/// coordinator re-resolves it on every operation that needs a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionDevice {
    /// Platform-assigned device identifier.
    pub id: String,
    /// Human-readable name, e.g. "WATCH GT 4-1A2".
    pub name: String,
    /// Hardware model string.
    pub model: String,
    /// Whether the device is currently connected.
    pub connected: bool,
}

impl CompanionDevice {
    /// Create a device record.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        model: impl Into<String>,
        connected: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: model.into(),
            connected,
        }
    }

    /// Returns `true` if the connectivity flag is set.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Holds zero or one device reference.
///
/// Writers are serialized by the lock; readers get a clone so no guard is
/// held across platform calls.
#[derive(Debug, Default)]
pub struct DeviceCache {
    slot: RwLock<Option<CompanionDevice>>,
}

impl DeviceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached device.
    pub async fn store(&self, device: CompanionDevice) {
        *self.slot.write().await = Some(device);
    }

    /// Drop the cached device, returning it if there was one.
    pub async fn clear(&self) -> Option<CompanionDevice> {
        self.slot.write().await.take()
    }

    /// The cached device, if any.
    pub async fn get(&self) -> Option<CompanionDevice> {
        self.slot.read().await.clone()
    }

    /// The cached device, or [`LinkError::DeviceNotConnected`] if none was resolved.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache is empty.
    pub async fn require(&self) -> Result<CompanionDevice> {
        self.get()
            .await
            .ok_or(LinkError::DeviceNotConnected(DisconnectReason::NoCachedDevice))
    }
}
