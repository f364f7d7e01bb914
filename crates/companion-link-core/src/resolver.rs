//! Device resolver.
//!
//! Picks the first bonded device whose connectivity flag is set and caches
//! it. An empty or all-disconnected list is reported as
//! [`LinkError::DeviceNotConnected`]; platform failures pass through with
//! their own code.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::deadline::within;
use crate::device::{CompanionDevice, DeviceCache};
use crate::error::{DisconnectReason, LinkError, Result, Stage};
use crate::platform::DeviceClient;

/// Resolves the connected companion device.
pub struct DeviceResolver<'a> {
    devices: &'a dyn DeviceClient,
    cache: &'a DeviceCache,
    deadline: Option<Duration>,
}

impl<'a> DeviceResolver<'a> {
    /// Create a resolver that stores its result in `cache`.
    pub fn new(devices: &'a dyn DeviceClient, cache: &'a DeviceCache) -> Self {
        Self {
            devices,
            cache,
            deadline: None,
        }
    }

    /// Bound the device listing by `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// List bonded devices and cache the first connected one.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::DeviceNotConnected`] if no bonded device is
    /// connected, or the platform's own error if the listing fails.
    pub async fn resolve(&self) -> Result<CompanionDevice> {
        let bonded = within(Stage::DeviceResolution, self.deadline, async {
            Ok(self.devices.bonded_devices().await?)
        })
        .await
        .map_err(|e| {
            warn!(error = %e, code = e.code(), "Failed to list bonded devices");
            e
        })?;

        debug!(bonded = bonded.len(), "Bonded devices listed");

        let Some(device) = bonded.into_iter().find(CompanionDevice::is_connected) else {
            info!("No connected companion device");
            return Err(LinkError::DeviceNotConnected(
                DisconnectReason::NoConnectedDevice,
            ));
        };

        self.cache.store(device.clone()).await;
        info!(device = %device.name, model = %device.model, "Companion device identified");
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::platform::mock::{connected_watch, MockPlatform};

    #[tokio::test]
    async fn test_first_connected_device_is_cached() {
        let mock = MockPlatform::new();
        let band = CompanionDevice::new("band-01", "Band 9", "KIM-B19", true);
        mock.set_devices(Ok(vec![
            CompanionDevice::new("old-01", "Watch 3", "GLL-AL01", false),
            band.clone(),
            connected_watch(),
        ]));
        let cache = DeviceCache::new();

        let device = DeviceResolver::new(&mock, &cache).resolve().await.unwrap();
        assert_eq!(device, band);
        assert_eq!(cache.get().await, Some(band));
    }

    #[tokio::test]
    async fn test_disconnected_device_reports_not_connected() {
        let mock = MockPlatform::new();
        mock.set_devices(Ok(vec![CompanionDevice::new(
            "watch-01", "Watch 4", "MDS-B19", false,
        )]));
        let cache = DeviceCache::new();

        let err = DeviceResolver::new(&mock, &cache).resolve().await.unwrap_err();
        assert_eq!(
            err,
            LinkError::DeviceNotConnected(DisconnectReason::NoConnectedDevice)
        );
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_list() {
        let mock = MockPlatform::new();
        mock.set_devices(Ok(Vec::new()));
        let cache = DeviceCache::new();

        let err = DeviceResolver::new(&mock, &cache).resolve().await.unwrap_err();
        assert!(err.is_device_error());
    }

    #[tokio::test]
    async fn test_platform_failure_passes_through() {
        let mock = MockPlatform::new();
        mock.set_devices(Err(PlatformError::new(1003, "service unreachable")));
        let cache = DeviceCache::new();

        let err = DeviceResolver::new(&mock, &cache).resolve().await.unwrap_err();
        assert_eq!(err.code(), 1003);
        assert!(err.to_string().contains("service unreachable"));
    }
}
