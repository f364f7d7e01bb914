//! Liveness prober.
//!
//! Pings the counterpart app on the cached device. Only a "running" answer
//! lets the caller continue.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Counterpart;
use crate::deadline::within;
use crate::device::DeviceCache;
use crate::error::{codes, LinkError, PlatformError, Result, Stage};
use crate::platform::P2pClient;

/// Interpretation of a ping result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterpartStatus {
    /// App is installed and running.
    Running,
    /// App is installed but not running.
    NotRunning,
    /// App is not installed.
    NotInstalled,
    /// Any other code.
    Unknown(i32),
}

impl CounterpartStatus {
    /// Classify a raw ping code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            codes::COUNTERPART_RUNNING => Self::Running,
            codes::COUNTERPART_NOT_RUNNING => Self::NotRunning,
            codes::COUNTERPART_NOT_INSTALLED => Self::NotInstalled,
            other => Self::Unknown(other),
        }
    }

    /// `Ok` only for [`CounterpartStatus::Running`].
    ///
    /// # Errors
    ///
    /// Returns the matching [`LinkError`] for every other status.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Running => Ok(()),
            Self::NotRunning => Err(LinkError::CounterpartNotRunning),
            Self::NotInstalled => Err(LinkError::CounterpartNotInstalled),
            Self::Unknown(code) => Err(PlatformError::new(code, "Ping failed").into()),
        }
    }
}

/// Pings the counterpart app.
pub struct LivenessProber<'a> {
    p2p: &'a dyn P2pClient,
    cache: &'a DeviceCache,
    counterpart: Counterpart<'a>,
    deadline: Option<Duration>,
}

impl<'a> LivenessProber<'a> {
    /// Create a prober for the device held in `cache`.
    pub fn new(
        p2p: &'a dyn P2pClient,
        cache: &'a DeviceCache,
        counterpart: Counterpart<'a>,
    ) -> Self {
        Self {
            p2p,
            cache,
            counterpart,
            deadline: None,
        }
    }

    /// Bound the ping by `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Ping the counterpart and require it to be running.
    ///
    /// # Errors
    ///
    /// - [`LinkError::DeviceNotConnected`] if no device has been resolved
    /// - [`LinkError::CounterpartNotRunning`] / [`LinkError::CounterpartNotInstalled`]
    /// - [`LinkError::Platform`] for any other ping code or failure
    pub async fn probe(&self) -> Result<()> {
        let device = self.cache.require().await?;

        let code = within(Stage::Liveness, self.deadline, async {
            Ok(self.p2p.ping(&device, self.counterpart).await?)
        })
        .await?;

        let status = CounterpartStatus::from_code(code);
        debug!(device = %device.name, ?status, "Ping answered");
        status.into_result().map_err(|e| {
            warn!(error = %e, code = e.code(), "Counterpart is not reachable");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::error::DisconnectReason;
    use crate::platform::mock::{connected_watch, MockPlatform};

    fn config() -> LinkConfig {
        LinkConfig::builder()
            .package_name("com.example.watch")
            .debug_fingerprint("a".repeat(64))
            .release_fingerprint("b".repeat(64))
            .build()
            .unwrap()
    }

    #[test]
    fn test_status_from_code() {
        assert_eq!(
            CounterpartStatus::from_code(codes::COUNTERPART_RUNNING),
            CounterpartStatus::Running
        );
        assert_eq!(
            CounterpartStatus::from_code(codes::COUNTERPART_NOT_RUNNING),
            CounterpartStatus::NotRunning
        );
        assert_eq!(
            CounterpartStatus::from_code(codes::COUNTERPART_NOT_INSTALLED),
            CounterpartStatus::NotInstalled
        );
        assert_eq!(CounterpartStatus::from_code(203), CounterpartStatus::Unknown(203));
    }

    #[tokio::test]
    async fn test_probe_requires_cached_device() {
        let mock = MockPlatform::new();
        let cache = DeviceCache::new();
        let config = config();

        let err = LivenessProber::new(&mock, &cache, config.counterpart())
            .probe()
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LinkError::DeviceNotConnected(DisconnectReason::NoCachedDevice)
        );
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_probe_outcomes() {
        let config = config();
        let cases = [
            (codes::COUNTERPART_RUNNING, None),
            (codes::COUNTERPART_NOT_RUNNING, Some(LinkError::CounterpartNotRunning)),
            (codes::COUNTERPART_NOT_INSTALLED, Some(LinkError::CounterpartNotInstalled)),
        ];

        for (code, expected) in cases {
            let mock = MockPlatform::new();
            mock.set_ping(Ok(code));
            let cache = DeviceCache::new();
            cache.store(connected_watch()).await;

            let result = LivenessProber::new(&mock, &cache, config.counterpart())
                .probe()
                .await;
            assert_eq!(result.err(), expected, "ping code {code}");
        }
    }

    #[tokio::test]
    async fn test_unknown_code_is_generic_failure() {
        let mock = MockPlatform::new();
        mock.set_ping(Ok(203));
        let cache = DeviceCache::new();
        cache.store(connected_watch()).await;
        let config = config();

        let err = LivenessProber::new(&mock, &cache, config.counterpart())
            .probe()
            .await
            .unwrap_err();
        assert_eq!(err.code(), 203);
        assert_eq!(err.error_code(), "PLATFORM_FAILURE");
    }
}
