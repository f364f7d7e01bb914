//! Scripted platform scenarios.
//!
//! The demo has no real wearable to talk to, so each run scripts the
//! in-memory platform into one of a handful of well-known situations.

use std::fmt;
use std::str::FromStr;

use companion_link_core::platform::mock::MockPlatform;
use companion_link_core::{codes, CompanionDevice, PermissionGrant};

use crate::error::DemoError;

/// Situation the scripted platform reproduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scenario {
    /// Everything granted, a connected watch, counterpart running.
    #[default]
    Ok,
    /// Permissions missing and the user cancels the request.
    Denied,
    /// The only bonded watch is out of range.
    NoDevice,
    /// Counterpart app absent from the watch.
    NotInstalled,
    /// Counterpart app installed but not running.
    NotRunning,
}

impl Scenario {
    /// All scenarios, in display order.
    pub const ALL: [Self; 5] = [
        Self::Ok,
        Self::Denied,
        Self::NoDevice,
        Self::NotInstalled,
        Self::NotRunning,
    ];

    /// Script `platform` for this scenario.
    pub fn apply(self, platform: &MockPlatform) {
        match self {
            Self::Ok => {}
            Self::Denied => {
                platform.set_permission_status(Ok(vec![false]));
                platform.set_permission_request(Ok(PermissionGrant::Cancelled));
            }
            Self::NoDevice => {
                platform.set_devices(Ok(vec![CompanionDevice::new(
                    "watch-01",
                    "Watch 4 Pro",
                    "MDS-B19",
                    false,
                )]));
            }
            Self::NotInstalled => platform.set_ping(Ok(codes::COUNTERPART_NOT_INSTALLED)),
            Self::NotRunning => platform.set_ping(Ok(codes::COUNTERPART_NOT_RUNNING)),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Denied => "denied",
            Self::NoDevice => "no-device",
            Self::NotInstalled => "not-installed",
            Self::NotRunning => "not-running",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == wanted)
            .ok_or_else(|| DemoError::UnknownScenario(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_link_core::platform::mock::PlatformCall;
    use companion_link_core::{DeviceClient, P2pClient};

    #[test]
    fn test_parse_round_trips_display() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.to_string().parse::<Scenario>().unwrap(), scenario);
        }
        assert_eq!(" Not-Running ".parse::<Scenario>().unwrap(), Scenario::NotRunning);
    }

    #[test]
    fn test_unknown_scenario_is_rejected() {
        let err = "flaky".parse::<Scenario>().unwrap_err();
        assert!(matches!(err, DemoError::UnknownScenario(ref s) if s == "flaky"));
    }

    #[tokio::test]
    async fn test_no_device_scripts_disconnected_watch() {
        let platform = MockPlatform::new();
        Scenario::NoDevice.apply(&platform);
        let devices = platform.bonded_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(!devices[0].is_connected());
        assert_eq!(platform.calls(), vec![PlatformCall::BondedDevices]);
    }

    #[tokio::test]
    async fn test_not_running_scripts_ping_code() {
        let platform = MockPlatform::new();
        Scenario::NotRunning.apply(&platform);
        let config = crate::state::sample_config().unwrap();
        let device = companion_link_core::platform::mock::connected_watch();
        let code = platform.ping(&device, config.counterpart()).await.unwrap();
        assert_eq!(code, codes::COUNTERPART_NOT_RUNNING);
    }
}
