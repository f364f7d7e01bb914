//! Permission gate.
//!
//! Checks the configured permissions and, when any is missing, shows the
//! platform's interactive grant flow. The gate answers a single yes/no and
//! never fails: platform errors, timeouts and a dismissed prompt all count
//! as "not granted".

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Permission;
use crate::deadline::within;
use crate::error::Stage;
use crate::platform::{AuthClient, PermissionGrant};

/// Check-then-request sequencing for the configured permission set.
pub struct PermissionGate<'a> {
    auth: &'a dyn AuthClient,
    permissions: &'a [Permission],
    deadline: Option<Duration>,
}

impl<'a> PermissionGate<'a> {
    /// Create a gate for `permissions`.
    pub fn new(auth: &'a dyn AuthClient, permissions: &'a [Permission]) -> Self {
        Self {
            auth,
            permissions,
            deadline: None,
        }
    }

    /// Bound each platform call by `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns `true` once every required permission is granted.
    ///
    /// May show an authorization prompt to the user.
    pub async fn ensure_granted(&self) -> bool {
        let status = within(Stage::Permission, self.deadline, async {
            Ok(self.auth.check_permissions(self.permissions).await?)
        })
        .await;

        match status {
            Ok(status) if self.all_granted(&status) => {
                debug!("Permissions already granted");
                return true;
            }
            Ok(_) => debug!("Permissions missing, requesting"),
            Err(e) => {
                warn!(error = %e, code = e.code(), "Permission check failed");
                return false;
            }
        }

        let grant = within(Stage::Permission, self.deadline, async {
            Ok(self.auth.request_permissions(self.permissions).await?)
        })
        .await;

        match grant {
            Ok(PermissionGrant::Granted(granted)) => {
                let complete = self.permissions.iter().all(|p| granted.contains(p));
                if complete {
                    info!("Permissions granted by user");
                } else {
                    warn!(?granted, required = ?self.permissions, "Only some permissions were granted");
                }
                complete
            }
            Ok(PermissionGrant::Cancelled) => {
                info!("Permission request cancelled by user");
                false
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "Permission request failed");
                false
            }
        }
    }

    fn all_granted(&self, status: &[bool]) -> bool {
        status.len() == self.permissions.len() && status.iter().all(|granted| *granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::platform::mock::{MockPlatform, PlatformCall};

    const PERMISSIONS: &[Permission] = &[Permission::DeviceManager, Permission::Sensor];

    #[tokio::test]
    async fn test_granted_skips_request() {
        let mock = MockPlatform::new();
        assert!(PermissionGate::new(&mock, PERMISSIONS).ensure_granted().await);
        assert_eq!(mock.calls(), vec![PlatformCall::CheckPermissions]);
    }

    #[tokio::test]
    async fn test_missing_permission_is_requested() {
        let mock = MockPlatform::new();
        mock.set_permission_status(Ok(vec![true, false]));
        assert!(PermissionGate::new(&mock, PERMISSIONS).ensure_granted().await);
        assert_eq!(
            mock.calls(),
            vec![PlatformCall::CheckPermissions, PlatformCall::RequestPermissions]
        );
    }

    #[tokio::test]
    async fn test_cancelled_request_is_denied() {
        let mock = MockPlatform::new();
        mock.set_permission_status(Ok(vec![false, false]));
        mock.set_permission_request(Ok(PermissionGrant::Cancelled));
        assert!(!PermissionGate::new(&mock, PERMISSIONS).ensure_granted().await);
    }

    #[tokio::test]
    async fn test_partial_grant_is_denied() {
        let mock = MockPlatform::new();
        mock.set_permission_status(Ok(vec![false, false]));
        mock.set_permission_request(Ok(PermissionGrant::Granted(vec![Permission::Sensor])));
        assert!(!PermissionGate::new(&mock, PERMISSIONS).ensure_granted().await);
    }

    #[tokio::test]
    async fn test_short_status_is_not_granted() {
        let mock = MockPlatform::new();
        mock.set_permission_status(Ok(vec![true]));
        mock.set_permission_request(Ok(PermissionGrant::Cancelled));
        assert!(!PermissionGate::new(&mock, PERMISSIONS).ensure_granted().await);
        assert_eq!(mock.count_calls(|c| *c == PlatformCall::RequestPermissions), 1);
    }

    #[tokio::test]
    async fn test_platform_failures_fold_into_false() {
        let mock = MockPlatform::new();
        mock.set_permission_status(Err(PlatformError::new(1001, "auth service down")));
        assert!(!PermissionGate::new(&mock, PERMISSIONS).ensure_granted().await);
        assert_eq!(mock.calls(), vec![PlatformCall::CheckPermissions]);

        let mock = MockPlatform::new();
        mock.set_permission_status(Ok(vec![false, true]));
        mock.set_permission_request(Err(PlatformError::generic("prompt failed")));
        assert!(!PermissionGate::new(&mock, PERMISSIONS).ensure_granted().await);
    }
}
