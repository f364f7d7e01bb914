//! Unified error types for the companion link coordinator.
//!
//! [`LinkError`] is the taxonomy every public operation reports failures
//! with. Each variant carries a stable numeric code (see [`codes`]) so the
//! surrounding application can branch on it without parsing messages.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Pass-through**: Platform failures keep the vendor's code and message
//! - **Stable codes**: Numeric codes come from the platform's own code space,
//!   plus a few reserved negative codes owned by this crate
//!
//! # Example
//!
//! ```rust
//! use companion_link_core::error::{codes, LinkError, OutboundLimit};
//!
//! let err = LinkError::PayloadTooLarge(OutboundLimit { max: 1024, actual: 2048 });
//! assert_eq!(err.code(), codes::PAYLOAD_TOO_LARGE);
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Numeric result codes.
///
/// Positive values mirror the companion platform's code space. Negative
/// values are reserved for failures the coordinator detects on its own.
pub mod codes {
    /// Platform reported an unspecified failure.
    pub const GENERIC_FAILURE: i32 = 12;
    /// Required permissions were not granted.
    pub const PERMISSION_DENIED: i32 = 10;
    /// No bonded device is currently connected.
    pub const DEVICE_NOT_CONNECTED: i32 = 16;
    /// Ping result: counterpart app is not installed on the wearable.
    pub const COUNTERPART_NOT_INSTALLED: i32 = 200;
    /// Ping result: counterpart app is installed but not running.
    pub const COUNTERPART_NOT_RUNNING: i32 = 201;
    /// Ping result: counterpart app is running.
    pub const COUNTERPART_RUNNING: i32 = 202;
    /// Terminal send result: message delivered.
    pub const SEND_SUCCESS: i32 = 207;

    /// Payload exceeded the outbound size bound. Never reaches the platform.
    pub const PAYLOAD_TOO_LARGE: i32 = -1;
    /// A stage did not complete within the configured deadline.
    pub const STAGE_TIMED_OUT: i32 = -2;
}

/// A failure reported by the companion platform, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct PlatformError {
    /// Vendor result code.
    pub code: i32,
    /// Vendor-supplied message.
    pub message: String,
}

impl PlatformError {
    /// Create a platform error from a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A platform failure without a more specific code.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(codes::GENERIC_FAILURE, message)
    }
}

/// Why the coordinator considers the device unreachable.
///
/// Both reasons share [`codes::DEVICE_NOT_CONNECTED`]; the distinction is
/// kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The bonded device list had no entry with the connectivity flag set.
    NoConnectedDevice,
    /// A device-bound stage ran before any device was resolved.
    NoCachedDevice,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConnectedDevice => f.write_str("no bonded device is connected"),
            Self::NoCachedDevice => f.write_str("no device has been resolved"),
        }
    }
}

/// A step of the send or register pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Permission check and request.
    Permission,
    /// Bonded device lookup.
    DeviceResolution,
    /// Counterpart ping.
    Liveness,
    /// Message transmission.
    Dispatch,
    /// Inbound subscription.
    Registration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Permission => "permission",
            Self::DeviceResolution => "device resolution",
            Self::Liveness => "liveness probe",
            Self::Dispatch => "dispatch",
            Self::Registration => "receiver registration",
        };
        f.write_str(name)
    }
}

/// Size details for a rejected outbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundLimit {
    /// Maximum accepted payload size in bytes.
    pub max: usize,
    /// Size of the rejected payload in bytes.
    pub actual: usize,
}

/// The error type for all coordinator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    // =========================================================================
    // COORDINATOR-DETECTED ERRORS
    // =========================================================================
    /// Outbound payload is larger than the transport accepts.
    #[error("Message is too large: {} bytes exceeds the {} byte limit", .0.actual, .0.max)]
    PayloadTooLarge(OutboundLimit),

    /// A stage exceeded the configured per-stage deadline.
    #[error("The {stage} stage did not complete within {}ms", .after.as_millis())]
    StageTimedOut {
        /// Stage that timed out.
        stage: Stage,
        /// Deadline that elapsed.
        after: Duration,
    },

    // =========================================================================
    // LINK STATE ERRORS
    // =========================================================================
    /// Permission check or request failed, or the user cancelled it.
    #[error("Required permissions were not granted. Grant them in the companion app and retry.")]
    PermissionDenied,

    /// No usable companion device.
    #[error("Device is not connected: {0}")]
    DeviceNotConnected(DisconnectReason),

    /// The counterpart app is missing on the wearable.
    #[error("Companion app is not installed on the wearable")]
    CounterpartNotInstalled,

    /// The counterpart app is installed but not running.
    #[error("Companion app is installed on the wearable but not running. Open it and retry.")]
    CounterpartNotRunning,

    /// The platform finished a send with a non-success code.
    #[error("Failed to send message (code {code})")]
    DispatchFailed {
        /// Terminal send code reported by the platform.
        code: i32,
    },

    // =========================================================================
    // PASS-THROUGH
    // =========================================================================
    /// Any other platform failure.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// A specialized [`Result`] type for coordinator operations.
pub type Result<T> = std::result::Result<T, LinkError>;

impl LinkError {
    /// Numeric code reported to the caller alongside the message.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::PayloadTooLarge(_) => codes::PAYLOAD_TOO_LARGE,
            Self::StageTimedOut { .. } => codes::STAGE_TIMED_OUT,
            Self::PermissionDenied => codes::PERMISSION_DENIED,
            Self::DeviceNotConnected(_) => codes::DEVICE_NOT_CONNECTED,
            Self::CounterpartNotInstalled => codes::COUNTERPART_NOT_INSTALLED,
            Self::CounterpartNotRunning => codes::COUNTERPART_NOT_RUNNING,
            Self::DispatchFailed { code } => *code,
            Self::Platform(err) => err.code,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::StageTimedOut { .. } => "STAGE_TIMED_OUT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::DeviceNotConnected(_) => "DEVICE_NOT_CONNECTED",
            Self::CounterpartNotInstalled => "COUNTERPART_NOT_INSTALLED",
            Self::CounterpartNotRunning => "COUNTERPART_INSTALLED_NOT_RUNNING",
            Self::DispatchFailed { .. } => "DISPATCH_FAILED",
            Self::Platform(_) => "PLATFORM_FAILURE",
        }
    }

    /// Returns `true` if the counterpart app is the problem.
    #[inline]
    #[must_use]
    pub const fn is_counterpart_error(&self) -> bool {
        matches!(
            self,
            Self::CounterpartNotInstalled | Self::CounterpartNotRunning
        )
    }

    /// Returns `true` if no device could be used.
    #[inline]
    #[must_use]
    pub const fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotConnected(_))
    }

    /// Returns `true` if re-invoking the whole operation later may succeed
    /// without the user changing anything on the phone.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotConnected(_)
                | Self::CounterpartNotRunning
                | Self::DispatchFailed { .. }
                | Self::StageTimedOut { .. }
        )
    }

    /// Returns `true` if the platform was never contacted.
    #[inline]
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::PayloadTooLarge(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_taxonomy() {
        let too_large = LinkError::PayloadTooLarge(OutboundLimit {
            max: 1024,
            actual: 1025,
        });
        assert_eq!(too_large.code(), codes::PAYLOAD_TOO_LARGE);
        assert!(too_large.code() < 0);

        assert_eq!(LinkError::PermissionDenied.code(), codes::PERMISSION_DENIED);
        assert_eq!(
            LinkError::CounterpartNotRunning.code(),
            codes::COUNTERPART_NOT_RUNNING
        );
        assert_eq!(
            LinkError::CounterpartNotInstalled.code(),
            codes::COUNTERPART_NOT_INSTALLED
        );
    }

    #[test]
    fn test_disconnect_reasons_share_code() {
        let empty = LinkError::DeviceNotConnected(DisconnectReason::NoConnectedDevice);
        let uncached = LinkError::DeviceNotConnected(DisconnectReason::NoCachedDevice);
        assert_eq!(empty.code(), uncached.code());
        assert_eq!(empty.error_code(), uncached.error_code());
        assert_ne!(empty.to_string(), uncached.to_string());
    }

    #[test]
    fn test_platform_error_passes_through() {
        let err: LinkError = PlatformError::new(1003, "service unreachable").into();
        assert_eq!(err.code(), 1003);
        assert_eq!(err.to_string(), "service unreachable (code 1003)");
        assert_eq!(err.error_code(), "PLATFORM_FAILURE");
    }

    #[test]
    fn test_dispatch_failure_keeps_code() {
        let err = LinkError::DispatchFailed { code: 206 };
        assert_eq!(err.code(), 206);
        assert!(err.to_string().contains("206"));
    }

    #[test]
    fn test_classification() {
        assert!(LinkError::CounterpartNotRunning.is_counterpart_error());
        assert!(LinkError::CounterpartNotInstalled.is_counterpart_error());
        assert!(!LinkError::PermissionDenied.is_counterpart_error());

        assert!(LinkError::DeviceNotConnected(DisconnectReason::NoCachedDevice).is_device_error());

        assert!(LinkError::CounterpartNotRunning.is_retryable());
        assert!(!LinkError::CounterpartNotInstalled.is_retryable());
        assert!(!LinkError::PermissionDenied.is_retryable());

        assert!(LinkError::PayloadTooLarge(OutboundLimit { max: 1, actual: 2 }).is_local());
        assert!(!LinkError::PermissionDenied.is_local());
    }

    #[test]
    fn test_timeout_message_names_stage() {
        let err = LinkError::StageTimedOut {
            stage: Stage::Liveness,
            after: Duration::from_millis(1500),
        };
        let msg = err.to_string();
        assert!(msg.contains("liveness probe"));
        assert!(msg.contains("1500ms"));
        assert_eq!(err.code(), codes::STAGE_TIMED_OUT);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LinkError>();
        assert_sync::<LinkError>();
    }
}
