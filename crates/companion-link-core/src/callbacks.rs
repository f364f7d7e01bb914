//! Caller-supplied notification hooks.
//!
//! Every hook is optional. Error hooks receive the human-readable message
//! and the numeric code of the failing stage.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::DeliveryReport;
use crate::error::LinkError;

type NameHook = Arc<dyn Fn(&str) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&str, i32) + Send + Sync>;

/// Hooks for a send operation.
#[derive(Clone, Default)]
pub struct SendCallbacks {
    on_device_connected: Option<NameHook>,
    on_progress: Option<Arc<dyn Fn(u64) + Send + Sync>>,
    on_success: Option<Arc<dyn Fn(&DeliveryReport) + Send + Sync>>,
    on_error: Option<ErrorHook>,
}

impl SendCallbacks {
    /// No hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the device name once a connected device is identified.
    #[must_use]
    pub fn on_device_connected(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_device_connected = Some(Arc::new(f));
        self
    }

    /// Called for every progress event of the transfer.
    #[must_use]
    pub fn on_progress(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    /// Called once when the message has been delivered.
    #[must_use]
    pub fn on_success(mut self, f: impl Fn(&DeliveryReport) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Called once with the message and code of the first failing stage.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str, i32) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn device_connected(&self, name: &str) {
        if let Some(f) = &self.on_device_connected {
            f(name);
        }
    }

    pub(crate) fn progress(&self, value: u64) {
        if let Some(f) = &self.on_progress {
            f(value);
        }
    }

    pub(crate) fn success(&self, report: &DeliveryReport) {
        if let Some(f) = &self.on_success {
            f(report);
        }
    }

    pub(crate) fn error(&self, error: &LinkError) {
        if let Some(f) = &self.on_error {
            f(&error.to_string(), error.code());
        }
    }
}

impl fmt::Debug for SendCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendCallbacks")
            .field("on_device_connected", &self.on_device_connected.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Hooks for an inbound receiver.
#[derive(Clone)]
pub struct ReceiverCallbacks {
    on_device_connected: Option<NameHook>,
    on_message_received: Arc<dyn Fn(String) + Send + Sync>,
    on_error: Option<ErrorHook>,
}

impl ReceiverCallbacks {
    /// Deliver each inbound message, decoded as text, to `on_message`.
    pub fn new(on_message: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            on_device_connected: None,
            on_message_received: Arc::new(on_message),
            on_error: None,
        }
    }

    /// Called with the device name once the receiver is registered.
    #[must_use]
    pub fn on_device_connected(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_device_connected = Some(Arc::new(f));
        self
    }

    /// Called if registration fails.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str, i32) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn device_connected(&self, name: &str) {
        if let Some(f) = &self.on_device_connected {
            f(name);
        }
    }

    pub(crate) fn message_received(&self, text: String) {
        (self.on_message_received)(text);
    }

    pub(crate) fn error(&self, error: &LinkError) {
        if let Some(f) = &self.on_error {
            f(&error.to_string(), error.code());
        }
    }
}

impl fmt::Debug for ReceiverCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverCallbacks")
            .field("on_device_connected", &self.on_device_connected.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}
