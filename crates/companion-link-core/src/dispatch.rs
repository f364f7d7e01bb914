//! Message dispatcher.
//!
//! Frames an already size-checked [`OutboundMessage`] and submits it to the
//! cached device. The platform reports progress zero or more times, then a
//! single result code; [`codes::SEND_SUCCESS`] is the only success.
//! Anything the platform emits after the result is ignored.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Counterpart;
use crate::deadline::within;
use crate::device::{CompanionDevice, DeviceCache};
use crate::error::{codes, LinkError, PlatformError, Result, Stage};
use crate::message::OutboundMessage;
use crate::platform::{P2pClient, SendEvent};

/// Summary of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Envelope id.
    pub message_id: Uuid,
    /// Device the message went to.
    pub device: CompanionDevice,
    /// Payload size in bytes.
    pub bytes: usize,
    /// Number of progress events observed before the result.
    pub progress_events: usize,
}

/// Submits framed messages to the cached device.
pub struct MessageDispatcher<'a> {
    p2p: &'a dyn P2pClient,
    cache: &'a DeviceCache,
    counterpart: Counterpart<'a>,
    deadline: Option<Duration>,
}

impl<'a> MessageDispatcher<'a> {
    /// Create a dispatcher for the device held in `cache`.
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

    /// Bound the whole transfer by `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Send `message`, calling `on_progress` for each progress event.
    ///
    /// # Errors
    ///
    /// - [`LinkError::DeviceNotConnected`] if no device has been resolved
    /// - [`LinkError::DispatchFailed`] if the result code is not a success
    /// - [`LinkError::Platform`] if submission fails or no result arrives
    pub async fn dispatch(
        &self,
        message: OutboundMessage,
        mut on_progress: impl FnMut(u64) + Send,
    ) -> Result<DeliveryReport> {
        let device = self.cache.require().await?;
        let envelope = message.into_envelope();
        let message_id = envelope.id;
        let bytes = envelope.payload.len();
        debug!(%message_id, bytes, device = %device.name, "Dispatching message");

        let outcome = within(Stage::Dispatch, self.deadline, async {
            let mut events = self.p2p.send(&device, self.counterpart, envelope).await?;
            let mut progress_events: usize = 0;
            while let Some(event) = events.next().await {
                match event {
                    SendEvent::Progress(value) => {
                        progress_events += 1;
                        on_progress(value);
                    }
                    SendEvent::Result(code) => return Ok((code, progress_events)),
                }
            }
            Err(PlatformError::generic("Send finished without a result").into())
        })
        .await;

        match outcome {
            Ok((codes::SEND_SUCCESS, progress_events)) => {
                info!(%message_id, bytes, "Message delivered");
                Ok(DeliveryReport {
                    message_id,
                    device,
                    bytes,
                    progress_events,
                })
            }
            Ok((code, _)) => {
                warn!(%message_id, code, "Message rejected by platform");
                Err(LinkError::DispatchFailed { code })
            }
            Err(e) => {
                warn!(%message_id, error = %e, code = e.code(), "Message dispatch failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::platform::mock::{connected_watch, MockPlatform, PlatformCall};

    fn config() -> LinkConfig {
        LinkConfig::builder()
            .package_name("com.example.watch")
            .debug_fingerprint("c".repeat(64))
            .release_fingerprint("d".repeat(64))
            .build()
            .unwrap()
    }

    async fn cache_with_watch() -> DeviceCache {
        let cache = DeviceCache::new();
        cache.store(connected_watch()).await;
        cache
    }

    #[tokio::test]
    async fn test_success_reports_progress() {
        let mock = MockPlatform::new();
        mock.set_send_progress(vec![25, 50, 100]);
        let cache = cache_with_watch().await;
        let config = config();
        let mut seen = Vec::new();

        let report = MessageDispatcher::new(&mock, &cache, config.counterpart())
            .dispatch(OutboundMessage::new("hi").unwrap(), |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(seen, vec![25, 50, 100]);
        assert_eq!(report.progress_events, 3);
        assert_eq!(report.bytes, 2);
        assert_eq!(report.device, connected_watch());
        assert_eq!(
            mock.calls(),
            vec![PlatformCall::Send {
                device_id: "watch-01".into(),
                payload: b"hi".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn test_events_after_result_are_ignored() {
        let mock = MockPlatform::new();
        mock.set_send_progress(vec![100]);
        mock.set_trailing_progress(vec![200, 300]);
        let cache = cache_with_watch().await;
        let config = config();
        let mut seen = Vec::new();

        MessageDispatcher::new(&mock, &cache, config.counterpart())
            .dispatch(OutboundMessage::new("hi").unwrap(), |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(seen, vec![100]);
    }

    #[tokio::test]
    async fn test_non_success_code_is_dispatch_failure() {
        let mock = MockPlatform::new();
        mock.set_send_result(Ok(206));
        let cache = cache_with_watch().await;
        let config = config();

        let err = MessageDispatcher::new(&mock, &cache, config.counterpart())
            .dispatch(OutboundMessage::new("hi").unwrap(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, LinkError::DispatchFailed { code: 206 });
        assert_eq!(err.code(), 206);
    }

    #[tokio::test]
    async fn test_submission_failure_passes_through() {
        let mock = MockPlatform::new();
        mock.set_send_result(Err(PlatformError::new(1008, "channel closed")));
        let cache = cache_with_watch().await;
        let config = config();

        let err = MessageDispatcher::new(&mock, &cache, config.counterpart())
            .dispatch(OutboundMessage::new("hi").unwrap(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.code(), 1008);
    }

    #[tokio::test]
    async fn test_requires_cached_device() {
        let mock = MockPlatform::new();
        let cache = DeviceCache::new();
        let config = config();

        let err = MessageDispatcher::new(&mock, &cache, config.counterpart())
            .dispatch(OutboundMessage::new("hi").unwrap(), |_| {})
            .await
            .unwrap_err();
        assert!(err.is_device_error());
        assert!(mock.calls().is_empty());
    }
}
