//! Scripted in-memory platform for tests and demos.
//!
//! Every call is recorded in order, and every response can be changed at
//! any time through the `set_*` methods.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;

use super::bridge::{self, FrameSink};
use super::{
    AuthClient, DeviceClient, InboundSubscription, P2pClient, PermissionGrant, PlatformResult,
    SendEvents, SubscriptionId,
};
use crate::config::{Counterpart, Permission};
use crate::device::CompanionDevice;
use crate::error::{codes, PlatformError};
use crate::message::MessageEnvelope;

/// A recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    /// Permission status query.
    CheckPermissions,
    /// Interactive permission request.
    RequestPermissions,
    /// Bonded device listing.
    BondedDevices,
    /// Counterpart ping.
    Ping {
        /// Target device id.
        device_id: String,
    },
    /// Message submission.
    Send {
        /// Target device id.
        device_id: String,
        /// Submitted payload.
        payload: Vec<u8>,
    },
    /// Inbound subscription.
    Subscribe {
        /// Target device id.
        device_id: String,
    },
    /// Subscription teardown.
    Unsubscribe {
        /// Subscription being removed.
        subscription: SubscriptionId,
    },
}

/// A connected device used as the default bonded device.
#[must_use]
pub fn connected_watch() -> CompanionDevice {
    CompanionDevice::new("watch-01", "Watch 4 Pro", "MDS-B19", true)
}

#[derive(Debug)]
struct MockState {
    permission_status: Option<PlatformResult<Vec<bool>>>,
    permission_request: Option<PlatformResult<PermissionGrant>>,
    devices: PlatformResult<Vec<CompanionDevice>>,
    ping: PlatformResult<i32>,
    stall_ping: bool,
    stall_subscribe: bool,
    stall_unsubscribe: bool,
    send_progress: Vec<u64>,
    send_result: PlatformResult<i32>,
    trailing_progress: Vec<u64>,
    subscribe_error: Option<PlatformError>,
    unsubscribe_error: Option<PlatformError>,
    subscriptions: Vec<(SubscriptionId, FrameSink)>,
    calls: Vec<PlatformCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            permission_status: None,
            permission_request: None,
            devices: Ok(vec![connected_watch()]),
            ping: Ok(codes::COUNTERPART_RUNNING),
            stall_ping: false,
            stall_subscribe: false,
            stall_unsubscribe: false,
            send_progress: vec![50, 100],
            send_result: Ok(codes::SEND_SUCCESS),
            trailing_progress: Vec::new(),
            subscribe_error: None,
            unsubscribe_error: None,
            subscriptions: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// Scripted platform.
///
/// Defaults: every permission granted, one connected watch, counterpart
/// running, sends succeed after two progress events.
#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    /// A platform where everything succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: PlatformCall) {
        self.state().calls.push(call);
    }

    /// Grant status returned by the permission check.
    pub fn set_permission_status(&self, status: PlatformResult<Vec<bool>>) {
        self.state().permission_status = Some(status);
    }

    /// Outcome of the interactive permission request.
    pub fn set_permission_request(&self, outcome: PlatformResult<PermissionGrant>) {
        self.state().permission_request = Some(outcome);
    }

    /// Bonded device list.
    pub fn set_devices(&self, devices: PlatformResult<Vec<CompanionDevice>>) {
        self.state().devices = devices;
    }

    /// Ping result.
    pub fn set_ping(&self, result: PlatformResult<i32>) {
        self.state().ping = result;
    }

    /// Make pings never complete.
    pub fn stall_ping(&self) {
        self.state().stall_ping = true;
    }

    /// Make subscriptions never complete.
    pub fn stall_subscribe(&self) {
        self.state().stall_subscribe = true;
    }

    /// Make unsubscriptions never complete.
    pub fn stall_unsubscribe(&self) {
        self.state().stall_unsubscribe = true;
    }

    /// Progress reported before the send result.
    pub fn set_send_progress(&self, progress: Vec<u64>) {
        self.state().send_progress = progress;
    }

    /// Terminal send result.
    pub fn set_send_result(&self, result: PlatformResult<i32>) {
        self.state().send_result = result;
    }

    /// Progress events emitted after the terminal result.
    pub fn set_trailing_progress(&self, progress: Vec<u64>) {
        self.state().trailing_progress = progress;
    }

    /// Make the next subscriptions fail.
    pub fn set_subscribe_error(&self, error: Option<PlatformError>) {
        self.state().subscribe_error = error;
    }

    /// Make unsubscriptions fail.
    pub fn set_unsubscribe_error(&self, error: Option<PlatformError>) {
        self.state().unsubscribe_error = error;
    }

    /// Deliver a frame to every active subscription.
    ///
    /// Returns how many subscriptions accepted it.
    pub fn push_inbound(&self, frame: &[u8]) -> usize {
        self.state()
            .subscriptions
            .iter()
            .filter(|(_, sink)| sink.deliver(frame.to_vec()))
            .count()
    }

    /// End every inbound stream from the platform side.
    ///
    /// Returns how many subscriptions were closed.
    pub fn close_inbound(&self) -> usize {
        let mut state = self.state();
        let closed = state.subscriptions.len();
        state.subscriptions.clear();
        closed
    }

    /// Number of subscriptions the platform still considers active.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.state().subscriptions.len()
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }
}

#[async_trait]
impl AuthClient for MockPlatform {
    async fn check_permissions(&self, permissions: &[Permission]) -> PlatformResult<Vec<bool>> {
        self.record(PlatformCall::CheckPermissions);
        self.state()
            .permission_status
            .clone()
            .unwrap_or_else(|| Ok(vec![true; permissions.len()]))
    }

    async fn request_permissions(
        &self,
        permissions: &[Permission],
    ) -> PlatformResult<PermissionGrant> {
        self.record(PlatformCall::RequestPermissions);
        self.state()
            .permission_request
            .clone()
            .unwrap_or_else(|| Ok(PermissionGrant::Granted(permissions.to_vec())))
    }
}

#[async_trait]
impl DeviceClient for MockPlatform {
    async fn bonded_devices(&self) -> PlatformResult<Vec<CompanionDevice>> {
        self.record(PlatformCall::BondedDevices);
        self.state().devices.clone()
    }
}

#[async_trait]
impl P2pClient for MockPlatform {
    async fn ping(
        &self,
        device: &CompanionDevice,
        _counterpart: Counterpart<'_>,
    ) -> PlatformResult<i32> {
        self.record(PlatformCall::Ping {
            device_id: device.id.clone(),
        });
        let (stalled, result) = {
            let state = self.state();
            (state.stall_ping, state.ping.clone())
        };
        if stalled {
            return std::future::pending().await;
        }

        // Deliver the result from another task, the way SDK callbacks arrive.
        let (completer, completion) = bridge::completion();
        tokio::spawn(async move {
            completer.complete(result);
        });
        completion.await?
    }

    async fn send(
        &self,
        device: &CompanionDevice,
        _counterpart: Counterpart<'_>,
        envelope: MessageEnvelope,
    ) -> PlatformResult<SendEvents> {
        self.record(PlatformCall::Send {
            device_id: device.id.clone(),
            payload: envelope.payload,
        });
        let (progress, result, trailing) = {
            let state = self.state();
            (
                state.send_progress.clone(),
                state.send_result.clone(),
                state.trailing_progress.clone(),
            )
        };
        let code = result?;

        let (sink, events) = bridge::send_events();
        for value in progress {
            sink.progress(value);
        }
        sink.finish(code);

        let trailing = futures::stream::iter(
            trailing.into_iter().map(super::SendEvent::Progress),
        );
        Ok(events.chain(trailing).boxed())
    }

    async fn subscribe(
        &self,
        device: &CompanionDevice,
        _counterpart: Counterpart<'_>,
    ) -> PlatformResult<InboundSubscription> {
        self.record(PlatformCall::Subscribe {
            device_id: device.id.clone(),
        });
        if self.state().stall_subscribe {
            return std::future::pending().await;
        }

        let mut state = self.state();
        if let Some(err) = state.subscribe_error.clone() {
            return Err(err);
        }
        let id = SubscriptionId::new();
        let (sink, frames) = bridge::inbound_frames();
        state.subscriptions.push((id, sink));
        Ok(InboundSubscription { id, frames })
    }

    async fn unsubscribe(
        &self,
        _device: &CompanionDevice,
        subscription: SubscriptionId,
    ) -> PlatformResult<()> {
        self.record(PlatformCall::Unsubscribe { subscription });
        if self.state().stall_unsubscribe {
            return std::future::pending().await;
        }

        let mut state = self.state();
        state.subscriptions.retain(|(id, _)| *id != subscription);
        state.unsubscribe_error.clone().map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_succeed_and_are_recorded() {
        let mock = MockPlatform::new();
        let granted = mock
            .check_permissions(&[Permission::DeviceManager])
            .await
            .unwrap();
        assert_eq!(granted, vec![true]);

        let devices = mock.bonded_devices().await.unwrap();
        assert_eq!(devices, vec![connected_watch()]);

        assert_eq!(
            mock.calls(),
            vec![PlatformCall::CheckPermissions, PlatformCall::BondedDevices]
        );
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_subscribers_until_unsubscribed() {
        let mock = MockPlatform::new();
        let watch = connected_watch();
        let config = crate::config::LinkConfig::builder()
            .package_name("com.example.watch")
            .debug_fingerprint("0".repeat(64))
            .release_fingerprint("1".repeat(64))
            .build()
            .unwrap();

        let mut subscription = mock.subscribe(&watch, config.counterpart()).await.unwrap();
        assert_eq!(mock.push_inbound(b"hello"), 1);
        assert_eq!(subscription.frames.next().await, Some(b"hello".to_vec()));

        mock.unsubscribe(&watch, subscription.id).await.unwrap();
        assert_eq!(mock.active_subscriptions(), 0);
        assert_eq!(mock.push_inbound(b"late"), 0);
        assert_eq!(subscription.frames.next().await, None);
    }

    #[tokio::test]
    async fn test_close_inbound_ends_streams() {
        let mock = MockPlatform::new();
        let watch = connected_watch();
        let config = crate::config::LinkConfig::builder()
            .package_name("com.example.watch")
            .debug_fingerprint("0".repeat(64))
            .release_fingerprint("1".repeat(64))
            .build()
            .unwrap();

        let mut subscription = mock.subscribe(&watch, config.counterpart()).await.unwrap();
        assert_eq!(mock.close_inbound(), 1);
        assert_eq!(subscription.frames.next().await, None);
        assert_eq!(mock.active_subscriptions(), 0);
    }
}
