//! # companion-link-core
//!
//! Coordinator for talking to a companion app on a paired wearable through
//! the vendor companion platform.
//!
//! This crate provides:
//! - Permission check-then-request sequencing
//! - Connected device lookup and caching
//! - Liveness ping of the counterpart app
//! - Bounded-size message dispatch with progress reporting
//! - A single inbound message receiver per coordinator
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`coordinator`] - [`CompanionLink`], the outward surface
//! - [`permission`], [`resolver`], [`liveness`], [`dispatch`], [`receiver`] - the pipeline stages
//! - [`platform`] - traits for the vendor clients, plus callback bridges
//! - [`config`] - validated, immutable link configuration
//! - [`device`], [`message`] - data model
//! - [`callbacks`] - caller notification hooks
//! - [`error`] - error taxonomy and stable result codes
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run(platform: companion_link_core::Platform) -> Result<(), Box<dyn std::error::Error>> {
//! use companion_link_core::{CompanionLink, LinkConfig, SendCallbacks};
//!
//! let config = LinkConfig::builder()
//!     .package_name("com.example.watchface")
//!     .debug_fingerprint("AB".repeat(32))
//!     .release_fingerprint("CD".repeat(32))
//!     .build()?;
//!
//! let link = CompanionLink::new(config, platform);
//! let callbacks = SendCallbacks::new()
//!     .on_device_connected(|name| println!("connected to {name}"))
//!     .on_error(|message, code| eprintln!("send failed ({code}): {message}"));
//! link.send("hello", &callbacks).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod callbacks;
pub mod config;
pub mod coordinator;
mod deadline;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod liveness;
pub mod message;
pub mod permission;
pub mod platform;
pub mod receiver;
pub mod resolver;

// Re-export primary types for convenience
pub use callbacks::{ReceiverCallbacks, SendCallbacks};
pub use config::{
    is_valid_fingerprint, is_valid_package_name, ConfigError, ConfigResult, Counterpart,
    LinkConfig, LinkConfigBuilder, LoggingPrefs, Permission,
};
pub use coordinator::CompanionLink;
pub use device::CompanionDevice;
pub use dispatch::DeliveryReport;
pub use error::{codes, DisconnectReason, LinkError, PlatformError, Result, Stage};
pub use liveness::CounterpartStatus;
pub use message::{OutboundMessage, MAX_PAYLOAD_BYTES};
pub use platform::{
    AuthClient, DeviceClient, InboundSubscription, P2pClient, PermissionGrant, Platform,
    SendEvent, SubscriptionId,
};
pub use receiver::ReceiverState;
