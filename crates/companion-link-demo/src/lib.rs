//! # companion-link-demo
//!
//! Command-line driver for the companion link coordinator.
//!
//! This library provides the scenario scripting, session state and logging
//! setup used by the `companion-link-demo` binary.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod scenario;
pub mod state;
