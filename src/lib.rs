//! Pool cover controller library.
//!
//! Exposes the control loop and its adapters for the binary, integration
//! tests and any outer surface (HTTP long-poll, accessory bridge). GPIO
//! character-device support is behind the `gpiod` feature and only built
//! on Linux; everything else runs on any host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod calibration;
pub mod config;
pub mod drivers;
pub mod error;
pub mod notify;
pub mod pins;
pub mod runtime;
pub mod safety;

pub use app::service::{CommandOutcome, CoverService, IgnoreReason};
pub use app::state::CoverState;
pub use error::{Error, Result};
pub use runtime::ControlLoop;
