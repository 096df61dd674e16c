//! Common utilities for sc-cable
//!
//! This crate provides shared functionality between the driver core and the
//! daemon: error handling, logging setup, the async channel bridge between
//! the Tokio runtime and the USB thread, and test helpers.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{
    ControllerSummary, DaemonEvent, UsbBridge, UsbCommand, UsbWorker, create_usb_bridge,
};
pub use error::{Error, Result};
pub use logging::setup_logging;
