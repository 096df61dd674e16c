//! USB subsystem
//!
//! Everything that touches libusb lives here and runs on the dedicated
//! `usb-worker` thread, apart from the per-controller interrupt readers
//! and sync loops the sessions own.

pub mod manager;
pub mod transport;
pub mod worker;

pub use worker::spawn_usb_worker;
