//! Driver core for a Steam Controller connected by USB cable
//!
//! One [`CableSession`] per physical controller. The session composes two
//! collaborators:
//! - a [`UsbTransport`], which owns the USB plumbing (claiming, interrupt
//!   delivery, feature-report requests, the output queue);
//! - a [`CableController`], the protocol-level object handed to the daemon
//!   registry and to the mapper.
//!
//! Input reports arrive on a transport-owned context and land in a single
//! pending slot. A dedicated sync thread wakes every period and, under the
//! same lock, either forwards that input to the mapper or drives the
//! mapper's time-based work, then flushes output to the device.

pub mod controller;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod registry;
pub mod session;
mod sync_loop;
pub mod transport;

pub use controller::{CableController, Controller, ControllerSettings, PowerControl};
pub use error::{DriverError, Result, TransportError};
pub use identity::Identity;
pub use mapper::{Mapper, MapperError, MapperResult, SharedMapper};
pub use registry::ControllerRegistry;
pub use session::{CableSession, SessionSettings, SessionState, StepOutcome};
pub use transport::{InputHandler, OutputQueue, UsbTransport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking mapper poisoned it
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
