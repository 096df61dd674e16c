//! USB endpoint transport capability
//!
//! The session never touches USB directly; everything goes through a
//! [`UsbTransport`]. The daemon provides a libusb-backed implementation,
//! tests provide in-memory ones.

use crate::error::TransportError;
use crate::lock;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::trace;

/// Callback invoked for every report read from an interrupt endpoint
///
/// Arguments are the endpoint number and the raw report.
pub type InputHandler = Box<dyn FnMut(u8, &[u8]) + Send + 'static>;

/// Transport operations a controller session relies on
pub trait UsbTransport: Send + Sync {
    /// Claim the first interface matching the class triple
    ///
    /// Returns the claimed interface number.
    fn claim_by(&self, class: u8, subclass: u8, protocol: u8) -> Result<u8, TransportError>;

    /// Start delivering reports of `size` bytes from `endpoint` to `handler`
    ///
    /// The handler runs on a context owned by the transport.
    fn set_input_interrupt(
        &self,
        endpoint: u8,
        size: usize,
        handler: InputHandler,
    ) -> Result<(), TransportError>;

    /// Send a feature report to interface `index` and read back the answer
    fn make_request(&self, index: u16, request: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Queue a feature report for the next [`UsbTransport::flush`]
    fn send_control(&self, index: u16, data: &[u8]);

    /// Queue a feature report, replacing a queued one with the same header
    fn overwrite_control(&self, index: u16, data: &[u8]);

    /// Send every queued feature report to the device
    fn flush(&self) -> Result<(), TransportError>;

    /// Stop interrupt delivery and release the device
    fn close(&self);
}

/// Bytes compared by [`OutputQueue::overwrite`]: packet type, size, config type
const HEADER_LEN: usize = 3;

/// Ordered queue of pending feature-report writes
///
/// Transports share this so that overwrite semantics are identical for
/// every backend.
#[derive(Debug, Default)]
pub struct OutputQueue {
    pending: Mutex<VecDeque<(u16, Vec<u8>)>>,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&self, index: u16, data: &[u8]) {
        lock(&self.pending).push_back((index, data.to_vec()));
    }

    /// Replace the queued message with the same index and header, or append
    ///
    /// Repeated LED or haptic requests within one tick collapse to the latest.
    pub fn overwrite(&self, index: u16, data: &[u8]) {
        let header = header_of(data);
        let mut pending = lock(&self.pending);

        let existing = pending
            .iter_mut()
            .find(|(i, queued)| *i == index && header_of(queued) == header);

        match existing {
            Some(slot) => {
                trace!("Overwriting queued control message on index {}", index);
                slot.1 = data.to_vec();
            }
            None => pending.push_back((index, data.to_vec())),
        }
    }

    /// Take everything queued, oldest first
    pub fn drain(&self) -> Vec<(u16, Vec<u8>)> {
        lock(&self.pending).drain(..).collect()
    }

    /// Put messages back at the front, e.g. after a failed send
    pub fn requeue(&self, messages: Vec<(u16, Vec<u8>)>) {
        let mut pending = lock(&self.pending);
        for message in messages.into_iter().rev() {
            pending.push_front(message);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.pending).is_empty()
    }
}

fn header_of(data: &[u8]) -> &[u8] {
    &data[..data.len().min(HEADER_LEN)]
}
