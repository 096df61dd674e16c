//! Driver error types

use protocol::ProtocolError;
use thiserror::Error;

/// Errors reported by a [`crate::UsbTransport`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Device not found")]
    NotFound,

    #[error("Access denied")]
    Access,

    #[error("Device disconnected")]
    NoDevice,

    #[error("Transfer timed out")]
    Timeout,

    #[error("No interface with class {class}, subclass {subclass}, protocol {protocol}")]
    NoInterface {
        class: u8,
        subclass: u8,
        protocol: u8,
    },

    #[error("Transport closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Errors raised by a controller session
#[derive(Debug, Error)]
pub enum DriverError {
    /// The HID interface could not be claimed; fatal to the session
    #[error("Failed to claim controller interface: {0}")]
    Claim(#[source] TransportError),

    /// No or invalid serial-number response; the session never becomes ready
    #[error("Identity acquisition failed: {0}")]
    IdentityAcquisition(String),

    /// An input report did not match the fixed layout
    #[error(transparent)]
    MalformedPacket(#[from] ProtocolError),

    /// The mapper or the output flush failed during a tick; fatal to the session
    #[error("Sync step failed: {0}")]
    SyncStep(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to spawn sync thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;
