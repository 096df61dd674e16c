//! Protocol error types

use thiserror::Error;

/// Errors raised while decoding controller data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Report length does not match the fixed layout
    #[error("Malformed packet: expected {expected} bytes, got {actual}")]
    MalformedPacket { expected: usize, actual: usize },

    /// Report carries a status byte outside the known set
    #[error("Malformed packet: unknown status {0:#04x}")]
    UnknownStatus(u8),

    /// Serial-number response could not be parsed
    #[error("Invalid serial response: {0}")]
    InvalidSerial(String),
}

impl ProtocolError {
    /// True for errors that mean an input report should be dropped
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedPacket { .. } | ProtocolError::UnknownStatus(_)
        )
    }
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::MalformedPacket {
            expected: 64,
            actual: 12,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed packet"));
        assert!(msg.contains("64"));
        assert!(msg.contains("12"));

        let msg = format!("{}", ProtocolError::UnknownStatus(0x7f));
        assert!(msg.contains("0x7f"));
    }

    #[test]
    fn test_is_malformed() {
        assert!(ProtocolError::UnknownStatus(2).is_malformed());
        assert!(
            ProtocolError::MalformedPacket {
                expected: 64,
                actual: 0
            }
            .is_malformed()
        );
        assert!(!ProtocolError::InvalidSerial("empty".into()).is_malformed());
    }
}
