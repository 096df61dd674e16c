//! Device identity acquisition
//!
//! The controller reports its serial number in answer to a feature-report
//! request. The serial becomes the stable controller id `sc<serial>`.

use crate::error::{DriverError, Result};
use crate::transport::UsbTransport;
use protocol::packets;
use std::sync::OnceLock;
use tracing::debug;

/// Controller id derived from a serial number
pub fn controller_id(serial: &str) -> String {
    format!("sc{}", serial)
}

/// Ask the controller on interface `index` for its serial number
pub fn acquire_serial(transport: &dyn UsbTransport, index: u16) -> Result<String> {
    let response = transport
        .make_request(index, &packets::serial_request())
        .map_err(|e| DriverError::IdentityAcquisition(format!("serial request failed: {}", e)))?;

    let serial = protocol::parse_serial_response(&response)
        .map_err(|e| DriverError::IdentityAcquisition(e.to_string()))?;

    debug!(
        "Controller on interface {} reported serial {}",
        index, serial
    );
    Ok(serial)
}

/// Write-once controller id
#[derive(Debug, Default)]
pub struct Identity {
    id: OnceLock<String>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the id derived from `serial`
    ///
    /// Only the first assignment sticks; later ones are rejected and leave
    /// the first id in place.
    pub fn assign(&self, serial: &str) -> Result<&str> {
        let id = controller_id(serial);
        self.id.set(id).map_err(|rejected| {
            let reason = format!("identity already assigned, refusing {}", rejected);
            DriverError::IdentityAcquisition(reason)
        })?;
        Ok(self.id.get().map(String::as_str).unwrap_or_default())
    }

    pub fn get(&self) -> Option<&str> {
        self.id.get().map(String::as_str)
    }

    pub fn is_acquired(&self) -> bool {
        self.id.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_id_format() {
        assert_eq!(controller_id("ABC123"), "scABC123");
    }

    #[test]
    fn test_identity_assigned_once() {
        let identity = Identity::new();
        assert!(!identity.is_acquired());

        assert_eq!(identity.assign("ABC123").unwrap(), "scABC123");
        assert!(identity.assign("XYZ999").is_err());
        assert_eq!(identity.get(), Some("scABC123"));
    }
}
