//! Controller constants and decoded report types

use serde::{Deserialize, Serialize};

/// Valve Corporation
pub const VENDOR_ID: u16 = 0x28de;

/// Steam Controller connected by cable
pub const PRODUCT_ID: u16 = 0x1102;

/// Interrupt IN endpoint carrying input reports
pub const ENDPOINT: u8 = 3;

/// Interface index used for feature-report control transfers
pub const CONTROLIDX: u16 = 2;

/// Size of one input report and of every feature report
pub const REPORT_SIZE: usize = 64;

/// HID interface class triple the controller is claimed by
pub const HID_CLASS: u8 = 3;
pub const HID_SUBCLASS: u8 = 0;
pub const HID_PROTOCOL: u8 = 0;

/// Status byte carried by every input report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusCode {
    /// A live input sample
    Input = 0x01,
    /// Controller attached/detached notification (dongle firmware reuses it)
    Hotplug = 0x03,
    /// Keepalive sent while nothing changes
    Idle = 0x04,
}

impl StatusCode {
    /// Map a raw status byte, `None` for codes outside the known set
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Input),
            0x03 => Some(Self::Hotplug),
            0x04 => Some(Self::Idle),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One decoded input report
///
/// Field values are passed through untouched; button and axis semantics
/// belong to whoever consumes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInput {
    pub status: StatusCode,
    pub seq: u16,
    pub buttons: u32,
    pub ltrig: u8,
    pub rtrig: u8,
    pub lpad_x: i16,
    pub lpad_y: i16,
    pub rpad_x: i16,
    pub rpad_y: i16,
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    pub gpitch: i16,
    pub groll: i16,
    pub gyaw: i16,
    pub q1: i16,
    pub q2: i16,
    pub q3: i16,
    pub q4: i16,
}

impl ControllerInput {
    /// All-zero state, used as "previous" before the first forwarded report
    pub const NULL: ControllerInput = ControllerInput {
        status: StatusCode::Input,
        seq: 0,
        buttons: 0,
        ltrig: 0,
        rtrig: 0,
        lpad_x: 0,
        lpad_y: 0,
        rpad_x: 0,
        rpad_y: 0,
        accel_x: 0,
        accel_y: 0,
        accel_z: 0,
        gpitch: 0,
        groll: 0,
        gyaw: 0,
        q1: 0,
        q2: 0,
        q3: 0,
        q4: 0,
    };

    /// Whether this report carries a live sample that should reach the mapper
    pub fn is_input(&self) -> bool {
        self.status == StatusCode::Input
    }
}

impl Default for ControllerInput {
    fn default() -> Self {
        Self::NULL
    }
}

/// Which haptic actuator a feedback packet addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HapticPosition {
    Right = 0,
    Left = 1,
    Both = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_byte() {
        assert_eq!(StatusCode::from_byte(0x01), Some(StatusCode::Input));
        assert_eq!(StatusCode::from_byte(0x03), Some(StatusCode::Hotplug));
        assert_eq!(StatusCode::from_byte(0x04), Some(StatusCode::Idle));
        assert_eq!(StatusCode::from_byte(0x02), None);
        assert_eq!(StatusCode::from_byte(0xff), None);
    }

    #[test]
    fn test_null_input_is_zeroed() {
        let null = ControllerInput::default();
        assert_eq!(null, ControllerInput::NULL);
        assert_eq!(null.buttons, 0);
        assert!(null.is_input());
    }
}
