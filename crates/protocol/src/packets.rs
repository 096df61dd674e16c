//! Feature reports sent to the controller over control transfers
//!
//! Every packet is [`REPORT_SIZE`] bytes: a packet type, a payload size and
//! the payload, zero padded.

use crate::error::{ProtocolError, Result};
use crate::types::{HapticPosition, REPORT_SIZE};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Feature report packet types
pub mod packet_type {
    pub const CLEAR_MAPPINGS: u8 = 0x81;
    pub const CONFIGURE: u8 = 0x87;
    pub const FEEDBACK: u8 = 0x8f;
    pub const GET_SERIAL: u8 = 0xae;
}

/// Sub-types carried by [`packet_type::CONFIGURE`]
pub mod config_type {
    pub const LED: u8 = 0x2d;
    pub const CONFIGURE: u8 = 0x32;
}

/// A single feature report
pub type FeatureReport = [u8; REPORT_SIZE];

/// Highest accepted LED brightness
pub const MAX_LED_LEVEL: u8 = 100;

fn packet(header: &[u8]) -> FeatureReport {
    let mut data = [0u8; REPORT_SIZE];
    data[..header.len()].copy_from_slice(header);
    data
}

/// Request for the controller's serial number
pub fn serial_request() -> FeatureReport {
    packet(&[packet_type::GET_SERIAL, 0x15, 0x01])
}

/// Extract the serial number from a [`serial_request`] response
///
/// The response echoes the request header, followed by the serial as ASCII
/// terminated by NUL or by the end of the declared payload.
pub fn parse_serial_response(response: &[u8]) -> Result<String> {
    if response.len() < 4 {
        return Err(ProtocolError::InvalidSerial(format!(
            "response too short ({} bytes)",
            response.len()
        )));
    }
    if response[0] != packet_type::GET_SERIAL {
        return Err(ProtocolError::InvalidSerial(format!(
            "unexpected packet type {:#04x}",
            response[0]
        )));
    }
    if response[2] != 0x01 {
        return Err(ProtocolError::InvalidSerial(format!(
            "unexpected serial kind {:#04x}",
            response[2]
        )));
    }

    // Declared size counts the kind byte at offset 2
    let end = (2 + response[1] as usize).min(response.len());
    let payload = &response[3..end.max(3)];
    let serial: Vec<u8> = payload.iter().copied().take_while(|b| *b != 0).collect();

    if serial.is_empty() {
        return Err(ProtocolError::InvalidSerial("empty serial".to_string()));
    }
    if !serial.iter().all(u8::is_ascii_alphanumeric) {
        return Err(ProtocolError::InvalidSerial(
            "serial is not alphanumeric ASCII".to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&serial).into_owned())
}

/// Disables keyboard/mouse emulation ("lizard mode")
pub fn clear_mappings() -> FeatureReport {
    packet(&[packet_type::CLEAR_MAPPINGS])
}

/// Idle timeout and gyro configuration
pub fn configure(idle_timeout_secs: u16, enable_gyros: bool) -> FeatureReport {
    let mut timeout = [0u8; 2];
    BigEndian::write_u16(&mut timeout, idle_timeout_secs);
    packet(&[
        packet_type::CONFIGURE,
        0x15,
        config_type::CONFIGURE,
        timeout[0],
        timeout[1],
        0x18,
        0x00,
        0x00,
        0x31,
        0x02,
        0x00,
        0x08,
        0x07,
        0x00,
        0x07,
        0x07,
        0x00,
        0x30,
        if enable_gyros { 0x14 } else { 0x00 },
        0x00,
        0x2e,
    ])
}

/// Logo LED brightness, clamped to [`MAX_LED_LEVEL`]
pub fn led(level: u8) -> FeatureReport {
    packet(&[
        packet_type::CONFIGURE,
        0x03,
        config_type::LED,
        level.min(MAX_LED_LEVEL),
    ])
}

/// Haptic pulse train on one or both trackpads
pub fn feedback(
    position: HapticPosition,
    amplitude: u16,
    period: u16,
    count: u16,
) -> FeatureReport {
    let mut data = packet(&[packet_type::FEEDBACK, 0x08, position as u8]);
    LittleEndian::write_u16(&mut data[3..5], amplitude);
    LittleEndian::write_u16(&mut data[5..7], period);
    LittleEndian::write_u16(&mut data[7..9], count);
    data
}
