//! Fixed-layout input report codec
//!
//! Every input report is exactly [`REPORT_SIZE`] bytes, little-endian:
//!
//! ```text
//! 0..2   header (ignored)        16..24 lpad_x lpad_y rpad_x rpad_y (i16)
//! 2      status                  24..28 (ignored)
//! 3      payload length (ign.)   28..34 accel x/y/z (i16)
//! 4..6   seq (u16)               34..40 gyro pitch/roll/yaw (i16)
//! 6      (ignored)               40..48 quaternion q1..q4 (i16)
//! 7..11  buttons (u32)           48..64 (ignored)
//! 11     ltrig  12 rtrig
//! ```

use crate::error::{ProtocolError, Result};
use crate::types::{ControllerInput, REPORT_SIZE, StatusCode};
use byteorder::{ByteOrder, LittleEndian};

const STATUS: usize = 2;
const SEQ: usize = 4;
const BUTTONS: usize = 7;
const LTRIG: usize = 11;
const RTRIG: usize = 12;
const LPAD: usize = 16;
const RPAD: usize = 20;
const ACCEL: usize = 28;
const GYRO: usize = 34;
const QUAT: usize = 40;

/// Decode a raw input report
///
/// # Example
/// ```
/// use protocol::{decode, StatusCode, REPORT_SIZE};
///
/// let mut raw = [0u8; REPORT_SIZE];
/// raw[2] = 0x01;
/// let input = decode(&raw).unwrap();
/// assert_eq!(input.status, StatusCode::Input);
///
/// assert!(decode(&raw[..10]).is_err());
/// ```
pub fn decode(data: &[u8]) -> Result<ControllerInput> {
    if data.len() != REPORT_SIZE {
        return Err(ProtocolError::MalformedPacket {
            expected: REPORT_SIZE,
            actual: data.len(),
        });
    }

    let status =
        StatusCode::from_byte(data[STATUS]).ok_or(ProtocolError::UnknownStatus(data[STATUS]))?;
    let i16_at = |offset: usize| LittleEndian::read_i16(&data[offset..offset + 2]);

    Ok(ControllerInput {
        status,
        seq: LittleEndian::read_u16(&data[SEQ..SEQ + 2]),
        buttons: LittleEndian::read_u32(&data[BUTTONS..BUTTONS + 4]),
        ltrig: data[LTRIG],
        rtrig: data[RTRIG],
        lpad_x: i16_at(LPAD),
        lpad_y: i16_at(LPAD + 2),
        rpad_x: i16_at(RPAD),
        rpad_y: i16_at(RPAD + 2),
        accel_x: i16_at(ACCEL),
        accel_y: i16_at(ACCEL + 2),
        accel_z: i16_at(ACCEL + 4),
        gpitch: i16_at(GYRO),
        groll: i16_at(GYRO + 2),
        gyaw: i16_at(GYRO + 4),
        q1: i16_at(QUAT),
        q2: i16_at(QUAT + 2),
        q3: i16_at(QUAT + 4),
        q4: i16_at(QUAT + 6),
    })
}

/// Encode a report back into its wire layout
///
/// Bytes the decoder ignores are written as zero, so `decode(&encode(x))`
/// always yields `x`.
pub fn encode(input: &ControllerInput) -> [u8; REPORT_SIZE] {
    let mut data = [0u8; REPORT_SIZE];
    data[STATUS] = input.status.as_byte();
    LittleEndian::write_u16(&mut data[SEQ..SEQ + 2], input.seq);
    LittleEndian::write_u32(&mut data[BUTTONS..BUTTONS + 4], input.buttons);
    data[LTRIG] = input.ltrig;
    data[RTRIG] = input.rtrig;

    let fields = [
        (LPAD, input.lpad_x),
        (LPAD + 2, input.lpad_y),
        (RPAD, input.rpad_x),
        (RPAD + 2, input.rpad_y),
        (ACCEL, input.accel_x),
        (ACCEL + 2, input.accel_y),
        (ACCEL + 4, input.accel_z),
        (GYRO, input.gpitch),
        (GYRO + 2, input.groll),
        (GYRO + 4, input.gyaw),
        (QUAT, input.q1),
        (QUAT + 2, input.q2),
        (QUAT + 4, input.q3),
        (QUAT + 6, input.q4),
    ];
    for (offset, value) in fields {
        LittleEndian::write_i16(&mut data[offset..offset + 2], value);
    }

    data
}
