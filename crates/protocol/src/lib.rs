//! Wire protocol of the Steam Controller over a USB cable
//!
//! This crate knows the fixed layout of the 64-byte input reports and the
//! feature reports used to configure the controller. It does not interpret
//! buttons or axes.
//!
//! # Example
//!
//! ```
//! use protocol::{decode, encode, ControllerInput, StatusCode};
//!
//! let input = ControllerInput {
//!     seq: 7,
//!     ltrig: 128,
//!     ..ControllerInput::NULL
//! };
//! let raw = encode(&input);
//! let decoded = decode(&raw).unwrap();
//! assert_eq!(decoded.status, StatusCode::Input);
//! assert_eq!(decoded.ltrig, 128);
//! ```

pub mod codec;
pub mod error;
pub mod packets;
pub mod types;

pub use codec::{decode, encode};
pub use error::{ProtocolError, Result};
pub use packets::{FeatureReport, parse_serial_response};
pub use types::{
    CONTROLIDX, ControllerInput, ENDPOINT, HID_CLASS, HID_PROTOCOL, HID_SUBCLASS, HapticPosition,
    PRODUCT_ID, REPORT_SIZE, StatusCode, VENDOR_ID,
};
