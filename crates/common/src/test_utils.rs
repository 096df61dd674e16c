//! Test utilities for sc-cable
//!
//! Builders for raw controller reports and helpers shared by the test
//! suites of every crate.
//!
//! # Example
//!
//! ```
//! use common::test_utils::create_input_report;
//! use protocol::decode;
//!
//! let raw = create_input_report(3, 0x0001);
//! let input = decode(&raw).unwrap();
//! assert_eq!(input.seq, 3);
//! assert_eq!(input.buttons, 0x0001);
//! ```

use protocol::packets::packet_type;
use protocol::{ControllerInput, REPORT_SIZE, StatusCode, encode};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a raw `INPUT` report with the given sequence number and buttons
pub fn create_input_report(seq: u16, buttons: u32) -> Vec<u8> {
    encode(&ControllerInput {
        status: StatusCode::Input,
        seq,
        buttons,
        ..ControllerInput::NULL
    })
    .to_vec()
}

/// Create a raw idle keepalive report
pub fn create_idle_report(seq: u16) -> Vec<u8> {
    encode(&ControllerInput {
        status: StatusCode::Idle,
        seq,
        ..ControllerInput::NULL
    })
    .to_vec()
}

/// Create a raw report with an arbitrary status byte
pub fn create_report_with_status(status: u8) -> Vec<u8> {
    let mut data = vec![0u8; REPORT_SIZE];
    data[2] = status;
    data
}

/// Create the controller's answer to a serial-number request
///
/// # Example
/// ```
/// use common::test_utils::create_serial_response;
/// use protocol::parse_serial_response;
///
/// let response = create_serial_response("ABC123");
/// assert_eq!(parse_serial_response(&response).unwrap(), "ABC123");
/// ```
pub fn create_serial_response(serial: &str) -> Vec<u8> {
    let mut data = vec![0u8; REPORT_SIZE];
    data[0] = packet_type::GET_SERIAL;
    data[1] = (serial.len() + 1) as u8;
    data[2] = 0x01;
    data[3..3 + serial.len()].copy_from_slice(serial.as_bytes());
    data
}

/// Run a future with a timeout
///
/// # Example
/// ```
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// # #[tokio::main]
/// # async fn main() {
/// let value = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
/// assert_eq!(value, 42);
/// # }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test operation times out
#[derive(Debug)]
pub struct TimeoutError {
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

/// Poll `condition` until it holds or `timeout` elapses
///
/// For tests that wait on background threads (sync loops, reader threads).
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
