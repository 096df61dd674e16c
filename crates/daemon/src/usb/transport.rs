//! libusb-backed controller transport
//!
//! Implements [`UsbTransport`] on top of an open `rusb` device handle.
//! Interrupt input is polled by a dedicated reader thread with a short
//! read timeout so it can be stopped promptly; feature reports go through
//! HID class requests on the control endpoint.

use driver::{InputHandler, OutputQueue, TransportError, UsbTransport};
use protocol::REPORT_SIZE;
use rusb::{Context, Device, DeviceHandle, Direction, Recipient, RequestType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Timeout for interrupt reads (short to keep the reader responsive to stop)
const INTERRUPT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Pause after an unexpected read error before polling again
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(50);

const CONTROL_TIMEOUT: Duration = Duration::from_millis(500);

/// HID class request codes
const HID_GET_REPORT: u8 = 0x01;
const HID_SET_REPORT: u8 = 0x09;

/// wValue selecting feature report 0
const FEATURE_REPORT: u16 = 0x0300;

/// Endpoint direction bit for IN transfers
const ENDPOINT_IN: u8 = 0x80;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Map a libusb error onto the transport error kinds the driver knows
pub fn map_rusb_error(e: rusb::Error) -> TransportError {
    match e {
        rusb::Error::NotFound => TransportError::NotFound,
        rusb::Error::Access => TransportError::Access,
        rusb::Error::NoDevice => TransportError::NoDevice,
        rusb::Error::Timeout => TransportError::Timeout,
        other => TransportError::Other(other.to_string()),
    }
}

/// Interface claimed by this transport
#[derive(Debug, Clone, Copy)]
struct ClaimedInterface {
    number: u8,
    /// A kernel driver was detached and must be reattached on release
    reattach: bool,
}

struct InterruptReader {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

pub struct RusbTransport {
    device: Device<Context>,
    handle: Arc<DeviceHandle<Context>>,
    claimed: Mutex<Vec<ClaimedInterface>>,
    queue: OutputQueue,
    reader: Mutex<Option<InterruptReader>>,
    closed: AtomicBool,
}

impl RusbTransport {
    pub fn open(device: &Device<Context>) -> Result<Self, TransportError> {
        let handle = device.open().map_err(|e| {
            warn!(
                "Failed to open device on bus {} address {}: {}",
                device.bus_number(),
                device.address(),
                e
            );
            map_rusb_error(e)
        })?;

        Ok(Self {
            device: device.clone(),
            handle: Arc::new(handle),
            claimed: Mutex::new(Vec::new()),
            queue: OutputQueue::new(),
            reader: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of the first interface in the active configuration matching
    /// the class triple
    fn find_interface(&self, class: u8, subclass: u8, protocol: u8) -> Result<u8, TransportError> {
        let config = self
            .device
            .active_config_descriptor()
            .map_err(map_rusb_error)?;

        config
            .interfaces()
            .flat_map(|interface| interface.descriptors())
            .find(|desc| {
                desc.class_code() == class
                    && desc.sub_class_code() == subclass
                    && desc.protocol_code() == protocol
            })
            .map(|desc| desc.interface_number())
            .ok_or(TransportError::NoInterface {
                class,
                subclass,
                protocol,
            })
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn stop_reader(&self) {
        let Some(reader) = lock(&self.reader).take() else {
            return;
        };
        reader.running.store(false, Ordering::Release);

        // The last session reference may be dropped from inside the reader
        if reader.thread.thread().id() == thread::current().id() {
            return;
        }
        if reader.thread.join().is_err() {
            warn!("Interrupt reader thread panicked");
        }
    }

    fn release_interfaces(&self) {
        for interface in lock(&self.claimed).drain(..) {
            if let Err(e) = self.handle.release_interface(interface.number) {
                debug!("Failed to release interface {}: {}", interface.number, e);
            }
            if interface.reattach {
                match self.handle.attach_kernel_driver(interface.number) {
                    Ok(()) => debug!("Reattached kernel driver to interface {}", interface.number),
                    Err(e) => debug!(
                        "Could not reattach kernel driver to interface {}: {}",
                        interface.number, e
                    ),
                }
            }
        }
    }
}

impl UsbTransport for RusbTransport {
    fn claim_by(&self, class: u8, subclass: u8, protocol: u8) -> Result<u8, TransportError> {
        self.ensure_open()?;
        let number = self.find_interface(class, subclass, protocol)?;

        let reattach = match self.handle.kernel_driver_active(number) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", number);
                self.handle
                    .detach_kernel_driver(number)
                    .map_err(map_rusb_error)?;
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    number, e
                );
                false
            }
        };

        if let Err(e) = self.handle.claim_interface(number) {
            if reattach {
                let _ = self.handle.attach_kernel_driver(number);
            }
            return Err(map_rusb_error(e));
        }

        lock(&self.claimed).push(ClaimedInterface { number, reattach });
        Ok(number)
    }

    fn set_input_interrupt(
        &self,
        endpoint: u8,
        size: usize,
        mut handler: InputHandler,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut reader = lock(&self.reader);
        if reader.is_some() {
            return Err(TransportError::Other(
                "interrupt reader already running".to_string(),
            ));
        }

        let running = Arc::new(AtomicBool::new(true));
        let handle = Arc::clone(&self.handle);
        let flag = Arc::clone(&running);
        let address = ENDPOINT_IN | endpoint;

        let thread = thread::Builder::new()
            .name(format!("sc-input-{:#04x}", address))
            .spawn(move || {
                let mut buf = vec![0u8; size];
                while flag.load(Ordering::Acquire) {
                    match handle.read_interrupt(address, &mut buf, INTERRUPT_READ_TIMEOUT) {
                        Ok(len) => {
                            trace!("Interrupt report on {:#04x}: {} bytes", address, len);
                            handler(endpoint, &buf[..len]);
                        }
                        Err(rusb::Error::Timeout) => {}
                        Err(rusb::Error::NoDevice) => {
                            debug!("Device gone, stopping interrupt reader on {:#04x}", address);
                            break;
                        }
                        Err(e) => {
                            warn!("Interrupt read on {:#04x} failed: {}", address, e);
                            thread::sleep(READ_ERROR_BACKOFF);
                        }
                    }
                }
            })
            .map_err(|e| TransportError::Other(format!("failed to spawn reader: {}", e)))?;

        *reader = Some(InterruptReader { running, thread });
        Ok(())
    }

    fn make_request(&self, index: u16, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.ensure_open()?;

        let mut report = [0u8; REPORT_SIZE];
        let len = request.len().min(REPORT_SIZE);
        report[..len].copy_from_slice(&request[..len]);

        self.handle
            .write_control(
                rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface),
                HID_SET_REPORT,
                FEATURE_REPORT,
                index,
                &report,
                CONTROL_TIMEOUT,
            )
            .map_err(map_rusb_error)?;

        let mut response = [0u8; REPORT_SIZE];
        let read = self
            .handle
            .read_control(
                rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface),
                HID_GET_REPORT,
                FEATURE_REPORT,
                index,
                &mut response,
                CONTROL_TIMEOUT,
            )
            .map_err(map_rusb_error)?;

        Ok(response[..read].to_vec())
    }

    fn send_control(&self, index: u16, data: &[u8]) {
        self.queue.push(index, data);
    }

    fn overwrite_control(&self, index: u16, data: &[u8]) {
        self.queue.overwrite(index, data);
    }

    fn flush(&self) -> Result<(), TransportError> {
        self.ensure_open()?;

        let mut messages = self.queue.drain().into_iter();
        while let Some((index, data)) = messages.next() {
            let result = self.handle.write_control(
                rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface),
                HID_SET_REPORT,
                FEATURE_REPORT,
                index,
                &data,
                CONTROL_TIMEOUT,
            );

            if let Err(e) = result {
                let mut unsent = vec![(index, data)];
                unsent.extend(messages);
                self.queue.requeue(unsent);
                return Err(map_rusb_error(e));
            }
        }
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_reader();
        self.release_interfaces();
        debug!(
            "Closed transport on bus {} address {}",
            self.device.bus_number(),
            self.device.address()
        );
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        self.close();
    }
}
