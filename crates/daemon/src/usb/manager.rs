//! Controller manager
//!
//! Tracks one [`CableSession`] per connected wired controller. Runs in the
//! USB thread: hot-plug callbacks only queue events, which are processed
//! after `handle_events` returns, since libusb forbids synchronous
//! transfers from inside a callback.

use super::transport::RusbTransport;
use crate::registry::DaemonRegistry;
use async_channel::{Receiver, Sender, unbounded};
use common::ControllerSummary;
use driver::{CableSession, SessionSettings, SessionState};
use protocol::{PRODUCT_ID, VENDOR_ID};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bus number and device address
type DeviceKey = (u8, u8);

/// Hot-plug notification queued for the USB thread
enum HotplugEvent {
    Arrived(Device<Context>),
    Left(DeviceKey),
}

/// Whether a VID/PID pair is a wired Steam Controller
pub fn is_wired_controller(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == VENDOR_ID && product_id == PRODUCT_ID
}

pub struct ControllerManager {
    context: Context,
    sessions: HashMap<DeviceKey, CableSession>,
    registry: Arc<DaemonRegistry>,
    settings: SessionSettings,
    hotplug_tx: Sender<HotplugEvent>,
    hotplug_rx: Receiver<HotplugEvent>,
    _hotplug_registration: Option<Registration<Context>>,
}

impl ControllerManager {
    pub fn new(
        registry: Arc<DaemonRegistry>,
        settings: SessionSettings,
    ) -> Result<Self, rusb::Error> {
        let context = Context::new()?;
        let (hotplug_tx, hotplug_rx) = unbounded();

        Ok(Self {
            context,
            sessions: HashMap::new(),
            registry,
            settings,
            hotplug_tx,
            hotplug_rx,
            _hotplug_registration: None,
        })
    }

    /// Open sessions for controllers already connected and start watching
    /// for hot-plug events
    pub fn initialize(&mut self) -> Result<(), rusb::Error> {
        self.enumerate_controllers()?;

        if rusb::has_hotplug() {
            self.register_hotplug()?;
        } else {
            warn!("libusb has no hot-plug support, only controllers present at start are used");
        }

        info!(
            "Controller manager initialized with {} controller(s)",
            self.sessions.len()
        );
        Ok(())
    }

    fn enumerate_controllers(&mut self) -> Result<(), rusb::Error> {
        for device in self.context.devices()?.iter() {
            if is_controller(&device) {
                self.open_controller(device);
            }
        }
        Ok(())
    }

    fn register_hotplug(&mut self) -> Result<(), rusb::Error> {
        let callback = HotplugCallback {
            events: self.hotplug_tx.clone(),
        };

        let registration = HotplugBuilder::new()
            .vendor_id(VENDOR_ID)
            .product_id(PRODUCT_ID)
            .enumerate(false)
            .register(&self.context, Box::new(callback))?;

        self._hotplug_registration = Some(registration);
        debug!("Hot-plug callbacks registered");
        Ok(())
    }

    fn open_controller(&mut self, device: Device<Context>) {
        let key = (device.bus_number(), device.address());
        if self.sessions.contains_key(&key) {
            return;
        }

        let transport = match RusbTransport::open(&device) {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                warn!(
                    "Cannot open controller on bus {} address {}: {}",
                    key.0, key.1, e
                );
                return;
            }
        };

        let registry = Arc::clone(&self.registry);
        match CableSession::open(transport, registry, self.settings.clone()) {
            Ok(session) => {
                info!("Opened {} on bus {} address {}", session, key.0, key.1);
                self.sessions.insert(key, session);
            }
            Err(e) => warn!(
                "Failed to start session on bus {} address {}: {}",
                key.0, key.1, e
            ),
        }
    }

    fn close_controller(&mut self, key: DeviceKey) {
        if let Some(session) = self.sessions.remove(&key) {
            debug!("Controller on bus {} address {} left", key.0, key.1);
            session.close();
        }
    }

    /// Apply queued hot-plug events and forget sessions that closed
    /// themselves
    pub fn process_hotplug_events(&mut self) {
        while let Ok(event) = self.hotplug_rx.try_recv() {
            match event {
                HotplugEvent::Arrived(device) => self.open_controller(device),
                HotplugEvent::Left(key) => self.close_controller(key),
            }
        }

        self.sessions.retain(|key, session| {
            let open = session.state() != SessionState::Closed;
            if !open {
                warn!(
                    "Dropping failed session on bus {} address {}, replug to retry",
                    key.0, key.1
                );
            }
            open
        });
    }

    pub fn list_controllers(&self) -> Vec<ControllerSummary> {
        let mut summaries = Vec::with_capacity(self.sessions.len());
        for (&(bus_number, device_address), session) in &self.sessions {
            summaries.push(ControllerSummary {
                bus_number,
                device_address,
                id: session.id().map(str::to_string),
                state: session.state().to_string(),
            });
        }
        summaries.sort_by_key(|s| (s.bus_number, s.device_address));
        summaries
    }

    pub fn close_all(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        info!(
            "Closing {} session(s), ready: {:?}",
            self.sessions.len(),
            self.registry.controller_ids()
        );
        for (_, session) in self.sessions.drain() {
            session.close();
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl Drop for ControllerManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn is_controller<T: UsbContext>(device: &Device<T>) -> bool {
    device
        .device_descriptor()
        .map(|desc| is_wired_controller(desc.vendor_id(), desc.product_id()))
        .unwrap_or(false)
}

/// Forwards hot-plug notifications to the manager
struct HotplugCallback {
    events: Sender<HotplugEvent>,
}

impl Hotplug<Context> for HotplugCallback {
    fn device_arrived(&mut self, device: Device<Context>) {
        debug!(
            "Hot-plug: controller arrived (bus={}, addr={})",
            device.bus_number(),
            device.address()
        );
        if self.events.try_send(HotplugEvent::Arrived(device)).is_err() {
            warn!("Hot-plug event queue closed");
        }
    }

    fn device_left(&mut self, device: Device<Context>) {
        let key = (device.bus_number(), device.address());
        debug!("Hot-plug: controller left (bus={}, addr={})", key.0, key.1);
        if self.events.try_send(HotplugEvent::Left(key)).is_err() {
            warn!("Hot-plug event queue closed");
        }
    }
}
