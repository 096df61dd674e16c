//! Controller protocol session
//!
//! [`CableController`] is what the registry and the mapper see: it knows the
//! controller id, holds the weak mapper handle and turns feedback requests
//! into feature reports queued on the transport.

use crate::identity::Identity;
use crate::mapper::{Mapper, SharedMapper};
use crate::transport::UsbTransport;
use protocol::{HapticPosition, packets};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::debug;

/// Power management, available only where the hardware has a standby state
pub trait PowerControl: Send + Sync {
    fn turn_off(&self);
}

/// Controller as seen by the registry and by mappers
pub trait Controller: Send + Sync {
    /// `sc<serial>`, once the serial is known
    fn id(&self) -> Option<&str>;

    /// Short type tag used by profiles
    fn controller_type(&self) -> &'static str;

    /// Bind a mapper; the controller keeps only a weak reference
    fn set_mapper(&self, mapper: Weak<Mutex<dyn Mapper>>);

    fn clear_mapper(&self);

    /// The bound mapper, if one is bound and still alive
    fn mapper(&self) -> Option<SharedMapper>;

    /// Queue a haptic pulse train
    fn feedback(&self, position: HapticPosition, amplitude: u16, period: u16, count: u16);

    /// Queue a logo LED brightness change
    fn set_led_level(&self, level: u8);

    /// Power control capability; `None` when the controller cannot be turned off
    fn power_control(&self) -> Option<&dyn PowerControl> {
        None
    }
}

/// Configuration pushed to the controller when it becomes ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub idle_timeout_secs: u16,
    pub led_level: u8,
    pub enable_gyros: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 600,
            led_level: 50,
            enable_gyros: false,
        }
    }
}

/// Protocol half of a wired controller session
pub struct CableController {
    transport: Arc<dyn UsbTransport>,
    index: u16,
    identity: Identity,
    mapper: RwLock<Option<Weak<Mutex<dyn Mapper>>>>,
    led_level: AtomicU8,
    settings: ControllerSettings,
}

impl CableController {
    pub fn new(transport: Arc<dyn UsbTransport>, index: u16, settings: ControllerSettings) -> Self {
        Self {
            transport,
            index,
            identity: Identity::new(),
            mapper: RwLock::new(None),
            led_level: AtomicU8::new(settings.led_level.min(packets::MAX_LED_LEVEL)),
            settings,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn led_level(&self) -> u8 {
        self.led_level.load(Ordering::Relaxed)
    }

    /// Queue the packets that switch the controller out of lizard mode and
    /// apply idle timeout, gyro and LED settings
    ///
    /// Sent on the next flush.
    pub fn configure(&self) {
        debug!("Configuring {}", self);
        self.transport.send_control(self.index, &packets::clear_mappings());
        self.transport.overwrite_control(
            self.index,
            &packets::configure(self.settings.idle_timeout_secs, self.settings.enable_gyros),
        );
        self.transport.overwrite_control(self.index, &packets::led(self.led_level()));
    }
}

impl Controller for CableController {
    fn id(&self) -> Option<&str> {
        self.identity.get()
    }

    fn controller_type(&self) -> &'static str {
        "sc"
    }

    fn set_mapper(&self, mapper: Weak<Mutex<dyn Mapper>>) {
        *self.mapper.write().unwrap_or_else(PoisonError::into_inner) = Some(mapper);
    }

    fn clear_mapper(&self) {
        *self.mapper.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn mapper(&self) -> Option<SharedMapper> {
        self.mapper
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn feedback(&self, position: HapticPosition, amplitude: u16, period: u16, count: u16) {
        self.transport.overwrite_control(
            self.index,
            &packets::feedback(position, amplitude, period, count),
        );
    }

    fn set_led_level(&self, level: u8) {
        let level = level.min(packets::MAX_LED_LEVEL);
        self.led_level.store(level, Ordering::Relaxed);
        self.transport.overwrite_control(self.index, &packets::led(level));
    }
}

impl fmt::Display for CableController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wired controller {}", self.id().unwrap_or("<no serial>"))
    }
}
