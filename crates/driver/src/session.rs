//! Wired controller session lifecycle
//!
//! ```text
//! Discovered -> Claiming -> AwaitingSerial -> Ready -> Closed
//!                   \              \
//!                    +--------------+-----> Closed (failure or early close)
//! ```
//!
//! The sync thread starts with the session. The interrupt handler is
//! registered once the serial is known, and the first `INPUT` report makes
//! the session ready and registers it with the daemon.

use crate::controller::{CableController, Controller, ControllerSettings};
use crate::error::{DriverError, Result};
use crate::identity;
use crate::lock;
use crate::registry::ControllerRegistry;
use crate::sync_loop::{self, Liveness};
use crate::transport::UsbTransport;
use protocol::{
    CONTROLIDX, ControllerInput, ENDPOINT, HID_CLASS, HID_PROTOCOL, HID_SUBCLASS, REPORT_SIZE,
};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Period of the sync loop unless configured otherwise
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Discovered,
    Claiming,
    AwaitingSerial,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Discovered => "Discovered",
            SessionState::Claiming => "Claiming",
            SessionState::AwaitingSerial => "AwaitingSerial",
            SessionState::Ready => "Ready",
            SessionState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// What one synchronization step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Pending input went to the mapper
    Forwarded,
    /// No input arrived; the mapper ran its scheduled work, events and feedback
    Ticked,
    /// No mapper bound; output was still flushed
    Unbound,
    /// Session already closed; nothing happened
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub sync_period: Duration,
    pub controller: ControllerSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sync_period: DEFAULT_SYNC_PERIOD,
            controller: ControllerSettings::default(),
        }
    }
}

/// State shared by the interrupt handler and the sync loop
#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    /// Most recent unconsumed `INPUT` report
    pending: Option<ControllerInput>,
    /// Last report forwarded to the mapper
    previous: ControllerInput,
    steps: u64,
    superseded: u64,
}

pub(crate) struct SessionShared {
    transport: Arc<dyn UsbTransport>,
    controller: Arc<CableController>,
    registry: Arc<dyn ControllerRegistry>,
    inner: Mutex<SessionInner>,
    pub(crate) liveness: Liveness,
    pub(crate) period: Duration,
    sync_thread: Mutex<Option<JoinHandle<()>>>,
}

/// One physical controller connected by cable
pub struct CableSession {
    shared: Arc<SessionShared>,
}

impl CableSession {
    /// Bring up a session for a freshly discovered controller
    ///
    /// Starts the sync loop, claims the HID interface, reads the serial and
    /// registers the input interrupt. On any failure the session is closed
    /// before the error is returned.
    pub fn open(
        transport: Arc<dyn UsbTransport>,
        registry: Arc<dyn ControllerRegistry>,
        settings: SessionSettings,
    ) -> Result<Self> {
        let controller = Arc::new(CableController::new(
            Arc::clone(&transport),
            CONTROLIDX,
            settings.controller,
        ));
        let shared = Arc::new(SessionShared {
            transport,
            controller,
            registry,
            inner: Mutex::new(SessionInner {
                state: SessionState::Discovered,
                pending: None,
                previous: ControllerInput::NULL,
                steps: 0,
                superseded: 0,
            }),
            liveness: Liveness::new(),
            period: settings.sync_period,
            sync_thread: Mutex::new(None),
        });
        let session = CableSession { shared };

        session.shared.spawn_sync_loop()?;

        if let Err(e) = session.bring_up() {
            error!("Failed to bring up {}: {}", session.shared.controller, e);
            session.close();
            return Err(e);
        }

        Ok(session)
    }

    fn bring_up(&self) -> Result<()> {
        let shared = &self.shared;

        shared.advance(SessionState::Discovered, SessionState::Claiming)?;
        let interface = shared
            .transport
            .claim_by(HID_CLASS, HID_SUBCLASS, HID_PROTOCOL)
            .map_err(DriverError::Claim)?;
        debug!("Claimed interface {}", interface);

        shared.advance(SessionState::Claiming, SessionState::AwaitingSerial)?;
        let serial = identity::acquire_serial(shared.transport.as_ref(), CONTROLIDX)?;
        shared.controller.identity().assign(&serial)?;
        debug!("Got wired controller with serial {}", serial);

        let weak = Arc::downgrade(shared);
        shared.transport.set_input_interrupt(
            ENDPOINT,
            REPORT_SIZE,
            Box::new(move |endpoint, data| {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_input(endpoint, data);
                }
            }),
        )?;

        Ok(())
    }

    /// Run one synchronization step now
    ///
    /// The sync loop calls this once per period.
    pub fn sync_step(&self) -> Result<StepOutcome> {
        self.shared.sync_step(Instant::now())
    }

    /// Feed a raw report as if it arrived on the input interrupt
    pub fn handle_input(&self, endpoint: u8, data: &[u8]) {
        self.shared.handle_input(endpoint, data);
    }

    /// Tear the session down
    ///
    /// Deregisters the controller if it was ready, stops the sync loop,
    /// releases the transport and joins the sync thread. Calling it again
    /// does nothing.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Power the controller off, if it supports that
    ///
    /// A cable-powered controller has no standby state: the request is
    /// logged and ignored.
    pub fn turnoff(&self) {
        match self.shared.controller.power_control() {
            Some(power) => power.turn_off(),
            None => warn!("Ignoring request to turn off {}", self.shared.controller),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared.inner).state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn id(&self) -> Option<&str> {
        self.shared.controller.id()
    }

    pub fn controller(&self) -> Arc<CableController> {
        Arc::clone(&self.shared.controller)
    }

    /// Whether an input report is waiting for the next sync step
    pub fn has_pending_input(&self) -> bool {
        lock(&self.shared.inner).pending.is_some()
    }

    /// Number of sync steps that ran to completion
    pub fn steps(&self) -> u64 {
        lock(&self.shared.inner).steps
    }

    /// Number of `INPUT` reports overwritten before a sync step consumed them
    pub fn superseded_reports(&self) -> u64 {
        lock(&self.shared.inner).superseded
    }
}

impl Drop for CableSession {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl fmt::Display for CableSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.shared.controller.fmt(f)
    }
}

impl SessionShared {
    fn spawn_sync_loop(self: &Arc<Self>) -> Result<()> {
        let shared = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("sc-sync".to_string())
            .spawn(move || sync_loop::run(shared))?;
        *lock(&self.sync_thread) = Some(handle);
        Ok(())
    }

    /// Move from `from` to `to`, failing if the session left `from` meanwhile
    fn advance(&self, from: SessionState, to: SessionState) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.state != from {
            return Err(DriverError::Transport(crate::TransportError::Closed));
        }
        trace!("Session {} -> {}", from, to);
        inner.state = to;
        Ok(())
    }

    /// Interrupt input handler
    pub(crate) fn handle_input(&self, endpoint: u8, data: &[u8]) {
        let input = match decode_report(data) {
            Ok(input) => input,
            Err(e) => {
                debug!("Dropping report from endpoint {}: {}", endpoint, e);
                return;
            }
        };

        let mut inner = lock(&self.inner);
        match inner.state {
            SessionState::Ready => {}
            SessionState::AwaitingSerial
                if input.is_input() && self.controller.identity().is_acquired() =>
            {
                self.become_ready(&mut inner);
            }
            state => {
                trace!("Ignoring {:?} report in state {}", input.status, state);
                return;
            }
        }

        if input.is_input() && inner.pending.replace(input).is_some() {
            inner.superseded += 1;
            trace!("Superseded unconsumed report, seq {}", input.seq);
        }
    }

    fn become_ready(&self, inner: &mut SessionInner) {
        let controller: Arc<dyn Controller> = self.controller.clone();
        self.registry.add_controller(controller);
        self.controller.configure();
        inner.state = SessionState::Ready;
        info!("{} is ready", self.controller);
    }

    pub(crate) fn sync_step(&self, now: Instant) -> Result<StepOutcome> {
        let mut inner = lock(&self.inner);
        if inner.state == SessionState::Closed {
            return Ok(StepOutcome::Skipped);
        }

        let step = AssertUnwindSafe(|| self.step_locked(&mut inner, now));
        let outcome = panic::catch_unwind(step).unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            Err(DriverError::SyncStep(format!("mapper panicked: {}", message)))
        })?;

        inner.steps += 1;
        Ok(outcome)
    }

    fn step_locked(&self, inner: &mut SessionInner, now: Instant) -> Result<StepOutcome> {
        let outcome = match self.controller.mapper() {
            Some(mapper) => {
                let mut engine = lock(&mapper);
                match inner.pending.take() {
                    Some(current) => {
                        engine
                            .input(self.controller.as_ref(), &inner.previous, &current)
                            .map_err(|e| sync_failure("input", e))?;
                        inner.previous = current;
                        StepOutcome::Forwarded
                    }
                    None => {
                        engine
                            .run_scheduled(now)
                            .map_err(|e| sync_failure("run_scheduled", e))?;
                        engine
                            .generate_events()
                            .map_err(|e| sync_failure("generate_events", e))?;
                        engine
                            .generate_feedback(self.controller.as_ref())
                            .map_err(|e| sync_failure("generate_feedback", e))?;
                        StepOutcome::Ticked
                    }
                }
            }
            None => StepOutcome::Unbound,
        };

        self.transport
            .flush()
            .map_err(|e| DriverError::SyncStep(format!("flush failed: {}", e)))?;

        Ok(outcome)
    }

    pub(crate) fn close(&self) {
        let was_ready = {
            let mut inner = lock(&self.inner);
            if inner.state == SessionState::Closed {
                return;
            }
            let was_ready = inner.state == SessionState::Ready;
            inner.state = SessionState::Closed;
            inner.pending = None;
            was_ready
        };

        if was_ready {
            self.registry.remove_controller(self.controller.as_ref());
        }
        self.controller.clear_mapper();
        self.liveness.clear();
        self.transport.close();

        let handle = lock(&self.sync_thread).take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            error!("Sync thread of {} panicked", self.controller);
        }

        info!("Closed {}", self.controller);
    }
}

/// Decode an interrupt report, rejecting anything off the fixed layout
fn decode_report(data: &[u8]) -> Result<ControllerInput> {
    Ok(protocol::decode(data)?)
}

fn sync_failure(call: &str, e: crate::MapperError) -> DriverError {
    DriverError::SyncStep(format!("mapper {} failed: {}", call, e))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ProtocolError, StatusCode};

    #[test]
    fn test_decode_report_rejects_short_report() {
        match decode_report(&[0u8; 10]) {
            Err(DriverError::MalformedPacket(e)) => assert!(e.is_malformed()),
            other => panic!("expected malformed packet, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_report_rejects_unknown_status() {
        let mut report = [0u8; REPORT_SIZE];
        report[2] = 0x42;
        assert!(matches!(
            decode_report(&report),
            Err(DriverError::MalformedPacket(ProtocolError::UnknownStatus(0x42)))
        ));
    }

    #[test]
    fn test_decode_report_accepts_input() {
        let mut report = [0u8; REPORT_SIZE];
        report[2] = StatusCode::Input.as_byte();
        let input = decode_report(&report).unwrap();
        assert!(input.is_input());
    }
}
