//! In-memory collaborators for driver tests

#![allow(dead_code)]

use common::test_utils::create_serial_response;
use driver::{
    Controller, ControllerRegistry, InputHandler, Mapper, MapperResult, OutputQueue,
    SessionSettings, SharedMapper, TransportError, UsbTransport,
};
use protocol::{ControllerInput, ENDPOINT, HapticPosition};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Settings whose sync loop never fires on its own during a test
pub fn manual_settings() -> SessionSettings {
    SessionSettings {
        sync_period: Duration::from_secs(3600),
        ..SessionSettings::default()
    }
}

pub struct MockTransport {
    claim: Mutex<Result<u8, TransportError>>,
    serial: Mutex<Result<Vec<u8>, TransportError>>,
    handler: Mutex<Option<InputHandler>>,
    queue: OutputQueue,
    flushed: Mutex<Vec<(u16, Vec<u8>)>>,
    calls: Mutex<Vec<&'static str>>,
    fail_flush: AtomicBool,
    closed: AtomicBool,
}

impl MockTransport {
    fn new(
        claim: Result<u8, TransportError>,
        serial: Result<Vec<u8>, TransportError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            claim: Mutex::new(claim),
            serial: Mutex::new(serial),
            handler: Mutex::new(None),
            queue: OutputQueue::new(),
            flushed: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_flush: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_serial(serial: &str) -> Arc<Self> {
        Self::new(Ok(2), Ok(create_serial_response(serial)))
    }

    pub fn failing_claim() -> Arc<Self> {
        let serial = create_serial_response("ABC123");
        Self::new(Err(TransportError::Access), Ok(serial))
    }

    pub fn with_serial_response(response: Result<Vec<u8>, TransportError>) -> Arc<Self> {
        Self::new(Ok(2), response)
    }

    /// Deliver a raw report through the registered interrupt handler
    pub fn deliver(&self, data: &[u8]) {
        if let Some(handler) = self.handler.lock().unwrap().as_mut() {
            handler(ENDPOINT, data);
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn flushed(&self) -> Vec<(u16, Vec<u8>)> {
        self.flushed.lock().unwrap().clone()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn fail_flushes(&self) {
        self.fail_flush.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl UsbTransport for MockTransport {
    fn claim_by(&self, _class: u8, _subclass: u8, _protocol: u8) -> Result<u8, TransportError> {
        self.record("claim");
        self.claim.lock().unwrap().clone()
    }

    fn set_input_interrupt(
        &self,
        endpoint: u8,
        _size: usize,
        handler: InputHandler,
    ) -> Result<(), TransportError> {
        assert_eq!(endpoint, ENDPOINT);
        self.record("interrupt");
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn make_request(&self, _index: u16, _request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.record("request");
        self.serial.lock().unwrap().clone()
    }

    fn send_control(&self, index: u16, data: &[u8]) {
        self.queue.push(index, data);
    }

    fn overwrite_control(&self, index: u16, data: &[u8]) {
        self.queue.overwrite(index, data);
    }

    fn flush(&self) -> Result<(), TransportError> {
        self.record("flush");
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(TransportError::NoDevice);
        }
        self.flushed.lock().unwrap().extend(self.queue.drain());
        Ok(())
    }

    fn close(&self) {
        self.record("close");
        self.closed.store(true, Ordering::SeqCst);
        self.handler.lock().unwrap().take();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Input { previous: u16, current: u16 },
    RunScheduled,
    GenerateEvents,
    GenerateFeedback,
}

/// How a [`RecordingMapper`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Error,
    Panic,
}

pub struct RecordingMapper {
    calls: Arc<Mutex<Vec<Call>>>,
    fault: Fault,
    rumble: bool,
    last_tick: Option<Instant>,
}

impl RecordingMapper {
    pub fn new(calls: Arc<Mutex<Vec<Call>>>) -> Self {
        Self {
            calls,
            fault: Fault::None,
            rumble: false,
            last_tick: None,
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    /// Emit a haptic pulse from every feedback step
    pub fn with_rumble(mut self) -> Self {
        self.rumble = true;
        self
    }

    fn record(&mut self, call: Call) -> MapperResult {
        self.calls.lock().unwrap().push(call);
        match self.fault {
            Fault::None => Ok(()),
            Fault::Error => Err("mapper exploded".into()),
            Fault::Panic => panic!("mapper bug"),
        }
    }
}

impl Mapper for RecordingMapper {
    fn input(
        &mut self,
        _controller: &dyn Controller,
        previous: &ControllerInput,
        current: &ControllerInput,
    ) -> MapperResult {
        self.record(Call::Input {
            previous: previous.seq,
            current: current.seq,
        })
    }

    fn run_scheduled(&mut self, now: Instant) -> MapperResult {
        if let Some(last) = self.last_tick {
            assert!(now >= last);
        }
        self.last_tick = Some(now);
        self.record(Call::RunScheduled)
    }

    fn generate_events(&mut self) -> MapperResult {
        self.record(Call::GenerateEvents)
    }

    fn generate_feedback(&mut self, controller: &dyn Controller) -> MapperResult {
        if self.rumble {
            controller.feedback(HapticPosition::Left, 512, 1024, 1);
        }
        self.record(Call::GenerateFeedback)
    }
}

/// Registry that records ids and binds a mapper to every added controller
#[derive(Default)]
pub struct RecordingRegistry {
    added: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    mapper: Option<SharedMapper>,
}

impl RecordingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_mapper(mapper: SharedMapper) -> Arc<Self> {
        Arc::new(Self {
            mapper: Some(mapper),
            ..Self::default()
        })
    }

    pub fn added(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

impl ControllerRegistry for RecordingRegistry {
    fn add_controller(&self, controller: Arc<dyn Controller>) {
        if let Some(mapper) = &self.mapper {
            controller.set_mapper(Arc::downgrade(mapper));
        }
        self.added
            .lock()
            .unwrap()
            .push(controller.id().unwrap_or_default().to_string());
    }

    fn remove_controller(&self, controller: &dyn Controller) {
        self.removed
            .lock()
            .unwrap()
            .push(controller.id().unwrap_or_default().to_string());
    }
}

pub fn shared_mapper(mapper: RecordingMapper) -> SharedMapper {
    Arc::new(Mutex::new(mapper))
}

/// A mapper plus the log of calls it received
pub fn recording_mapper() -> (SharedMapper, Arc<Mutex<Vec<Call>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mapper = shared_mapper(RecordingMapper::new(Arc::clone(&calls)));
    (mapper, calls)
}

pub fn input_call(previous: u16, current: u16) -> Call {
    Call::Input { previous, current }
}

/// Number of recorded calls equal to `call`
pub fn count_calls(calls: &Mutex<Vec<Call>>, call: &Call) -> usize {
    calls.lock().unwrap().iter().filter(|c| *c == call).count()
}
