//! Input-mapping engine interface
//!
//! The mapper is owned by whoever registered the controller. Controllers
//! only keep a weak handle and must cope with it being absent.

use crate::controller::Controller;
use protocol::ControllerInput;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub type MapperError = Box<dyn std::error::Error + Send + Sync>;
pub type MapperResult = Result<(), MapperError>;

/// Shared handle to a mapper, as held by its owner
pub type SharedMapper = Arc<Mutex<dyn Mapper>>;

/// Engine translating controller state into actions and feedback
///
/// Every call happens from the session's sync thread with the session state
/// locked; implementations must not call back into the session lifecycle.
pub trait Mapper: Send {
    /// Consume a fresh input sample; `previous` is the last forwarded sample
    fn input(
        &mut self,
        controller: &dyn Controller,
        previous: &ControllerInput,
        current: &ControllerInput,
    ) -> MapperResult;

    /// Run scheduled work due at `now`
    fn run_scheduled(&mut self, now: Instant) -> MapperResult;

    /// Synthesize events from the current state
    fn generate_events(&mut self) -> MapperResult;

    /// Queue haptic/LED output reflecting the events just generated
    fn generate_feedback(&mut self, controller: &dyn Controller) -> MapperResult;
}
