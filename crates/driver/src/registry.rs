//! Daemon-side registry of live controllers

use crate::controller::Controller;
use std::sync::Arc;

/// Registry notified when a controller becomes ready and when it goes away
///
/// `add_controller` is called from the transport's input context while the
/// session state is locked, so implementations must return promptly and must
/// not close the session from inside the call.
pub trait ControllerRegistry: Send + Sync {
    fn add_controller(&self, controller: Arc<dyn Controller>);

    fn remove_controller(&self, controller: &dyn Controller);
}
