//! Registry of ready controllers
//!
//! Owns the mapper bound to each controller and reports arrivals and
//! departures to the async side of the daemon.

use crate::mapper::LoggingMapper;
use async_channel::Sender;
use common::DaemonEvent;
use common::channel::publish_event;
use driver::{Controller, ControllerRegistry, SharedMapper};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

pub struct DaemonRegistry {
    events: Sender<DaemonEvent>,
    log_input: bool,
    /// Ready controllers by id, with the mapper the registry keeps alive
    controllers: Mutex<HashMap<String, Option<SharedMapper>>>,
}

impl DaemonRegistry {
    pub fn new(events: Sender<DaemonEvent>, log_input: bool) -> Self {
        Self {
            events,
            log_input,
            controllers: Mutex::new(HashMap::new()),
        }
    }

    pub fn controller_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl ControllerRegistry for DaemonRegistry {
    fn add_controller(&self, controller: Arc<dyn Controller>) {
        let Some(id) = controller.id().map(str::to_string) else {
            warn!("Refusing to register a controller without serial");
            return;
        };

        let mapper = self.log_input.then(|| {
            let mapper: SharedMapper = Arc::new(Mutex::new(LoggingMapper::new(id.clone())));
            controller.set_mapper(Arc::downgrade(&mapper));
            mapper
        });

        let replaced = self
            .controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), mapper)
            .is_some();
        if replaced {
            warn!("Controller {} registered twice", id);
        }

        info!("Controller {} added", id);
        publish_event(&self.events, DaemonEvent::ControllerAdded { id });
    }

    fn remove_controller(&self, controller: &dyn Controller) {
        let Some(id) = controller.id().map(str::to_string) else {
            return;
        };

        let known = self
            .controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if !known {
            warn!("Removing unknown controller {}", id);
            return;
        }

        info!("Controller {} removed", id);
        publish_event(&self.events, DaemonEvent::ControllerRemoved { id });
    }
}
