//! USB worker thread
//!
//! Owns the libusb context and every controller session. Pumps libusb
//! events and answers commands from the Tokio runtime over async channels.

use rusb::UsbContext;
use super::manager::ControllerManager;
use crate::registry::DaemonRegistry;
use common::{UsbCommand, UsbWorker};
use driver::SessionSettings;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound on how long a command waits for the worker loop
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

pub struct UsbWorkerThread {
    manager: ControllerManager,
    worker: UsbWorker,
}

impl UsbWorkerThread {
    pub fn new(
        worker: UsbWorker,
        settings: SessionSettings,
        log_input: bool,
    ) -> Result<Self, rusb::Error> {
        let registry = Arc::new(DaemonRegistry::new(worker.event_tx.clone(), log_input));
        let mut manager = ControllerManager::new(registry, settings)?;
        manager.initialize()?;

        Ok(Self { manager, worker })
    }

    /// Run until a `Shutdown` command arrives or the command channel closes
    pub fn run(mut self) -> Result<(), rusb::Error> {
        info!("USB worker thread started");

        loop {
            match self.worker.try_recv_command() {
                Some(UsbCommand::Shutdown) => {
                    info!("USB worker shutting down");
                    break;
                }
                Some(cmd) => self.handle_command(cmd),
                None if self.worker.is_disconnected() => {
                    warn!("Command channel closed, stopping USB worker");
                    break;
                }
                None => {}
            }

            match self.manager.context().handle_events(Some(EVENT_TIMEOUT)) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("USB event handling interrupted");
                }
                Err(e) => {
                    warn!("Error handling USB events: {}", e);
                    std::thread::sleep(EVENT_TIMEOUT);
                }
            }

            self.manager.process_hotplug_events();
        }

        self.manager.close_all();
        info!("USB worker thread stopped");
        Ok(())
    }

    fn handle_command(&mut self, cmd: UsbCommand) {
        match cmd {
            UsbCommand::ListControllers { response } => {
                let controllers = self.manager.list_controllers();
                debug!("Listing {} controller(s)", controllers.len());
                let _ = response.send(controllers);
            }
            UsbCommand::Shutdown => {
                error!("Shutdown must be handled by the worker loop");
            }
        }
    }
}

/// Spawn the USB worker thread
pub fn spawn_usb_worker(
    worker: UsbWorker,
    settings: SessionSettings,
    log_input: bool,
) -> std::io::Result<JoinHandle<Result<(), rusb::Error>>> {
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || {
            let worker_thread = UsbWorkerThread::new(worker, settings, log_input)?;
            worker_thread.run()
        })
}
