//! Async channel bridge between Tokio runtime and USB thread

use async_channel::{Receiver, Sender, bounded};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Snapshot of one controller session owned by the USB thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSummary {
    /// Bus number the controller is attached to
    pub bus_number: u8,
    /// Device address on the bus
    pub device_address: u8,
    /// Controller id ("sc<serial>"), once the serial is known
    pub id: Option<String>,
    /// Lifecycle state, human readable
    pub state: String,
}

/// Commands from Tokio runtime to USB thread
#[derive(Debug)]
pub enum UsbCommand {
    /// List all controller sessions
    ListControllers {
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<Vec<ControllerSummary>>,
    },

    /// Close every session and stop the USB thread
    Shutdown,
}

/// Events reported by the controller registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    /// A controller delivered its first input and is now driven by a mapper
    ControllerAdded {
        /// Controller id
        id: String,
    },

    /// A ready controller was closed
    ControllerRemoved {
        /// Controller id
        id: String,
    },
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct UsbBridge {
    cmd_tx: Sender<UsbCommand>,
    event_rx: Receiver<DaemonEvent>,
}

impl UsbBridge {
    /// Send a command to the USB thread
    pub async fn send_command(&self, cmd: UsbCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive an event from the USB thread
    pub async fn recv_event(&self) -> crate::Result<DaemonEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for USB thread (blocking)
pub struct UsbWorker {
    pub(crate) cmd_rx: Receiver<UsbCommand>,
    /// Event sender (public so the registry can hold a clone)
    pub event_tx: Sender<DaemonEvent>,
}

impl UsbWorker {
    /// Receive a command from Tokio runtime (blocking)
    pub fn recv_command(&self) -> crate::Result<UsbCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<UsbCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Whether every [`UsbBridge`] has been dropped
    pub fn is_disconnected(&self) -> bool {
        self.cmd_rx.is_closed()
    }
}

/// Publish an event without ever blocking the caller
///
/// Events are emitted from interrupt handlers; when the async side lags
/// behind the event is dropped with a warning.
pub fn publish_event(sender: &Sender<DaemonEvent>, event: DaemonEvent) {
    if let Err(e) = sender.try_send(event) {
        warn!("Dropping daemon event: {}", e);
    }
}

/// Create the channel bridge between Tokio and USB thread
///
/// Returns (UsbBridge for Tokio, UsbWorker for USB thread)
pub fn create_usb_bridge() -> (UsbBridge, UsbWorker) {
    let (cmd_tx, cmd_rx) = bounded(64);
    let (event_tx, event_rx) = bounded(256);

    (
        UsbBridge { cmd_tx, event_rx },
        UsbWorker { cmd_rx, event_tx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_bridge() {
        let (bridge, worker) = create_usb_bridge();

        let handle = std::thread::spawn(move || {
            let cmd = worker.recv_command().unwrap();
            matches!(cmd, UsbCommand::ListControllers { .. })
        });

        let (tx, _rx) = tokio::sync::oneshot::channel();
        bridge
            .send_command(UsbCommand::ListControllers { response: tx })
            .await
            .unwrap();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_publish_event_does_not_block_when_full() {
        let (tx, rx) = bounded(1);
        publish_event(&tx, DaemonEvent::ControllerAdded { id: "sc1".into() });
        publish_event(&tx, DaemonEvent::ControllerAdded { id: "sc2".into() });

        assert_eq!(rx.len(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            DaemonEvent::ControllerAdded { id: "sc1".into() }
        );
    }
}
