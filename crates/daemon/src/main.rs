//! sc-cable daemon
//!
//! Drives Steam Controllers connected by USB cable: claims each controller,
//! reads its serial, and keeps a mapper fed with input at a fixed rate.

mod config;
mod mapper;
mod registry;
mod service;
mod usb;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::{DaemonEvent, UsbBridge, UsbCommand, create_usb_bridge, setup_logging};
use config::DaemonConfig;
use tokio::signal;
use tracing::{error, info};
use usb::spawn_usb_worker;

#[derive(Parser, Debug)]
#[command(name = "sc-cable-daemon")]
#[command(
    author,
    version,
    about = "Driver daemon for Steam Controllers connected by USB cable"
)]
#[command(long_about = "
Claims wired Steam Controllers, switches them out of keyboard/mouse
emulation and feeds their input to a mapper every sync period.

EXAMPLES:
    # Run with default config
    sc-cable-daemon

    # Run with custom config
    sc-cable-daemon --config ~/sc-cable.toml

    # List connected controllers and exit
    sc-cable-daemon --list-devices

    # Run under systemd
    sc-cable-daemon --service

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/sc-cable/daemon.toml
    3. /etc/sc-cable/daemon.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Run as systemd service (sd-notify readiness)
    #[arg(long)]
    service: bool,

    /// List connected controllers and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let path = DaemonConfig::default_path();
        DaemonConfig::default()
            .save(&path)
            .context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = match args.config {
        Some(ref path) => {
            DaemonConfig::load(Some(path.clone())).context("Failed to load configuration")?
        }
        None => DaemonConfig::load_or_default(),
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("sc-cable daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let (usb_bridge, worker) = create_usb_bridge();
    let settings = config.session_settings();
    let usb_worker_handle = spawn_usb_worker(worker, settings, config.mapper.log_input)
        .context("Failed to spawn USB worker thread")?;

    let result = if args.list_devices {
        list_devices_mode(usb_bridge.clone()).await
    } else {
        let service_mode = args.service || config.daemon.service_mode;
        run(usb_bridge.clone(), service_mode).await
    };

    info!("Shutting down USB subsystem...");
    if let Err(e) = shutdown_usb_worker(usb_bridge).await {
        error!("Error shutting down USB worker: {:#}", e);
    }

    match usb_worker_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("USB worker failed: {}", e),
        Err(e) => error!("USB worker thread panicked: {:?}", e),
    }

    result
}

/// List controllers and exit
async fn list_devices_mode(usb_bridge: UsbBridge) -> Result<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    usb_bridge
        .send_command(UsbCommand::ListControllers { response: tx })
        .await
        .context("Failed to send ListControllers command")?;

    let controllers = rx.await.context("Failed to receive controller list")?;

    if controllers.is_empty() {
        println!("No wired controllers found.");
        return Ok(());
    }

    println!("Found {} controller(s):\n", controllers.len());
    for controller in controllers {
        println!(
            "  {} - {}",
            controller.id.as_deref().unwrap_or("<no serial>"),
            controller.state
        );
        println!(
            "      Bus {:03} Device {:03}",
            controller.bus_number, controller.device_address
        );
    }

    Ok(())
}

/// Run until Ctrl+C, logging controller arrivals and departures
async fn run(usb_bridge: UsbBridge, service_mode: bool) -> Result<()> {
    if service_mode {
        info!("Running in service mode");
        if service::is_systemd() {
            info!("Running under systemd");
        }
        service::notify_ready().context("Failed to notify systemd ready")?;
        service::notify_status("Waiting for controllers")
            .context("Failed to send status to systemd")?;
    }

    info!("Press Ctrl+C to shutdown");

    let result = tokio::select! {
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                Err(e) => error!("Error waiting for Ctrl+C: {}", e),
            }
            Ok(())
        }
        () = log_events(usb_bridge, service_mode) => {
            Err(anyhow!("USB worker stopped unexpectedly"))
        }
    };

    if service_mode {
        service::notify_stopping().context("Failed to notify systemd stopping")?;
    }

    result
}

/// Log daemon events until the USB worker goes away
async fn log_events(usb_bridge: UsbBridge, service_mode: bool) {
    let mut connected = 0usize;

    while let Ok(event) = usb_bridge.recv_event().await {
        match event {
            DaemonEvent::ControllerAdded { id } => {
                connected += 1;
                info!("Controller {} connected", id);
            }
            DaemonEvent::ControllerRemoved { id } => {
                connected = connected.saturating_sub(1);
                info!("Controller {} disconnected", id);
            }
        }

        if service_mode
            && let Err(e) = service::notify_status(&format!("{} controller(s)", connected))
        {
            error!("Failed to send status to systemd: {:#}", e);
        }
    }
}

async fn shutdown_usb_worker(usb_bridge: UsbBridge) -> Result<()> {
    usb_bridge
        .send_command(UsbCommand::Shutdown)
        .await
        .context("Failed to send Shutdown command")?;
    Ok(())
}
