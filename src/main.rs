//! snapwatch - Main entry point
//!
//! Watches an X11 monitor and saves a snapshot whenever it changes.

mod args;

use args::Args;
use clap::Parser;
use log::{error, info, warn};
use snapwatch::control::{format_targets, ControlSurface};
use snapwatch::{
    CaptureScheduler, Config, ControlCommand, FrameComparator, FrameSource, SnapshotEncoder,
    SnapshotStore, StatusBoard, X11Source,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let (mut config, config_result) = match args.load_config() {
        Ok(cfg) => (cfg, Ok(())),
        Err(e) => (Config::default(), Err(e)),
    };
    args.apply_overrides(&mut config);

    env_logger::Builder::new()
        .parse_filters(
            &std::env::var("SNAPWATCH_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        )
        .filter_module("x11rb", log::LevelFilter::Warn)
        .init();

    info!("snapwatch v{}", env!("CARGO_PKG_VERSION"));
    match config_result {
        Ok(()) => info!("Loaded configuration from {:?}", args.config),
        Err(e) => warn!("Failed to load config: {}, using defaults", e),
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    let source = match X11Source::connect(config.x11.display.as_deref(), config.x11.use_shm) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open X display: {}", e);
            return Err(e.into());
        }
    };

    let targets = source.list_targets();
    if args.list_targets {
        for line in format_targets(&targets) {
            println!("{}", line);
        }
        return Ok(());
    }
    if targets.is_empty() {
        warn!("No monitors found; capture cannot start");
    }

    let store = match SnapshotStore::open(&config.storage.directory) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to prepare snapshot directory: {}", e);
            return Err(e.into());
        }
    };

    let status = Arc::new(StatusBoard::new());
    let mut scheduler = CaptureScheduler::new(
        Box::new(source),
        FrameComparator::new(),
        SnapshotEncoder::new(),
        store,
        status.clone(),
        Duration::from_millis(config.capture.interval_ms),
    );

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    if config.capture.autostart {
        command_tx.send(ControlCommand::Start(config.capture.target))?;
    }

    let surface = ControlSurface::new(
        config.capture.target,
        targets,
        status.clone(),
        command_tx.clone(),
    );
    if let Err(e) = surface.spawn_stdin() {
        warn!("Interactive control unavailable: {}", e);
    }

    let shutdown_tx = command_tx.clone();
    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(ControlCommand::Shutdown);
    });
    drop(command_tx);

    scheduler.run(command_rx).await;

    let stats = scheduler.stats();
    info!(
        "snapwatch stopped: {} ticks, {} saved, {} unchanged, {} errors",
        stats.ticks, stats.saved, stats.unchanged, stats.errors
    );

    Ok(())
}
