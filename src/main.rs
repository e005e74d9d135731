//! # RamoCar Remote
//!
//! Drive a RamoCar over Bluetooth Low Energy from a keyboard or gamepad.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (`RAMOCAR_CONFIG`, default `config/default.toml`)
//!    - Set up logging with tracing subscriber
//!    - Open the input device
//!
//! 2. **Dispatch**
//!    - Cooperative: one current-thread runtime samples, encodes and writes
//!    - Background: BLE worker thread, input sampled on the main thread
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C sends the neutral command and silences the buzzer
//!    - Disconnect and exit
//!
//! # Examples
//!
//! ```bash
//! RAMOCAR_CONFIG=config/gamepad.toml cargo run --release
//! ```
//!
//! Expected output:
//! ```text
//! INFO ramocar_remote: RamoCar Remote v0.1.0 starting...
//! INFO ramocar_remote::ble::session: Scanning for 'RamoCar' (5000 ms)
//! INFO ramocar_remote::ble::session: Connected to RamoCar at AA:BB:CC:DD:EE:FF
//! INFO ramocar_remote::dispatch: Sent command: x1y0r0
//! ```

use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use ramocar_remote::ble::{transport_or_offline, BleSession, BtleplugCentral};
use ramocar_remote::config::{Config, LoggingConfig, RuntimeModel};
use ramocar_remote::dispatch::cooperative::run_cooperative;
use ramocar_remote::dispatch::worker::{spawn_worker, WorkerSettings};
use ramocar_remote::dispatch::{Dispatcher, SessionDriver};
use ramocar_remote::input::{self, ControlIntent};

/// Environment variable naming the configuration file
const CONFIG_ENV: &str = "RAMOCAR_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of the daily rolling log files
const LOG_FILE_PREFIX: &str = "ramocar-remote.log";

fn main() -> Result<()> {
    let config_path = config_path(std::env::var(CONFIG_ENV).ok());
    let config = Config::load_or_default(&config_path)?;

    // Held until exit so buffered file logs are flushed
    let _guard = init_logging(&config.logging);

    info!("RamoCar Remote v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path.display());

    match config.runtime() {
        RuntimeModel::Cooperative => run_cooperative_mode(&config),
        RuntimeModel::Background => run_background_mode(&config),
    }
}

fn config_path(from_env: Option<String>) -> PathBuf {
    match from_env {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// RUST_LOG overrides the configured level
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = if config.file_dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.file_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        )
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
    {
        eprintln!("Logging already initialized: {}", e);
    }

    guard
}

/// Sample, encode and write on a single current-thread runtime
fn run_cooperative_mode(config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut source = input::open_source(&config.input)?;
        info!("Reading input from {}", source.describe());

        let central = transport_or_offline(BtleplugCentral::new()).await;
        let session = BleSession::new(central, config.ble.device_name.clone(), config.ble.scan_timeout());
        let mut driver = SessionDriver::new(session, &config.ble);
        let mut dispatcher = Dispatcher::new(
            config.command_format(),
            config.policy(),
            config.dispatch.throttle_interval(),
        );

        driver.start().await;
        info!("Press Ctrl+C to exit");

        run_cooperative(
            &mut driver,
            source.as_mut(),
            &mut dispatcher,
            config.dispatch.sample_interval(),
            ctrl_c(),
        )
        .await?;

        info!("Stopped");
        Ok(())
    })
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// BLE on a worker thread, input polled here and handed over on change
fn run_background_mode(config: &Config) -> Result<()> {
    let mut source = input::open_source(&config.input)?;
    info!("Reading input from {}", source.describe());

    let settings = WorkerSettings {
        format: config.command_format(),
        policy: config.policy(),
        throttle_interval: config.dispatch.throttle_interval(),
        ble: config.ble.clone(),
        handle_signals: true,
    };
    let (handle, worker) = spawn_worker(settings, BtleplugCentral::new)?;
    info!("Press Ctrl+C to exit");

    let sample_interval = config.dispatch.sample_interval();
    let mut last: Option<ControlIntent> = None;

    let outcome = loop {
        if handle.is_closed() {
            break Ok(());
        }

        let intent = match source.sample() {
            Ok(intent) => intent,
            Err(e) => {
                error!("Input failed: {}", e);
                break Err(e);
            }
        };

        if last != Some(intent) {
            if handle.submit(intent).is_err() {
                break Ok(());
            }
            last = Some(intent);
        }

        std::thread::sleep(sample_interval);
    };

    // Closing the hand-off makes the worker stop the vehicle and exit
    drop(handle);
    if worker.join().is_err() {
        error!("BLE worker panicked");
    }

    outcome?;
    info!("Stopped");
    Ok(())
}
