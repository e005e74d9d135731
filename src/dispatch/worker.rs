//! # Background Dispatch Worker
//!
//! The BLE session lives on a dedicated thread running its own current-thread
//! runtime. The input side hands intents over through a [`DispatchHandle`]
//! without waiting for any write; the worker acts on the latest intent it has
//! received each time it wakes up.

use std::future::Future;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::{Dispatcher, Outgoing, SessionDriver};
use crate::ble::{transport_or_offline, BleSession, BleTransport};
use crate::command::CommandFormat;
use crate::config::{BleConfig, PolicyKind};
use crate::error::{RamoCarError, Result};
use crate::input::ControlIntent;

/// Everything the worker needs to run a session
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub format: CommandFormat,
    pub policy: PolicyKind,
    pub throttle_interval: Duration,
    pub ble: BleConfig,
    /// Stop the vehicle and exit on Ctrl+C
    pub handle_signals: bool,
}

/// Sending half of the intent hand-off
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<ControlIntent>,
}

impl DispatchHandle {
    /// Queue `intent` for the worker. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns `WorkerStopped` once the worker has exited
    pub fn submit(&self, intent: ControlIntent) -> Result<()> {
        self.tx.send(intent).map_err(|_| RamoCarError::WorkerStopped)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start the worker thread.
///
/// `make_transport` runs on the worker's runtime, so transports bound to a
/// runtime (such as the btleplug central) are created where they are used.
/// If it fails the worker keeps draining intents with every write skipped.
/// The worker exits when every [`DispatchHandle`] is dropped, or on Ctrl+C if
/// `handle_signals` is set; either way the vehicle is stopped first.
pub fn spawn_worker<T, F, Fut>(
    settings: WorkerSettings,
    make_transport: F,
) -> std::io::Result<(DispatchHandle, thread::JoinHandle<()>)>
where
    T: BleTransport + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>>,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let join = thread::Builder::new()
        .name("ble-dispatch".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to build dispatch runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(run_worker(settings, make_transport, rx));
        })?;

    Ok((DispatchHandle { tx }, join))
}

async fn run_worker<T, F, Fut>(
    settings: WorkerSettings,
    make_transport: F,
    mut rx: mpsc::UnboundedReceiver<ControlIntent>,
) where
    T: BleTransport + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let transport = transport_or_offline(make_transport()).await;

    let session = BleSession::new(transport, settings.ble.device_name.clone(), settings.ble.scan_timeout());
    let mut driver = SessionDriver::new(session, &settings.ble);
    let mut dispatcher = Dispatcher::new(settings.format, settings.policy, settings.throttle_interval);
    driver.start().await;

    let reconnect_enabled = settings.ble.reconnect_attempts > 0;
    let mut reconnect_tick = time::interval(settings.ble.reconnect_interval());
    reconnect_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal(settings.handle_signals);
    tokio::pin!(shutdown);

    let mut latest: Option<ControlIntent> = None;

    loop {
        let deadline = dispatcher.next_deadline();

        tokio::select! {
            received = rx.recv() => {
                let Some(first) = received else {
                    debug!("All dispatch handles dropped");
                    break;
                };
                let intent = drain_latest(first, &mut rx);
                latest = Some(intent);
                let outgoing = dispatcher.plan(&intent, Instant::now());
                driver.send(&outgoing).await;
            }

            _ = wait_until(deadline) => {
                let outgoing = Outgoing {
                    motion: dispatcher.flush(Instant::now()),
                    buzzer: None,
                };
                driver.send(&outgoing).await;
            }

            _ = reconnect_tick.tick(), if reconnect_enabled => {
                if driver.maintain(Instant::now()).await {
                    dispatcher.reset();
                    if let Some(intent) = latest {
                        let outgoing = dispatcher.plan(&intent, Instant::now());
                        driver.send(&outgoing).await;
                    }
                }
            }

            _ = &mut shutdown => {
                info!("Interrupt received, stopping vehicle...");
                break;
            }
        }
    }

    driver.stop(&dispatcher.neutral()).await;
    info!("BLE worker stopped");
}

/// Skip everything queued behind `first` except the newest intent
fn drain_latest(first: ControlIntent, rx: &mut mpsc::UnboundedReceiver<ControlIntent>) -> ControlIntent {
    let mut latest = first;
    while let Ok(next) = rx.try_recv() {
        latest = next;
    }
    latest
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn shutdown_signal(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
