//! # Cooperative Dispatch Loop
//!
//! Single loop that polls the input, encodes, writes and sleeps. Meant for a
//! current-thread runtime: the keep-alive task interleaves with the loop but
//! never runs in parallel with it.

use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info};

use super::{Dispatcher, Outgoing, SessionDriver};
use crate::ble::BleTransport;
use crate::error::Result;
use crate::input::InputSource;

/// Poll `source` every `sample_interval` until `shutdown` resolves.
///
/// BLE failures are logged and the loop keeps running. An input failure ends
/// the loop and is returned after the vehicle has been stopped.
pub async fn run_cooperative<T, S, F>(
    driver: &mut SessionDriver<T>,
    source: &mut S,
    dispatcher: &mut Dispatcher,
    sample_interval: Duration,
    shutdown: F,
) -> Result<()>
where
    T: BleTransport + 'static,
    S: InputSource + ?Sized,
    F: Future<Output = ()>,
{
    let mut ticker = time::interval(sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        "Starting cooperative dispatch loop ({} ms sampling)",
        sample_interval.as_millis()
    );

    let outcome = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                if driver.maintain(now).await {
                    dispatcher.reset();
                }

                let intent = match source.sample() {
                    Ok(intent) => intent,
                    Err(e) => {
                        error!("Input failed: {}", e);
                        break Err(e);
                    }
                };

                let mut outgoing: Outgoing = dispatcher.plan(&intent, now);
                if outgoing.motion.is_none() {
                    outgoing.motion = dispatcher.flush(now);
                }
                driver.send(&outgoing).await;
            }

            _ = &mut shutdown => {
                info!("Shutdown requested, stopping vehicle...");
                break Ok(());
            }
        }
    };

    driver.stop(&dispatcher.neutral()).await;
    outcome
}
