//! Polling worker for one device

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::app::state::AccountSlot;
use crate::cache::readings::ReadingsCache;

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before first poll
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_delay: Duration::ZERO,
        }
    }
}

/// Run the poller worker.
///
/// Polls once after the initial delay, then once per interval until shutdown. A
/// failed cycle, including an account that is not initialized yet, is recorded
/// in the cache and retried on the next tick.
pub async fn run<S, F>(
    options: &Options,
    slot: &AccountSlot,
    device_id: &str,
    readings: &ReadingsCache,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!(
        "Poller worker starting for device {} of account {} (every {:?})",
        device_id,
        slot.name(),
        options.interval
    );

    if !options.initial_delay.is_zero() {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker for device {} shutting down...", device_id);
                return;
            }
            _ = sleep_fn(options.initial_delay) => {}
        }
    }

    loop {
        poll_once(slot, device_id, readings).await;

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker for device {} shutting down...", device_id);
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}

async fn poll_once(slot: &AccountSlot, device_id: &str, readings: &ReadingsCache) {
    debug!("Polling device {}...", device_id);

    let account = match slot.account().await {
        Ok(account) => account,
        Err(e) => {
            warn!(
                "Account {} is not initialized, skipping device {}: {}",
                slot.name(),
                device_id,
                e
            );
            readings.record_failure(slot.name(), device_id, e.to_string());
            return;
        }
    };

    match account.poll(device_id).await {
        Ok(properties) => {
            debug!("Device {} reported {} properties", device_id, properties.len());
            readings.record_success(slot.name(), device_id, properties);
        }
        Err(e) => {
            error!("Polling device {} failed: {}", device_id, e);
            readings.record_failure(slot.name(), device_id, e.to_string());
        }
    }
}
