//! Main application run loop

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::{AccountSlot, AppState};
use crate::cache::readings::ReadingsCache;
use crate::errors::AgentError;
use crate::workers::{credential_sync, poller};

/// Run the monitor until the shutdown signal fires
pub async fn run(
    mut options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<Arc<AppState>, AgentError> {
    info!("Initializing Tuya Monitor...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let accounts = std::mem::take(&mut options.accounts);
    let app_state = Arc::new(AppState::init(&options.layout, accounts).await);
    for slot in &app_state.accounts {
        init_credential_sync_worker(slot.clone(), &mut shutdown_manager, shutdown_tx.subscribe());
        init_poller_workers(
            &options,
            slot,
            app_state.readings.clone(),
            &mut shutdown_manager,
            &shutdown_tx,
        );
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await?;
    Ok(app_state)
}

// =============================== INITIALIZATION ================================== //

fn init_credential_sync_worker(
    slot: Arc<AccountSlot>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("Initializing credential sync worker for account {}...", slot.name());

    let handle = tokio::spawn(async move {
        let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            let _ = shutdown_rx.recv().await;
        });

        // Nothing to persist until the account has a credential
        let account = tokio::select! {
            _ = &mut shutdown => return,
            account = slot.wait_ready() => account,
        };
        let account = match account {
            Some(account) => account,
            None => return,
        };

        credential_sync::run(
            slot.name(),
            account.store().subscribe(),
            &slot.credential_file,
            shutdown,
        )
        .await;
    });

    shutdown_manager.with_worker_handle(handle);
}

fn init_poller_workers(
    options: &AppOptions,
    slot: &Arc<AccountSlot>,
    readings: Arc<ReadingsCache>,
    shutdown_manager: &mut ShutdownManager,
    shutdown_tx: &broadcast::Sender<()>,
) {
    for device in &slot.devices {
        info!("Initializing poller worker for device {}...", device.device_id);

        let poller_options = poller::Options {
            interval: device.interval,
            initial_delay: options.initial_poll_delay,
        };
        let slot = slot.clone();
        let device_id = device.device_id.clone();
        let readings = readings.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            poller::run(
                &poller_options,
                slot.as_ref(),
                &device_id,
                readings.as_ref(),
                tokio::time::sleep,
                Box::pin(async move {
                    let _ = shutdown_rx.recv().await;
                }),
            )
            .await;
        });

        shutdown_manager.with_worker_handle(handle);
    }
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    worker_handles: Vec<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            worker_handles: Vec::new(),
        }
    }

    pub fn with_worker_handle(&mut self, handle: JoinHandle<()>) {
        self.worker_handles.push(handle);
    }

    pub async fn shutdown(&mut self) -> Result<(), AgentError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, aborting remaining workers...",
                    self.lifecycle_options.max_shutdown_delay
                );
                for handle in self.worker_handles.drain(..) {
                    handle.abort();
                }
                Err(AgentError::ShutdownError("shutdown timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), AgentError> {
        info!("Shutting down Tuya Monitor...");

        while let Some(handle) = self.worker_handles.pop() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
