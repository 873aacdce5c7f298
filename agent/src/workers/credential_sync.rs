//! Credential persistence worker

use std::future::Future;
use std::pin::Pin;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::authn::credential::Credential;
use crate::filesys::file::File;
use crate::storage::credentials::save_credential;

/// Run the credential sync worker.
///
/// Writes the current credential, then rewrites the cache file every time the
/// store publishes a new one. Write failures are logged and never stop the worker.
pub async fn run(
    account_name: &str,
    mut credentials: watch::Receiver<Credential>,
    file: &File,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Credential sync worker starting for account {}", account_name);

    let current = credentials.borrow_and_update().clone();
    persist(account_name, file, &current).await;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Credential sync worker for account {} shutting down...", account_name);
                return;
            }
            changed = credentials.changed() => {
                if changed.is_err() {
                    debug!("Credential store of account {} dropped", account_name);
                    return;
                }
                let credential = credentials.borrow_and_update().clone();
                persist(account_name, file, &credential).await;
            }
        }
    }
}

async fn persist(account_name: &str, file: &File, credential: &Credential) {
    match save_credential(file, credential).await {
        Ok(()) => debug!(
            "Saved credential of account {} (expires at {})",
            account_name,
            credential.expires_at()
        ),
        Err(e) => error!(
            "Failed to save credential of account {} to {}: {}",
            account_name,
            file.path().display(),
            e
        ),
    }
}
