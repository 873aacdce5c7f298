//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::app::account::Account;
use crate::cache::readings::ReadingsCache;
use crate::errors::AuthError;
use crate::filesys::file::File;
use crate::storage::credentials::load_credential;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::AccountSettings;

/// A device scheduled for polling
#[derive(Debug, Clone)]
pub struct PolledDevice {
    pub device_id: String,
    pub interval: Duration,
}

/// A configured account, initialized on first successful use.
///
/// Initialization that fails is attempted again by the next caller, so an
/// account whose vendor was unreachable at startup recovers once it is back.
pub struct AccountSlot {
    settings: AccountSettings,
    pub credential_file: File,
    pub devices: Vec<PolledDevice>,
    init_lock: Mutex<()>,
    ready: watch::Sender<Option<Arc<Account>>>,
}

impl AccountSlot {
    pub fn new(settings: AccountSettings, credential_file: File) -> Self {
        let devices = settings
            .devices
            .iter()
            .map(|device| PolledDevice {
                device_id: device.device_id.clone(),
                interval: device.scan_interval(),
            })
            .collect();
        let (ready, _) = watch::channel(None);

        Self {
            settings,
            credential_file,
            devices,
            init_lock: Mutex::new(()),
            ready,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// The initialized account, if initialization already succeeded
    pub fn initialized(&self) -> Option<Arc<Account>> {
        self.ready.borrow().clone()
    }

    /// The initialized account, initializing it first if needed.
    ///
    /// Concurrent callers run one initialization at a time; the cached
    /// credential is reloaded on every attempt.
    pub async fn account(&self) -> Result<Arc<Account>, AuthError> {
        if let Some(account) = self.initialized() {
            return Ok(account);
        }

        let _init = self.init_lock.lock().await;
        if let Some(account) = self.initialized() {
            return Ok(account);
        }

        let existing = load_credential(&self.credential_file).await;
        let account = Account::initialize(self.settings.account_options(), existing).await?;
        let account = Arc::new(account);
        info!("Account {} initialized", self.name());

        self.ready.send_replace(Some(account.clone()));
        Ok(account)
    }

    /// Wait until some caller has initialized the account
    pub async fn wait_ready(&self) -> Option<Arc<Account>> {
        let mut ready = self.ready.subscribe();
        let account = match ready.wait_for(Option::is_some).await {
            Ok(account) => account.clone(),
            Err(_) => None,
        };
        account
    }
}

/// Main application state
pub struct AppState {
    /// Every configured account, initialized or not
    pub accounts: Vec<Arc<AccountSlot>>,

    /// Latest readings of every polled device
    pub readings: Arc<ReadingsCache>,
}

impl AppState {
    /// Set up every configured account and try to initialize it.
    ///
    /// An account that fails here is kept; its pollers retry the
    /// initialization on every tick and record the error meanwhile.
    pub async fn init(layout: &StorageLayout, accounts: Vec<AccountSettings>) -> Self {
        info!("Initializing application state...");

        let mut slots = Vec::with_capacity(accounts.len());
        for settings in accounts {
            let credential_file = layout.credential_file(&settings.name);
            let slot = AccountSlot::new(settings, credential_file);

            if let Err(e) = slot.account().await {
                warn!(
                    "Account {} failed to initialize ({}), retrying on every poll: {}",
                    slot.name(),
                    e.reason(),
                    e
                );
            }
            slots.push(Arc::new(slot));
        }

        if !slots.is_empty() && slots.iter().all(|slot| slot.initialized().is_none()) {
            warn!("No account could be initialized yet");
        }

        Self {
            accounts: slots,
            readings: Arc::new(ReadingsCache::new()),
        }
    }
}
