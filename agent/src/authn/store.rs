//! Per-account credential slot

use tokio::sync::watch;

use crate::authn::credential::Credential;

/// Holds the single live credential of one account.
///
/// Reads never wait on an in-flight refresh; writes go through
/// [`CredentialStore::compare_and_swap`] so a stale writer cannot clobber a
/// credential that was already rotated by someone else.
#[derive(Debug)]
pub struct CredentialStore {
    slot: watch::Sender<Credential>,
}

impl CredentialStore {
    /// Create a store holding `credential`
    pub fn new(credential: Credential) -> Self {
        let (slot, _) = watch::channel(credential);
        Self { slot }
    }

    /// Snapshot of the current credential
    pub fn read(&self) -> Credential {
        self.slot.borrow().clone()
    }

    /// Install `new_credential` if the current access token is still `expected_access_token`.
    ///
    /// Returns `false` (and leaves the store untouched) when another writer got there first.
    pub fn compare_and_swap(
        &self,
        expected_access_token: &str,
        new_credential: Credential,
    ) -> bool {
        self.slot.send_if_modified(|current| {
            if current.access_token() != expected_access_token {
                return false;
            }
            *current = new_credential;
            true
        })
    }

    /// Receiver notified after every successful swap
    pub fn subscribe(&self) -> watch::Receiver<Credential> {
        self.slot.subscribe()
    }
}
