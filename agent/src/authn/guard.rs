//! Expiry-aware gatekeeper in front of the credential store
//!
//! Every device poll asks the guard for a usable credential. The fast path is a
//! plain store read. When the credential is inside the expiry buffer the guard
//! rotates it: refresh first, full re-authentication if refreshing fails. Only
//! one rotation per account runs at a time. Callers that arrive while it runs
//! get its outcome, the rotated credential or the same failure, instead of
//! starting their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::authn::credential::Credential;
use crate::authn::store::CredentialStore;
use crate::authn::token_client::TokenClient;
use crate::errors::AuthError;

/// Refresh once the credential expires within this many seconds
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 300;

/// Where the guard is in its credential lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Credential usable, no rotation in progress
    Valid,

    /// Exchanging the refresh token
    Refreshing,

    /// Refresh failed, authenticating from scratch
    Reauthenticating,

    /// Both refresh and re-authentication failed in the last rotation
    Failed,
}

/// Errors of a rotation that exhausted both refresh and re-authentication
type Exhaustion = (Arc<AuthError>, Arc<AuthError>);

struct GuardInner {
    store: Arc<CredentialStore>,
    token_client: Arc<dyn TokenClient>,
    buffer: Duration,
    /// Bumped when a rotation finishes, successful or not
    generation: AtomicU64,
    /// Held for the whole rotation; records how the last one failed, if it did
    rotation: Mutex<Option<Exhaustion>>,
    state: RwLock<GuardState>,
}

/// Single-flight credential rotation for one account
#[derive(Clone)]
pub struct AuthGuard {
    inner: Arc<GuardInner>,
}

impl AuthGuard {
    /// Create a guard with the default five minute buffer
    pub fn new(store: Arc<CredentialStore>, token_client: Arc<dyn TokenClient>) -> Self {
        Self::with_buffer(
            store,
            token_client,
            Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECS),
        )
    }

    /// Create a guard that rotates credentials `buffer` ahead of expiry
    pub fn with_buffer(
        store: Arc<CredentialStore>,
        token_client: Arc<dyn TokenClient>,
        buffer: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                store,
                token_client,
                buffer,
                generation: AtomicU64::new(0),
                rotation: Mutex::new(None),
                state: RwLock::new(GuardState::Valid),
            }),
        }
    }

    /// The store this guard protects
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Outcome of the most recent rotation, or `Refreshing`/`Reauthenticating` while one runs
    pub fn state(&self) -> GuardState {
        *self.inner.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Return a credential usable at `now`, rotating it first if needed.
    ///
    /// The rotation runs on its own task: dropping this future does not abort a
    /// refresh that other callers are waiting on. Callers that find a rotation
    /// already running receive its outcome, success or failure, without starting
    /// another one.
    pub async fn ensure_valid(&self, now: DateTime<Utc>) -> Result<Credential, AuthError> {
        let observed = self.inner.generation.load(Ordering::SeqCst);
        let current = self.inner.store.read();
        if current.is_valid_at(now, self.inner.buffer) {
            return Ok(current);
        }

        debug!(
            "Credential expires in {}s (buffer {}s), rotation required",
            current.seconds_until_expiry(now),
            self.inner.buffer.num_seconds()
        );

        let inner = self.inner.clone();
        match tokio::spawn(async move { inner.rotate(now, observed).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(AuthError::Aborted(e.to_string())),
        }
    }

    /// Same as [`AuthGuard::ensure_valid`] at the current wall-clock time
    pub async fn ensure_valid_now(&self) -> Result<Credential, AuthError> {
        self.ensure_valid(Utc::now()).await
    }
}

impl GuardInner {
    fn set_state(&self, state: GuardState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    async fn rotate(&self, now: DateTime<Utc>, observed: u64) -> Result<Credential, AuthError> {
        let mut last_failure = self.rotation.lock().await;

        // A rotation finished while we were waiting for the lock: share its outcome
        if self.generation.load(Ordering::SeqCst) != observed {
            debug!("Joining the outcome of a concurrent rotation");
            return match &*last_failure {
                Some((refresh, reauth)) => Err(AuthError::Exhausted {
                    refresh: refresh.clone(),
                    reauth: reauth.clone(),
                }),
                None => Ok(self.store.read()),
            };
        }

        // Replaced outside the guard while we were waiting
        let current = self.store.read();
        if current.is_valid_at(now, self.buffer) {
            debug!("Credential already replaced, no rotation needed");
            return Ok(current);
        }

        let outcome = self.rotate_locked(now, current).await;
        *last_failure = match &outcome {
            Err(AuthError::Exhausted { refresh, reauth }) => {
                Some((refresh.clone(), reauth.clone()))
            }
            _ => None,
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn rotate_locked(
        &self,
        now: DateTime<Utc>,
        current: Credential,
    ) -> Result<Credential, AuthError> {
        self.set_state(GuardState::Refreshing);
        let refreshed = match current.refresh_token() {
            Some(refresh_token) => self.token_client.refresh_token(refresh_token).await,
            None => Err(AuthError::MissingRefreshToken),
        };

        let fresh = match refreshed {
            Ok(credential) => credential,
            Err(refresh_err) => {
                warn!(
                    "Token refresh failed ({}), re-authenticating: {}",
                    refresh_err.reason(),
                    refresh_err
                );
                self.set_state(GuardState::Reauthenticating);

                match self.token_client.obtain_new_token().await {
                    Ok(credential) => credential,
                    Err(reauth_err) => {
                        error!(
                            "Re-authentication failed ({}): {}",
                            reauth_err.reason(),
                            reauth_err
                        );
                        self.set_state(GuardState::Failed);
                        return Err(AuthError::Exhausted {
                            refresh: Arc::new(refresh_err),
                            reauth: Arc::new(reauth_err),
                        });
                    }
                }
            }
        };

        if !fresh.is_valid_at(now, self.buffer) {
            warn!(
                "Issued credential lives {}s, inside the {}s expiry buffer; every use will rotate it",
                fresh.ttl_seconds(),
                self.buffer.num_seconds()
            );
        }

        let result = if self
            .store
            .compare_and_swap(current.access_token(), fresh.clone())
        {
            info!("Credential rotated, expires at {}", fresh.expires_at());
            fresh
        } else {
            // Written outside the guard; the newer credential wins
            warn!("Credential changed during rotation, keeping the stored one");
            self.store.read()
        };

        self.set_state(GuardState::Valid);
        Ok(result)
    }
}
