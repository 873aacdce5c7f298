//! Shared test doubles

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tuya_monitor::authn::credential::Credential;
use tuya_monitor::authn::token_client::TokenClient;
use tuya_monitor::errors::{AuthError, EnvelopeError};

/// What a fake token endpoint answers
#[derive(Debug, Clone)]
pub enum Outcome {
    Issue {
        access_token: String,
        refresh_token: Option<String>,
        ttl_seconds: i64,
    },
    Reject,
}

impl Outcome {
    pub fn issue(access_token: &str, refresh_token: &str, ttl_seconds: i64) -> Self {
        Outcome::Issue {
            access_token: access_token.to_string(),
            refresh_token: Some(refresh_token.to_string()),
            ttl_seconds,
        }
    }

    fn resolve(&self, issued_at: DateTime<Utc>) -> Result<Credential, AuthError> {
        match self {
            Outcome::Issue {
                access_token,
                refresh_token,
                ttl_seconds,
            } => Ok(Credential::new(
                access_token.clone(),
                refresh_token.clone(),
                issued_at,
                *ttl_seconds,
            )),
            Outcome::Reject => Err(AuthError::Envelope(EnvelopeError::Rejected {
                code: Some(1010),
                msg: "token invalid".to_string(),
            })),
        }
    }
}

/// Counting [`TokenClient`] with scripted answers and an optional latency
pub struct FakeTokenClient {
    refresh: Mutex<Outcome>,
    obtain: Mutex<Outcome>,
    delay: Duration,
    issued_at: DateTime<Utc>,
    refresh_calls: AtomicUsize,
    obtain_calls: AtomicUsize,
    seen_refresh_tokens: Mutex<Vec<String>>,
}

impl FakeTokenClient {
    pub fn new(refresh: Outcome, obtain: Outcome) -> Self {
        Self {
            refresh: Mutex::new(refresh),
            obtain: Mutex::new(obtain),
            delay: Duration::ZERO,
            issued_at: Utc::now(),
            refresh_calls: AtomicUsize::new(0),
            obtain_calls: AtomicUsize::new(0),
            seen_refresh_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Stamp issued credentials with this time instead of the creation time
    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = issued_at;
        self
    }

    pub fn set_refresh(&self, outcome: Outcome) {
        *self.refresh.lock().unwrap() = outcome;
    }

    pub fn set_obtain(&self, outcome: Outcome) {
        *self.obtain.lock().unwrap() = outcome;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn obtain_calls(&self) -> usize {
        self.obtain_calls.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenClient for FakeTokenClient {
    async fn obtain_new_token(&self) -> Result<Credential, AuthError> {
        self.obtain_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.obtain.lock().unwrap().clone();
        outcome.resolve(self.issued_at)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.refresh.lock().unwrap().clone();
        outcome.resolve(self.issued_at)
    }
}

/// Credential issued at `now - age_seconds` living `ttl_seconds`
pub fn credential_aged(
    access_token: &str,
    refresh_token: Option<&str>,
    now: DateTime<Utc>,
    age_seconds: i64,
    ttl_seconds: i64,
) -> Credential {
    Credential::new(
        access_token,
        refresh_token.map(str::to_string),
        now - chrono::Duration::seconds(age_seconds),
        ttl_seconds,
    )
}
