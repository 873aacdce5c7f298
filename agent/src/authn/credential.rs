//! Access/refresh token pair for one account

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The live credential of an account.
///
/// `expires_at` is fixed when the credential is built from `issued_at + ttl_seconds`
/// and never recomputed afterwards. A stored `expires_at` is ignored on load.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredCredential")]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    issued_at: DateTime<Utc>,
    ttl_seconds: i64,
    expires_at: DateTime<Utc>,
}

/// On-disk shape of a credential, rebuilt through [`Credential::new`]
#[derive(Deserialize)]
struct StoredCredential {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    issued_at: DateTime<Utc>,
    ttl_seconds: i64,
}

impl From<StoredCredential> for Credential {
    fn from(stored: StoredCredential) -> Self {
        Credential::new(
            stored.access_token,
            stored.refresh_token,
            stored.issued_at,
            stored.ttl_seconds,
        )
    }
}

impl Credential {
    /// Create a credential issued at `issued_at`, valid for `ttl_seconds`
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        issued_at: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            issued_at,
            ttl_seconds,
            expires_at: issued_at + Duration::seconds(ttl_seconds),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the credential is still usable at `now` with `buffer` to spare
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now + buffer < self.expires_at
    }

    /// Seconds left until expiry, negative once expired
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("issued_at", &self.issued_at)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
