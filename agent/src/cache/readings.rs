//! Latest property readings per device

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::models::device::PropertyReading;

/// Readings of one device
#[derive(Debug, Clone, Default)]
pub struct DeviceReadings {
    /// Readings of the last successful poll, in vendor order
    pub readings: Vec<PropertyReading>,

    /// When the last successful poll completed
    pub updated_at: Option<DateTime<Utc>>,

    /// Error of the last poll, cleared on success
    pub last_error: Option<String>,
}

/// In-memory snapshot of what each device last reported, per account.
///
/// A successful poll replaces a device's readings wholesale, so a code the
/// vendor stopped reporting reads as unknown rather than stale.
#[derive(Debug, Default)]
pub struct ReadingsCache {
    entries: RwLock<HashMap<(String, String), DeviceReadings>>,
}

impl ReadingsCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a device's readings with the result of a successful poll
    pub fn record_success(&self, account: &str, device_id: &str, readings: Vec<PropertyReading>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key(account, device_id),
            DeviceReadings {
                readings,
                updated_at: Some(Utc::now()),
                last_error: None,
            },
        );
    }

    /// Note a failed poll; the previous readings are kept
    pub fn record_failure(&self, account: &str, device_id: &str, error: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.entry(key(account, device_id)).or_default().last_error = Some(error.into());
    }

    /// Snapshot of a device's readings
    pub fn get(&self, account: &str, device_id: &str) -> Option<DeviceReadings> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&key(account, device_id)).cloned()
    }

    /// Current value of one property, `None` when unknown
    pub fn value(&self, account: &str, device_id: &str, code: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&key(account, device_id))?
            .readings
            .iter()
            .find(|r| r.code == code)
            .map(|r| r.value.clone())
    }

    /// Number of devices tracked
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(account: &str, device_id: &str) -> (String, String) {
    (account.to_string(), device_id.to_string())
}
