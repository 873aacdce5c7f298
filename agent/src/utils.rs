//! Utility functions

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Version information for the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Current Unix time in milliseconds, as sent in the `t` header
pub fn timestamp_ms() -> String {
    Utc::now().timestamp_millis().to_string()
}
