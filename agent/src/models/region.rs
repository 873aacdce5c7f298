//! Vendor data-center regions

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Data center hosting the account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Region {
    #[default]
    Us,
    Eu,
    Cn,
    In,
}

impl Region {
    /// Base URL of the region's open API
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Us => "https://openapi.tuyaus.com",
            Region::Eu => "https://openapi.tuyaeu.com",
            Region::Cn => "https://openapi.tuyacn.com",
            Region::In => "https://openapi.tuyain.com",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
            Region::Cn => "cn",
            Region::In => "in",
        }
    }
}

impl From<&str> for Region {
    /// Unknown region codes fall back to `us`
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "us" => Region::Us,
            "eu" => Region::Eu,
            "cn" => Region::Cn,
            "in" => Region::In,
            other => {
                warn!("Unknown region '{}', falling back to us", other);
                Region::Us
            }
        }
    }
}

impl From<String> for Region {
    fn from(s: String) -> Self {
        Region::from(s.as_str())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
