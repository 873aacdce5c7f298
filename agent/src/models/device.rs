//! Device queries and property readings

use serde::{Deserialize, Serialize};

/// What to fetch for one device during one poll cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceQuery {
    /// Vendor device ID
    pub device_id: String,

    /// Property codes to keep, in no particular order. Empty means every code the vendor reports.
    #[serde(default)]
    pub requested_property_codes: Vec<String>,
}

impl DeviceQuery {
    /// Query every property of the device
    pub fn all(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            requested_property_codes: Vec::new(),
        }
    }

    /// Query only the listed property codes
    pub fn with_codes<I, S>(device_id: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut requested: Vec<String> = Vec::new();
        for code in codes {
            let code = code.into().trim().to_string();
            if !code.is_empty() && !requested.contains(&code) {
                requested.push(code);
            }
        }
        Self {
            device_id: device_id.into(),
            requested_property_codes: requested,
        }
    }

    /// Auto-discovery mode: no explicit codes requested
    pub fn is_discovery(&self) -> bool {
        self.requested_property_codes.is_empty()
    }

    /// Whether a reading with `code` should be surfaced
    pub fn wants(&self, code: &str) -> bool {
        self.is_discovery() || self.requested_property_codes.iter().any(|c| c == code)
    }
}

/// One property value reported by the vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyReading {
    pub code: String,

    /// Opaque vendor value (string, number or bool)
    pub value: serde_json::Value,
}

impl PropertyReading {
    pub fn new(code: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

/// A property item as the vendor sends it; extra fields (dp_id, time, type) are ignored
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawProperty {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub value: serde_json::Value,
}

/// Status endpoints return a bare list, shadow endpoints wrap it in `properties`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum PropertyList {
    Items(Vec<RawProperty>),
    Wrapped { properties: Vec<RawProperty> },
}

impl PropertyList {
    /// Normalize into readings, keeping vendor order and only what `query` asks for
    pub fn into_readings(self, query: &DeviceQuery) -> Vec<PropertyReading> {
        let items = match self {
            PropertyList::Items(items) => items,
            PropertyList::Wrapped { properties } => properties,
        };

        items
            .into_iter()
            .filter_map(|item| {
                let code = item.code?;
                query.wants(&code).then(|| PropertyReading {
                    code,
                    value: item.value,
                })
            })
            .collect()
    }
}
