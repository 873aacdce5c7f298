//! Settings file management

use std::collections::HashSet;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::app::account::AccountOptions;
use crate::authn::token_client::ApiKeys;
use crate::errors::AgentError;
use crate::http::devices::PropertyEndpoint;
use crate::logs::LogLevel;
use crate::models::device::DeviceQuery;
use crate::models::region::Region;

/// Monitor settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to the storage layout's logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Configured vendor accounts
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
}

/// One vendor account
#[derive(Debug, Deserialize)]
pub struct AccountSettings {
    /// Unique account name
    pub name: String,

    /// Cloud project access ID
    pub client_id: String,

    /// Cloud project access secret
    #[serde(deserialize_with = "deserialize_secret")]
    pub client_secret: SecretString,

    /// Data center, unknown values fall back to us
    #[serde(default)]
    pub region: Region,

    /// Base URL override for private deployments
    #[serde(default)]
    pub base_url: Option<String>,

    /// Property endpoint variant
    #[serde(default)]
    pub endpoint: PropertyEndpoint,

    /// Devices polled through this account
    #[serde(default)]
    pub devices: Vec<DeviceSettings>,
}

/// One polled device
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSettings {
    /// Vendor device ID
    pub device_id: String,

    /// Property codes to surface, empty for every reported code
    #[serde(default)]
    pub properties: Vec<String>,

    /// Polling interval in seconds
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
}

fn default_scan_interval() -> u64 {
    60
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Settings {
    /// Parse settings from JSON text and validate them
    pub fn from_json(contents: &str) -> Result<Self, AgentError> {
        let settings: Settings = serde_json::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations that cannot be polled
    pub fn validate(&self) -> Result<(), AgentError> {
        let mut names = HashSet::new();
        for account in &self.accounts {
            if account.name.trim().is_empty() {
                return Err(AgentError::ConfigError("account name is empty".to_string()));
            }
            if !names.insert(account.name.as_str()) {
                return Err(AgentError::ConfigError(format!(
                    "duplicate account name '{}'",
                    account.name
                )));
            }
            if account.client_id.is_empty() || account.client_secret.expose_secret().is_empty() {
                return Err(AgentError::ConfigError(format!(
                    "account '{}' is missing client_id or client_secret",
                    account.name
                )));
            }

            let mut device_ids = HashSet::new();
            for device in &account.devices {
                if device.device_id.trim().is_empty() {
                    return Err(AgentError::ConfigError(format!(
                        "account '{}' has a device with an empty device_id",
                        account.name
                    )));
                }
                if !device_ids.insert(device.device_id.as_str()) {
                    return Err(AgentError::ConfigError(format!(
                        "account '{}' lists device '{}' twice",
                        account.name, device.device_id
                    )));
                }
                if device.scan_interval_secs == 0 {
                    return Err(AgentError::ConfigError(format!(
                        "device '{}' has a zero scan interval",
                        device.device_id
                    )));
                }
            }
        }
        Ok(())
    }
}

impl AccountSettings {
    /// Account options used to initialize the account
    pub fn account_options(&self) -> AccountOptions {
        let keys = ApiKeys::new(
            self.client_id.clone(),
            self.client_secret.expose_secret().to_string(),
        );
        let mut options = AccountOptions::new(self.name.clone(), keys, self.region);
        options.base_url = self.base_url.clone();
        options.endpoint = self.endpoint;
        options.devices = self.devices.iter().map(DeviceSettings::query).collect();
        options
    }
}

impl DeviceSettings {
    pub fn query(&self) -> DeviceQuery {
        DeviceQuery::with_codes(self.device_id.clone(), self.properties.iter().cloned())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}
