//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// On-disk layout of the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the tokens directory
    pub fn tokens_dir(&self) -> PathBuf {
        self.base_dir.join("tokens")
    }

    /// Cached credential of one account
    pub fn credential_file(&self, account_name: &str) -> File {
        let file_name: String = account_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        File::new(self.tokens_dir().join(format!("{}.json", file_name)))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/tuya-monitor");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tuya-monitor");

        Self::new(base_dir)
    }
}
