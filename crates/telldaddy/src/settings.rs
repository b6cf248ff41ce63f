//! Notification settings file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use telldaddy_core::TransportConfig;

/// Network timeout applied when the settings do not name one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Who to notify and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Sender address (`From`).
    pub from: String,
    /// Recipient address (`To`).
    pub to: String,
    /// Delivery transport.
    pub transport: TransportConfig,
    /// Seconds before a delivery attempt is abandoned.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Settings {
    /// Path used when `--config` is not given.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("telldaddy").join("mail.json"))
    }

    /// Loads settings from `path`, or from [`default_path`](Self::default_path).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().context("Could not determine config directory")?,
        };

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Parses and validates settings JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.transport.validate()?;
        anyhow::ensure!(!settings.from.trim().is_empty(), "`from` is empty");
        anyhow::ensure!(!settings.to.trim().is_empty(), "`to` is empty");
        Ok(settings)
    }

    /// The network timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
