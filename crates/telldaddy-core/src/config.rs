//! Transport configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default SMTP port when none is configured.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default location of the sendmail binary.
pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

/// Which transport delivers notifications, and how.
///
/// Serialized with a `type` tag:
///
/// ```
/// use telldaddy_core::TransportConfig;
///
/// let config: TransportConfig =
///     serde_json::from_str(r#"{"type": "smtp", "server": "mail.example.com", "user": "me"}"#)
///         .unwrap();
/// assert!(matches!(config, TransportConfig::Smtp(ref smtp) if smtp.port == 25));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Deliver through an SMTP server.
    Smtp(SmtpConfig),
    /// Hand the message to a local sendmail binary.
    Sendmail(SendmailConfig),
}

impl TransportConfig {
    /// Parses and validates a JSON transport configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a transport or a
    /// required field is empty.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Smtp(smtp) => {
                if smtp.server.trim().is_empty() {
                    return Err(ConfigError::Missing("server"));
                }
                if smtp.use_auth && smtp.user.trim().is_empty() {
                    return Err(ConfigError::Missing("user"));
                }
            }
            Self::Sendmail(sendmail) => {
                if sendmail.binary_path.as_os_str().is_empty() {
                    return Err(ConfigError::Missing("binary_path"));
                }
            }
        }
        Ok(())
    }
}

/// SMTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Server hostname.
    pub server: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Account name, also the keyring lookup key.
    #[serde(default)]
    pub user: String,
    /// Upgrade with STARTTLS before authenticating.
    #[serde(default)]
    pub use_tls: bool,
    /// Authenticate with the password stored for `(server, user)`.
    #[serde(default)]
    pub use_auth: bool,
}

impl SmtpConfig {
    /// Creates a plain, unauthenticated configuration on port 25.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_SMTP_PORT,
            user: String::new(),
            use_tls: false,
            use_auth: false,
        }
    }
}

const fn default_port() -> u16 {
    DEFAULT_SMTP_PORT
}

/// Sendmail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendmailConfig {
    /// Path of the sendmail-compatible binary.
    #[serde(default = "default_sendmail_path")]
    pub binary_path: PathBuf,
}

impl Default for SendmailConfig {
    fn default() -> Self {
        Self {
            binary_path: default_sendmail_path(),
        }
    }
}

fn default_sendmail_path() -> PathBuf {
    PathBuf::from(DEFAULT_SENDMAIL_PATH)
}
