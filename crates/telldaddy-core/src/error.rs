//! Error types for notification delivery.

use thiserror::Error;

/// Failure to deliver a message.
///
/// Every variant is fatal to the send attempt; nothing is retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The TCP connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(#[source] telldaddy_smtp::Error),

    /// Greeting, EHLO or STARTTLS failed.
    #[error("SMTP handshake failed: {0}")]
    Handshake(#[source] telldaddy_smtp::Error),

    /// The server rejected the credentials or offered no usable mechanism.
    #[error("Authentication failed: {0}")]
    Authentication(#[source] telldaddy_smtp::Error),

    /// The envelope or message data was refused.
    #[error("Transmission failed: {0}")]
    Transmission(#[source] telldaddy_smtp::Error),

    /// The sendmail process could not be started or fed.
    #[error("Failed to run sendmail: {0}")]
    Spawn(#[source] std::io::Error),

    /// The password could not be resolved.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Failure to read or write a secret.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No secret is stored for this server and account.
    #[error("No password available in keyring for {server}, {account}")]
    NotFound {
        /// SMTP server the secret belongs to.
        server: String,
        /// Account name on that server.
        account: String,
    },

    /// No secret backend is configured.
    #[error("Secret storage unavailable")]
    Unavailable,

    /// The system keyring reported an error.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Reading the password from the terminal failed.
    #[error("Password prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    /// The background lookup panicked or was cancelled.
    #[error("Password lookup did not complete")]
    LookupAborted,
}

/// Invalid transport configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration is not valid JSON for a transport.
    #[error("Invalid transport configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required field is empty.
    #[error("Transport configuration is missing `{0}`")]
    Missing(&'static str),
}

/// Result type alias for delivery.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;
