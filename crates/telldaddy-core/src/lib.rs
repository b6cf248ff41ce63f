//! # telldaddy-core
//!
//! Delivers change notifications by email.
//!
//! This crate provides:
//! - [`Transport`] with SMTP and sendmail implementations
//! - [`Mailer`], the transport selected by a [`TransportConfig`]
//! - [`CredentialStore`], password lookup keyed by server and account
//!
//! ```no_run
//! use telldaddy_core::{CredentialStore, Mailer, Transport, TransportConfig};
//! use telldaddy_mime::build_plain;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig::from_json(r#"{"type": "sendmail"}"#)?;
//! let mailer = Mailer::from_config(&config, CredentialStore::keyring());
//! let message = build_plain("monitor@x.com", "me@y.com", "Changes detected", "hello");
//! mailer.send(&message).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod credentials;
mod error;
pub mod transport;

pub use config::{SendmailConfig, SmtpConfig, TransportConfig};
pub use credentials::{CredentialStore, KeyringStore, MemoryStore, SecretStore};
pub use error::{ConfigError, CredentialError, CredentialResult, DeliveryError, Result};
pub use transport::{
    LiveConnector, LiveSession, Mailer, SendmailOutcome, SendmailTransport, SmtpConnector,
    SmtpSession, SmtpTransport, Transport,
};
