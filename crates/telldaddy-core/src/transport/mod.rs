//! Delivery of a finished message.
//!
//! [`Transport`] is the single capability; [`SmtpTransport`] and
//! [`SendmailTransport`] implement it and [`Mailer`] picks one from a
//! [`TransportConfig`].

mod sendmail;
mod smtp;

pub use sendmail::{SendmailOutcome, SendmailTransport};
pub use smtp::{LiveConnector, LiveSession, SmtpConnector, SmtpSession, SmtpTransport};

use crate::config::TransportConfig;
use crate::credentials::CredentialStore;
use crate::error::Result;
use std::future::Future;
use telldaddy_mime::Message;

/// Something that can deliver a message.
pub trait Transport {
    /// Delivers `message` to its `To` recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails in a way the transport treats as
    /// fatal.
    fn send(&self, message: &Message) -> impl Future<Output = Result<()>> + Send;
}

/// The configured transport.
#[derive(Debug)]
pub enum Mailer {
    /// SMTP delivery.
    Smtp(SmtpTransport),
    /// Local sendmail delivery.
    Sendmail(SendmailTransport),
}

impl Mailer {
    /// Builds the transport `config` describes.
    ///
    /// `credentials` is used only by authenticated SMTP.
    #[must_use]
    pub fn from_config(config: &TransportConfig, credentials: CredentialStore) -> Self {
        match config {
            TransportConfig::Smtp(smtp) => Self::Smtp(SmtpTransport::new(smtp.clone(), credentials)),
            TransportConfig::Sendmail(sendmail) => {
                Self::Sendmail(SendmailTransport::new(sendmail.binary_path.clone()))
            }
        }
    }

    /// Short name of the selected transport, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::Sendmail(_) => "sendmail",
        }
    }
}

impl Transport for Mailer {
    async fn send(&self, message: &Message) -> Result<()> {
        match self {
            Self::Smtp(transport) => transport.send(message).await,
            Self::Sendmail(transport) => transport.send(message).await,
        }
    }
}
