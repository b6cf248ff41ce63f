//! SMTP delivery.

use crate::config::SmtpConfig;
use crate::credentials::CredentialStore;
use crate::error::{DeliveryError, Result};
use crate::transport::Transport;
use std::future::Future;
use telldaddy_mime::Message;
use telldaddy_smtp::connection::{SmtpStream, connect};
use telldaddy_smtp::{Address, Authenticated, CLIENT_NAME, Client, Connected, Error as SmtpError};
use tracing::{debug, info, warn};

/// Opens SMTP sessions.
pub trait SmtpConnector: Send + Sync {
    /// Session type produced by this connector.
    type Session: SmtpSession;

    /// Opens a TCP connection to `server:port`.
    fn connect(
        &self,
        server: &str,
        port: u16,
    ) -> impl Future<Output = telldaddy_smtp::Result<Self::Session>> + Send;
}

/// The steps of one SMTP conversation.
///
/// A step that fails leaves the session closed; [`quit`](Self::quit) on a
/// closed session does nothing.
pub trait SmtpSession: Send {
    /// Reads the greeting and sends EHLO.
    fn greet(&mut self) -> impl Future<Output = telldaddy_smtp::Result<()>> + Send;

    /// Upgrades to TLS, verifying `server_name`, and greets again.
    fn starttls(
        &mut self,
        server_name: &str,
    ) -> impl Future<Output = telldaddy_smtp::Result<()>> + Send;

    /// Authenticates with the best mechanism the server offers.
    fn authenticate(
        &mut self,
        user: &str,
        password: &str,
    ) -> impl Future<Output = telldaddy_smtp::Result<()>> + Send;

    /// Runs MAIL FROM, RCPT TO and DATA for one message.
    fn send_mail(
        &mut self,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> impl Future<Output = telldaddy_smtp::Result<()>> + Send;

    /// Sends QUIT if the session is still open.
    fn quit(&mut self) -> impl Future<Output = telldaddy_smtp::Result<()>> + Send;
}

/// Connector for real servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveConnector;

impl SmtpConnector for LiveConnector {
    type Session = LiveSession;

    async fn connect(&self, server: &str, port: u16) -> telldaddy_smtp::Result<LiveSession> {
        let stream = connect(server, port).await?;
        Ok(LiveSession {
            state: State::Greeting(stream),
        })
    }
}

#[derive(Debug)]
enum State {
    Greeting(SmtpStream),
    Connected(Client<Connected>),
    Authenticated(Client<Authenticated>),
    Closed,
}

/// Session over the type-state client.
#[derive(Debug)]
pub struct LiveSession {
    state: State,
}

impl LiveSession {
    fn take(&mut self) -> State {
        std::mem::replace(&mut self.state, State::Closed)
    }
}

fn out_of_order(step: &str) -> SmtpError {
    SmtpError::Protocol(format!("session not ready for {step}"))
}

impl SmtpSession for LiveSession {
    async fn greet(&mut self) -> telldaddy_smtp::Result<()> {
        let State::Greeting(stream) = self.take() else {
            return Err(out_of_order("EHLO"));
        };
        let client = Client::from_stream(stream).await?.ehlo(CLIENT_NAME).await?;
        self.state = State::Connected(client);
        Ok(())
    }

    async fn starttls(&mut self, server_name: &str) -> telldaddy_smtp::Result<()> {
        let State::Connected(client) = self.take() else {
            return Err(out_of_order("STARTTLS"));
        };
        let client = client.starttls(server_name, CLIENT_NAME).await?;
        self.state = State::Connected(client);
        Ok(())
    }

    async fn authenticate(&mut self, user: &str, password: &str) -> telldaddy_smtp::Result<()> {
        let State::Connected(client) = self.take() else {
            return Err(out_of_order("AUTH"));
        };
        let client = client.auth(user, password).await?;
        self.state = State::Authenticated(client);
        Ok(())
    }

    async fn send_mail(&mut self, from: Address, to: Address, data: &[u8]) -> telldaddy_smtp::Result<()> {
        let size = Some(data.len());
        let client = match self.take() {
            State::Connected(client) => client.mail_from(from, size).await?,
            State::Authenticated(client) => client.mail_from(from, size).await?,
            other => {
                self.state = other;
                return Err(out_of_order("MAIL FROM"));
            }
        };
        let client = client.rcpt_to(to).await?.data().await?;
        let client = client.send_message(data).await?;
        self.state = State::Connected(client);
        Ok(())
    }

    async fn quit(&mut self) -> telldaddy_smtp::Result<()> {
        match self.take() {
            State::Connected(client) => client.quit().await,
            State::Authenticated(client) => client.quit().await,
            State::Greeting(_) | State::Closed => Ok(()),
        }
    }
}

/// Delivers through an SMTP server.
///
/// Every failure is fatal and returned to the caller.
#[derive(Debug)]
pub struct SmtpTransport<C = LiveConnector> {
    config: SmtpConfig,
    credentials: CredentialStore,
    connector: C,
}

impl SmtpTransport {
    /// Creates a transport that talks to the configured server.
    #[must_use]
    pub const fn new(config: SmtpConfig, credentials: CredentialStore) -> Self {
        Self::with_connector(config, credentials, LiveConnector)
    }
}

impl<C: SmtpConnector> SmtpTransport<C> {
    /// Creates a transport that opens sessions through `connector`.
    #[must_use]
    pub const fn with_connector(config: SmtpConfig, credentials: CredentialStore, connector: C) -> Self {
        Self {
            config,
            credentials,
            connector,
        }
    }

    /// Returns the server settings.
    #[must_use]
    pub const fn config(&self) -> &SmtpConfig {
        &self.config
    }

    async fn converse(&self, session: &mut C::Session, from: Address, to: Address, data: &[u8]) -> Result<()> {
        session.greet().await.map_err(DeliveryError::Handshake)?;

        if self.config.use_tls {
            session
                .starttls(&self.config.server)
                .await
                .map_err(DeliveryError::Handshake)?;
            debug!("STARTTLS complete");
        }

        if self.config.use_auth {
            let password = self
                .credentials
                .fetch_password(&self.config.server, &self.config.user)
                .await?;
            session
                .authenticate(&self.config.user, &password)
                .await
                .map_err(DeliveryError::Authentication)?;
            debug!(user = %self.config.user, "Authenticated");
        }

        session
            .send_mail(from, to, data)
            .await
            .map_err(DeliveryError::Transmission)
    }
}

/// Extracts the envelope sender and recipient from the message headers.
fn envelope(message: &Message) -> Result<(Address, Address)> {
    let from = Address::from_header(message.from().unwrap_or_default())
        .map_err(DeliveryError::Transmission)?;
    let to = Address::from_header(message.to().unwrap_or_default())
        .map_err(DeliveryError::Transmission)?;
    Ok((from, to))
}

impl<C: SmtpConnector> Transport for SmtpTransport<C> {
    async fn send(&self, message: &Message) -> Result<()> {
        let (from, to) = envelope(message)?;
        let recipient = to.to_string();
        let data = message.to_wire();

        let server = &self.config.server;
        let port = self.config.port;
        debug!(%server, port, "Connecting to SMTP server");
        let mut session = self
            .connector
            .connect(server, port)
            .await
            .map_err(DeliveryError::Connection)?;

        let result = self.converse(&mut session, from, to, data.as_bytes()).await;

        if let Err(e) = session.quit().await {
            warn!(error = %e, "QUIT failed");
        }

        result?;
        info!(to = %recipient, %server, "Notification sent via SMTP");
        Ok(())
    }
}
