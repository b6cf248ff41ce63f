//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
///
/// Every transition consumes the client. When the server rejects a command
/// the client sends a best-effort `QUIT` before handing back the error, so a
/// failed step never leaves the session open.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(reply_error(&greeting));
        }

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        debug!(server = %hostname, "SMTP greeting received");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                ..ServerInfo::default()
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        if !reply.is_success() {
            return Err(self.reject(reply_error(&reply)).await);
        }

        self.server_info.set_extensions(&reply.message);
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS and greets again.
    ///
    /// `server_name` is verified against the server certificate;
    /// `client_hostname` is what the second EHLO announces.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub async fn starttls(mut self, server_name: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(self.reject(Error::NotSupported("STARTTLS".into())).await);
        }

        let reply = self.send_command(Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(self.reject(reply_error(&reply)).await);
        }

        let Self {
            stream,
            server_info,
            _state,
        } = self;
        let stream = stream.upgrade_to_tls(server_name).await?;
        debug!(server = %server_name, "TLS established");

        // Capabilities advertised before the upgrade are discarded.
        let client = Self {
            stream,
            server_info: ServerInfo {
                hostname: server_info.hostname,
                ..ServerInfo::default()
            },
            _state,
        };
        client.ehlo(client_hostname).await
    }

    /// Authenticates with the most preferred mechanism the server offers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] when the server offers neither PLAIN
    /// nor LOGIN, or an SMTP error when the credentials are rejected.
    pub async fn auth(self, username: &str, password: &str) -> Result<Client<Authenticated>> {
        match self.server_info.preferred_auth() {
            Some(AuthMechanism::Plain) => self.auth_plain(username, password).await,
            Some(AuthMechanism::Login) => self.auth_login(username, password).await,
            None => Err(self.reject(Error::NotSupported("AUTH PLAIN or LOGIN".into())).await),
        }
    }

    /// Authenticates using PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        // authzid is left empty: \0username\0password
        let credentials = format!("\0{username}\0{password}");
        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(STANDARD.encode(credentials.as_bytes())),
            })
            .await?;
        if reply.code != ReplyCode::AUTH_SUCCESS {
            return Err(self.reject(reply_error(&reply)).await);
        }

        Ok(self.transition())
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not prompt for the username and
    /// password or rejects them.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(self.reject(reply_error(&reply)).await);
        }

        let reply = self
            .send_command(Command::AuthResponse(STANDARD.encode(username)))
            .await?;
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(self.reject(reply_error(&reply)).await);
        }

        let reply = self
            .send_command(Command::AuthResponse(STANDARD.encode(password)))
            .await?;
        if reply.code != ReplyCode::AUTH_SUCCESS {
            return Err(self.reject(reply_error(&reply)).await);
        }

        Ok(self.transition())
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails or `size` exceeds the
    /// limit the server advertised.
    pub async fn mail_from(
        self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.start_mail(from, size).await
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails or `size` exceeds the
    /// limit the server advertised.
    pub async fn mail_from(
        self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.start_mail(from, size).await
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        if !reply.is_success() {
            return Err(self.reject(reply_error(&reply)).await);
        }

        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        if !reply.is_success() {
            return Err(self.reject(reply_error(&reply)).await);
        }

        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<Data>> {
        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(self.reject(reply_error(&reply)).await);
        }

        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed and the terminating `.` line is appended. A trailing
    /// newline on `message` does not produce an extra empty line.
    ///
    /// # Errors
    ///
    /// Returns an error if sending the message fails or server rejects it.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        let payload = encode_data(message);
        trace!(bytes = payload.len(), "C: <message data>");
        self.stream.write_all(&payload).await?;
        self.stream.flush().await?;

        let reply = read_reply(&mut self.stream).await?;
        trace!(code = %reply.code, "S: {}", reply.message_text());
        if !reply.is_success() {
            return Err(self.reject(reply_error(&reply)).await);
        }

        Ok(self.transition())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    /// Returns the capabilities learned from the last EHLO.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns true once the session runs over TLS.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;
        if !reply.is_success() {
            return Err(reply_error(&reply));
        }

        Ok(())
    }

    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    async fn start_mail(
        mut self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        if let (Some(size), Some(limit)) = (size, self.server_info.max_message_size())
            && limit > 0
            && size > limit
        {
            return Err(self.reject(Error::MessageTooLarge { size, limit }).await);
        }

        // SIZE= is only legal once the server has advertised the extension.
        let size = size.filter(|_| self.server_info.supports_size());
        let reply = self.send_command(Command::MailFrom { from, size }).await?;
        if !reply.is_success() {
            return Err(self.reject(reply_error(&reply)).await);
        }

        Ok(self.transition())
    }

    /// Closes the session after a rejected step and returns `error`.
    async fn reject(mut self, error: Error) -> Error {
        if let Err(quit_error) = self.send_command(Command::Quit).await {
            debug!(error = %quit_error, "QUIT after rejection failed");
        }
        error
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        trace!("C: {}", cmd.redacted());
        self.stream.write_all(&cmd.serialize()).await?;
        self.stream.flush().await?;
        let reply = read_reply(&mut self.stream).await?;
        trace!(code = %reply.code, "S: {}", reply.message_text());
        Ok(reply)
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

fn reply_error(reply: &Reply) -> Error {
    Error::smtp_error(reply.code.as_u16(), reply.message_text())
}

/// Builds the DATA payload including the terminating `.` line.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 64);
    let body = message.strip_suffix(b"\n").unwrap_or(message);

    if !message.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}
