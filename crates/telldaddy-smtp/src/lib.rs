//! # telldaddy-smtp
//!
//! Async SMTP submission client (RFC 5321) used to deliver notifications.
//!
//! ## Features
//!
//! - **Type-state connection management**: invalid command orderings do not
//!   compile
//! - **STARTTLS** upgrade with webpki root verification
//! - **Authentication**: PLAIN and LOGIN, picked from what the server offers
//! - **SIZE** (RFC 1870): oversized messages are refused before `MAIL FROM`
//!
//! ## Quick Start
//!
//! ```no_run
//! use telldaddy_smtp::{Address, Client, connection::connect};
//!
//! # async fn run() -> telldaddy_smtp::Result<()> {
//! let stream = connect("smtp.example.com", 587).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.ehlo(telldaddy_smtp::CLIENT_NAME).await?;
//! let client = client
//!     .starttls("smtp.example.com", telldaddy_smtp::CLIENT_NAME)
//!     .await?;
//! let client = client.auth("user@example.com", "password").await?;
//!
//! let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//! let client = client
//!     .mail_from(Address::new("sender@example.com")?, Some(message.len()))
//!     .await?;
//! let client = client.rcpt_to(Address::new("recipient@example.com")?).await?;
//! let client = client.data().await?;
//! let client = client.send_message(message).await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth() ───→ Authenticated
//! └──────────────┘                      │
//!        │                              │
//!        └──────── mail_from() ─────────┴──→ MailTransaction ──→ RecipientAdded ──→ Data
//! ```
//!
//! `send_message` returns the client to `Connected`; `quit` is available in
//! every state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Name announced in `EHLO`.
pub const CLIENT_NAME: &str = "localhost";
