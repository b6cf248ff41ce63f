//! `telldaddy` - send change notifications by SMTP or sendmail.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use telldaddy_core::{CredentialStore, Mailer, SmtpConfig, Transport, TransportConfig};
use telldaddy_mime::{Message, MessageBuilder};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

/// Deliver change notifications by email.
#[derive(Debug, Parser)]
#[command(name = "telldaddy", version, about)]
struct Cli {
    /// Settings file (default: <config dir>/telldaddy/mail.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send one notification.
    Send(SendArgs),
    /// Store the SMTP password in the system keyring.
    SetPassword,
    /// Report whether an SMTP password is stored.
    CheckPassword,
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Subject line.
    #[arg(short, long)]
    subject: String,

    /// HTML alternative of the body.
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,

    /// Plain text body; read from stdin when omitted.
    #[arg(value_name = "BODY_FILE")]
    body: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "telldaddy=debug,telldaddy_core=debug,telldaddy_smtp=debug"
    } else {
        "telldaddy=info,telldaddy_core=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    debug!(transport = ?settings.transport, "Settings loaded");

    match cli.command {
        Command::Send(args) => send(&settings, &args).await,
        Command::SetPassword => {
            let smtp = smtp_settings(&settings)?;
            CredentialStore::keyring()
                .set_password(&smtp.server, &smtp.user)
                .context("Failed to store password")?;
            info!(server = %smtp.server, user = %smtp.user, "Password stored");
            Ok(())
        }
        Command::CheckPassword => {
            let smtp = smtp_settings(&settings)?;
            let stored = CredentialStore::keyring()
                .has_password(&smtp.server, &smtp.user)
                .context("Failed to query keyring")?;
            if stored {
                println!("Password stored for {} on {}", smtp.user, smtp.server);
                Ok(())
            } else {
                bail!("No password stored for {} on {}", smtp.user, smtp.server)
            }
        }
    }
}

async fn send(settings: &Settings, args: &SendArgs) -> Result<()> {
    let message = compose(settings, args)?;
    let mailer = Mailer::from_config(&settings.transport, CredentialStore::keyring());

    info!(to = %settings.to, transport = mailer.kind(), "Sending notification");
    tokio::time::timeout(settings.timeout(), mailer.send(&message))
        .await
        .map_err(|_| anyhow!("Delivery timed out after {}s", settings.timeout_secs))?
        .context("Delivery failed")?;
    Ok(())
}

fn compose(settings: &Settings, args: &SendArgs) -> Result<Message> {
    let body = match &args.body {
        Some(path) => read_file(path)?,
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read body from stdin")?;
            body
        }
    };

    let mut builder = MessageBuilder::new()
        .from(&settings.from)
        .to(&settings.to)
        .subject(&args.subject)
        .text_body(body);
    if let Some(path) = &args.html {
        builder = builder.html_body(read_file(path)?);
    }
    Ok(builder.build())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn smtp_settings(settings: &Settings) -> Result<&SmtpConfig> {
    match &settings.transport {
        TransportConfig::Smtp(smtp) => Ok(smtp),
        TransportConfig::Sendmail(_) => bail!("Passwords are only used by the smtp transport"),
    }
}
