//! Delivery through a local sendmail binary.

use crate::error::{DeliveryError, Result};
use crate::transport::Transport;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use telldaddy_mime::{LineEnding, Message};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

/// What the sendmail process did with a message.
#[derive(Debug, Clone)]
pub struct SendmailOutcome {
    /// Exit status of the process.
    pub status: ExitStatus,
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

impl SendmailOutcome {
    /// Returns true if sendmail exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Delivers by piping the message to `sendmail -t -oi`.
///
/// Recipients are read from the message headers (`-t`) and a lone `.` line
/// does not end the input (`-oi`).
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    binary_path: PathBuf,
}

impl SendmailTransport {
    /// Uses the binary at `binary_path`.
    #[must_use]
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Returns the binary this transport runs.
    #[must_use]
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Runs sendmail on `message` and reports how it exited.
    ///
    /// A non-zero exit is not an error here; see [`Transport::send`].
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Spawn`] if the process cannot be started or
    /// its pipes fail.
    pub async fn deliver(&self, message: &Message) -> Result<SendmailOutcome> {
        let wire = message.to_wire_with(LineEnding::Lf);

        debug!(binary = %self.binary_path.display(), "Spawning sendmail");
        let mut child = Command::new(&self.binary_path)
            .args(["-t", "-oi"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DeliveryError::Spawn)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DeliveryError::Spawn(io::Error::other("sendmail stdin not captured")))?;

        let feed = async move {
            let written = stdin.write_all(wire.as_bytes()).await;
            // Dropping stdin closes the pipe so sendmail sees EOF.
            drop(stdin);
            match written {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("sendmail closed stdin early");
                    Ok(())
                }
                other => other,
            }
        };

        let (written, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(DeliveryError::Spawn)?;
        written.map_err(DeliveryError::Spawn)?;

        Ok(SendmailOutcome {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Transport for SendmailTransport {
    /// Delivers via sendmail.
    ///
    /// Unlike SMTP, a non-zero exit is logged at error level and `Ok(())` is
    /// returned; only failing to run the binary is an error.
    async fn send(&self, message: &Message) -> Result<()> {
        let outcome = self.deliver(message).await?;
        if outcome.success() {
            info!(to = message.to().unwrap_or_default(), "Notification sent via sendmail");
        } else {
            error!(
                stdout = %outcome.stdout.trim_end(),
                stderr = %outcome.stderr.trim_end(),
                "Sendmail failed with {}",
                outcome.status
            );
        }
        Ok(())
    }
}
