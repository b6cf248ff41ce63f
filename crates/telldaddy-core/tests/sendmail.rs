//! Sendmail transport against shell-script stand-ins.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use telldaddy_core::{DeliveryError, SendmailTransport, Transport};
use telldaddy_mime::{build_alternative, build_plain};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Writes an executable script that saves its arguments and stdin next to
/// itself, then runs `tail`.
fn fake_sendmail(dir: &Path, tail: &str) -> PathBuf {
    let path = dir.join("sendmail");
    let script = format!(
        "#!/bin/sh\necho \"$@\" > \"{args}\"\ncat > \"{input}\"\n{tail}\n",
        args = dir.join("args").display(),
        input = dir.join("input").display(),
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Collects everything a tracing fmt layer writes.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[tokio::test]
async fn test_message_piped_with_lf_line_endings() {
    let dir = TempDir::new().unwrap();
    let transport = SendmailTransport::new(fake_sendmail(dir.path(), "exit 0"));
    let message = build_plain("a@x.com", "b@y.com", "Hi", "hello");

    let outcome = assert_ok!(transport.deliver(&message).await);
    assert!(outcome.success());

    let args = std::fs::read_to_string(dir.path().join("args")).unwrap();
    assert_eq!(args.trim(), "-t -oi");

    let input = std::fs::read_to_string(dir.path().join("input")).unwrap();
    assert!(!input.contains('\r'));
    assert!(input.contains("Subject: Hi\n"));
    assert!(input.contains("From: a@x.com\n"));
    assert!(input.contains("To: b@y.com\n"));
    assert!(input.lines().any(|line| line == "hello"));
}

#[tokio::test]
async fn test_alternative_message_reaches_sendmail() {
    let dir = TempDir::new().unwrap();
    let transport = SendmailTransport::new(fake_sendmail(dir.path(), "exit 0"));
    let message = build_alternative("a@x.com", "b@y.com", "Hi", "plain", "<p>html</p>");

    assert_ok!(transport.send(&message).await);

    let input = std::fs::read_to_string(dir.path().join("input")).unwrap();
    let parsed = telldaddy_mime::Message::parse(&input).unwrap();
    assert_eq!(parsed.text_part().unwrap(), "plain");
    assert_eq!(parsed.html_part().unwrap(), "<p>html</p>");
}

#[tokio::test]
async fn test_non_zero_exit_is_logged_not_returned() {
    let dir = TempDir::new().unwrap();
    let transport = SendmailTransport::new(fake_sendmail(
        dir.path(),
        "echo 'queued nothing'\necho 'mailbox unavailable' >&2\nexit 1",
    ));
    let message = build_plain("a@x.com", "b@y.com", "Hi", "hello");

    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    assert_ok!(transport.send(&message).await);

    let logs = captured.text();
    assert!(logs.contains("ERROR"), "{logs}");
    assert!(logs.contains("Sendmail failed with exit status: 1"), "{logs}");
    assert!(logs.contains("mailbox unavailable"), "{logs}");
    assert!(logs.contains("queued nothing"), "{logs}");
}

#[tokio::test]
async fn test_deliver_reports_failure() {
    let dir = TempDir::new().unwrap();
    let transport = SendmailTransport::new(fake_sendmail(dir.path(), "echo nope >&2\nexit 75"));

    let outcome = assert_ok!(transport.deliver(&build_plain("a@x.com", "b@y.com", "Hi", "x")).await);
    assert!(!outcome.success());
    assert_eq!(outcome.status.code(), Some(75));
    assert_eq!(outcome.stderr.trim(), "nope");
}

#[tokio::test]
async fn test_missing_binary_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    let transport = SendmailTransport::new(dir.path().join("no-such-sendmail"));

    let err = assert_err!(transport.send(&build_plain("a@x.com", "b@y.com", "Hi", "x")).await);
    assert!(matches!(err, DeliveryError::Spawn(_)));
}
