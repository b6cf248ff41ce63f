//! SMTP transport step ordering and error mapping.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use telldaddy_core::{
    CredentialError, CredentialResult, CredentialStore, DeliveryError, MemoryStore, SecretStore,
    SmtpConfig, SmtpConnector, SmtpSession, SmtpTransport, Transport,
};
use telldaddy_mime::build_plain;
use telldaddy_smtp::{Address, Error as SmtpError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

type Log = Arc<Mutex<Vec<String>>>;

/// Records every step; the step named in `fail` is rejected.
#[derive(Default)]
struct MockConnector {
    log: Log,
    fail: Option<&'static str>,
}

struct MockSession {
    log: Log,
    fail: Option<&'static str>,
}

impl MockSession {
    fn step(&self, name: &str) -> telldaddy_smtp::Result<()> {
        self.log.lock().unwrap().push(name.to_string());
        if self.fail == Some(name) {
            return Err(SmtpError::smtp_error(550, format!("{name} refused")));
        }
        Ok(())
    }
}

impl SmtpConnector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, server: &str, port: u16) -> telldaddy_smtp::Result<MockSession> {
        self.log.lock().unwrap().push(format!("connect {server}:{port}"));
        if self.fail == Some("connect") {
            return Err(SmtpError::Io(std::io::ErrorKind::ConnectionRefused.into()));
        }
        Ok(MockSession {
            log: Arc::clone(&self.log),
            fail: self.fail,
        })
    }
}

impl SmtpSession for MockSession {
    async fn greet(&mut self) -> telldaddy_smtp::Result<()> {
        self.step("ehlo")
    }

    async fn starttls(&mut self, _server_name: &str) -> telldaddy_smtp::Result<()> {
        self.step("starttls")
    }

    async fn authenticate(&mut self, user: &str, password: &str) -> telldaddy_smtp::Result<()> {
        self.step(&format!("auth {user} {password}"))
    }

    async fn send_mail(&mut self, from: Address, to: Address, data: &[u8]) -> telldaddy_smtp::Result<()> {
        let text = String::from_utf8_lossy(data);
        assert!(text.contains("\r\nhello"));
        self.step(&format!("send {from} {to}"))
    }

    async fn quit(&mut self) -> telldaddy_smtp::Result<()> {
        self.log.lock().unwrap().push("quit".to_string());
        Ok(())
    }
}

fn config(use_tls: bool, use_auth: bool) -> SmtpConfig {
    SmtpConfig {
        user: "a@x.com".to_string(),
        use_tls,
        use_auth,
        ..SmtpConfig::new("smtp.x.com")
    }
}

fn stored_password() -> CredentialStore {
    let store = CredentialStore::new(MemoryStore::new());
    store.store_password("smtp.x.com", "a@x.com", "pw").unwrap();
    store
}

fn message() -> telldaddy_mime::Message {
    build_plain("Monitor <a@x.com>", "b@y.com", "Hi", "hello")
}

#[tokio::test]
async fn test_tls_precedes_auth() {
    let connector = MockConnector::default();
    let log = Arc::clone(&connector.log);
    let transport = SmtpTransport::with_connector(config(true, true), stored_password(), connector);

    assert_ok!(transport.send(&message()).await);

    assert_eq!(
        *log.lock().unwrap(),
        [
            "connect smtp.x.com:25",
            "ehlo",
            "starttls",
            "auth a@x.com pw",
            "send a@x.com b@y.com",
            "quit"
        ]
    );
}

/// Answers every lookup and remembers which thread asked.
#[derive(Default)]
struct ThreadRecordingStore {
    seen: Arc<Mutex<Option<ThreadId>>>,
    panics: bool,
}

impl SecretStore for ThreadRecordingStore {
    fn get(&self, _service: &str, _account: &str) -> CredentialResult<Option<String>> {
        assert!(!self.panics, "backend crashed");
        *self.seen.lock().unwrap() = Some(thread::current().id());
        Ok(Some("pw".to_string()))
    }

    fn set(&self, _service: &str, _account: &str, _secret: &str) -> CredentialResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_password_lookup_leaves_runtime_thread() {
    let backend = ThreadRecordingStore::default();
    let seen = Arc::clone(&backend.seen);
    let credentials = CredentialStore::new(backend);
    let connector = MockConnector::default();
    let log = Arc::clone(&connector.log);
    let transport = SmtpTransport::with_connector(config(false, true), credentials, connector);

    assert_ok!(transport.send(&message()).await);

    let lookup_thread = seen.lock().unwrap().expect("backend was queried");
    assert_ne!(lookup_thread, thread::current().id());
    assert!(log.lock().unwrap().contains(&"auth a@x.com pw".to_string()));
}

#[tokio::test]
async fn test_panicking_backend_aborts_before_auth() {
    let backend = ThreadRecordingStore {
        panics: true,
        ..ThreadRecordingStore::default()
    };
    let connector = MockConnector::default();
    let log = Arc::clone(&connector.log);
    let transport =
        SmtpTransport::with_connector(config(false, true), CredentialStore::new(backend), connector);

    let err = assert_err!(transport.send(&message()).await);

    assert!(matches!(err, DeliveryError::Credential(CredentialError::LookupAborted)));
    assert!(!log.lock().unwrap().iter().any(|step| step.starts_with("auth")));
}

#[tokio::test]
async fn test_plain_session_skips_tls_and_auth() {
    let connector = MockConnector::default();
    let log = Arc::clone(&connector.log);
    let transport =
        SmtpTransport::with_connector(config(false, false), CredentialStore::unavailable(), connector);

    assert_ok!(transport.send(&message()).await);

    assert_eq!(
        *log.lock().unwrap(),
        ["connect smtp.x.com:25", "ehlo", "send a@x.com b@y.com", "quit"]
    );
}

#[tokio::test]
async fn test_missing_password_sends_no_auth() {
    let connector = MockConnector::default();
    let log = Arc::clone(&connector.log);
    let transport = SmtpTransport::with_connector(
        config(true, true),
        CredentialStore::new(MemoryStore::new()),
        connector,
    );

    let err = assert_err!(transport.send(&message()).await);
    assert!(matches!(
        err,
        DeliveryError::Credential(CredentialError::NotFound { ref server, ref account })
            if server == "smtp.x.com" && account == "a@x.com"
    ));

    let log = log.lock().unwrap();
    assert!(!log.iter().any(|step| step.starts_with("auth")));
    assert!(!log.iter().any(|step| step.starts_with("send")));
    assert_eq!(log.last().map(String::as_str), Some("quit"));
}

#[tokio::test]
async fn test_unavailable_backend_is_explicit_failure() {
    let connector = MockConnector::default();
    let log = Arc::clone(&connector.log);
    let transport =
        SmtpTransport::with_connector(config(false, true), CredentialStore::unavailable(), connector);

    let err = assert_err!(transport.send(&message()).await);
    assert!(matches!(err, DeliveryError::Credential(CredentialError::Unavailable)));
    assert!(!log.lock().unwrap().iter().any(|step| step.starts_with("send")));
}

#[tokio::test]
async fn test_quit_after_failed_send() {
    let connector = MockConnector {
        fail: Some("send a@x.com b@y.com"),
        ..MockConnector::default()
    };
    let log = Arc::clone(&connector.log);
    let transport =
        SmtpTransport::with_connector(config(false, false), CredentialStore::unavailable(), connector);

    let err = assert_err!(transport.send(&message()).await);
    assert!(matches!(err, DeliveryError::Transmission(_)));
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("quit"));
}

#[tokio::test]
async fn test_failure_kinds() {
    for (fail, use_tls, use_auth) in [
        ("connect", false, false),
        ("ehlo", false, false),
        ("starttls", true, false),
        ("auth a@x.com pw", false, true),
    ] {
        let connector = MockConnector {
            fail: Some(fail),
            ..MockConnector::default()
        };
        let transport =
            SmtpTransport::with_connector(config(use_tls, use_auth), stored_password(), connector);
        let err = transport.send(&message()).await.unwrap_err();

        match fail {
            "connect" => assert!(matches!(err, DeliveryError::Connection(_)), "{err}"),
            "ehlo" | "starttls" => assert!(matches!(err, DeliveryError::Handshake(_)), "{err}"),
            _ => assert!(matches!(err, DeliveryError::Authentication(_)), "{err}"),
        }
    }
}

#[tokio::test]
async fn test_missing_recipient_fails_before_connecting() {
    let connector = MockConnector::default();
    let log = Arc::clone(&connector.log);
    let transport =
        SmtpTransport::with_connector(config(false, false), CredentialStore::unavailable(), connector);
    let message = build_plain("a@x.com", "", "Hi", "hello");

    let err = assert_err!(transport.send(&message).await);
    assert!(matches!(err, DeliveryError::Transmission(SmtpError::InvalidAddress(_))));
    assert!(log.lock().unwrap().is_empty());
}

/// Accepts one session, answers everything positively and returns the
/// lines received.
async fn accepting_server() -> (u16, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();
        let mut in_data = false;

        write.write_all(b"220 fake.test ESMTP\r\n").await.unwrap();
        while let Some(line) = lines.next_line().await.unwrap() {
            received.push(line.clone());
            let reply: &[u8] = if in_data {
                if line != "." {
                    continue;
                }
                in_data = false;
                b"250 queued\r\n"
            } else if line.starts_with("EHLO") {
                b"250-fake.test\r\n250-AUTH PLAIN\r\n250 SIZE 100000\r\n"
            } else if line.starts_with("AUTH") {
                b"235 ok\r\n"
            } else if line == "DATA" {
                in_data = true;
                b"354 go ahead\r\n"
            } else if line == "QUIT" {
                write.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                b"250 OK\r\n"
            };
            write.write_all(reply).await.unwrap();
        }
        received
    });
    (port, handle)
}

#[tokio::test]
async fn test_live_session_delivers_scenario_message() {
    let (port, server) = accepting_server().await;
    let config = SmtpConfig {
        port,
        ..config(false, true)
    };
    let config = SmtpConfig {
        server: "127.0.0.1".to_string(),
        ..config
    };
    let store = CredentialStore::new(MemoryStore::new());
    store.store_password("127.0.0.1", "a@x.com", "pw").unwrap();
    let transport = SmtpTransport::new(config, store);

    assert_ok!(transport.send(&build_plain("a@x.com", "b@y.com", "Hi", "hello")).await);

    let received = server.await.unwrap();
    assert_eq!(received[0], "EHLO localhost");
    assert!(received[1].starts_with("AUTH PLAIN "));
    assert!(received[2].starts_with("MAIL FROM:<a@x.com> SIZE="));
    assert_eq!(received[3], "RCPT TO:<b@y.com>");
    assert!(received.iter().any(|line| line == "Subject: Hi"));
    assert!(received.iter().any(|line| line == "From: a@x.com"));
    assert!(received.iter().any(|line| line == "To: b@y.com"));
    assert!(received.iter().any(|line| line == "hello"));
    assert_eq!(received.last().map(String::as_str), Some("QUIT"));
}
