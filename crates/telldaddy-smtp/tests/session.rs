//! Client sessions against a scripted in-process SMTP server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use telldaddy_smtp::connection::connect;
use telldaddy_smtp::{Address, AuthMechanism, Client, Error};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

/// Replies the fake server gives; everything not listed succeeds.
#[derive(Clone)]
struct Script {
    ehlo: &'static [&'static str],
    rcpt: &'static str,
    auth_plain: &'static str,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            ehlo: &["fake.test hello", "AUTH PLAIN LOGIN", "SIZE 1000"],
            rcpt: "250 OK",
            auth_plain: "235 2.7.0 Authentication successful",
        }
    }
}

/// Starts a one-shot server and returns its port plus a handle yielding
/// every line the client sent.
async fn fake_server(script: Script) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut received = Vec::new();

        write.write_all(b"220 fake.test ESMTP\r\n").await.unwrap();

        let mut in_data = false;
        let mut login_step = 0;
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let cmd = line.trim_end_matches(['\r', '\n']).to_string();
            received.push(cmd.clone());

            let reply = if in_data {
                if cmd == "." {
                    in_data = false;
                    "250 2.0.0 queued".to_string()
                } else {
                    continue;
                }
            } else if login_step == 1 {
                login_step = 2;
                "334 UGFzc3dvcmQ6".to_string()
            } else if login_step == 2 {
                login_step = 0;
                "235 2.7.0 ok".to_string()
            } else if cmd.starts_with("EHLO") {
                let mut lines: Vec<String> = script.ehlo.iter().map(ToString::to_string).collect();
                let last = lines.len() - 1;
                for (i, l) in lines.iter_mut().enumerate() {
                    let sep = if i == last { ' ' } else { '-' };
                    *l = format!("250{sep}{l}");
                }
                lines.join("\r\n")
            } else if cmd.starts_with("AUTH PLAIN") {
                script.auth_plain.to_string()
            } else if cmd == "AUTH LOGIN" {
                login_step = 1;
                "334 VXNlcm5hbWU6".to_string()
            } else if cmd.starts_with("MAIL FROM") {
                "250 OK".to_string()
            } else if cmd.starts_with("RCPT TO") {
                script.rcpt.to_string()
            } else if cmd == "DATA" {
                in_data = true;
                "354 End data with <CR><LF>.<CR><LF>".to_string()
            } else if cmd == "QUIT" {
                write.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                "502 unrecognized".to_string()
            };

            write.write_all(reply.as_bytes()).await.unwrap();
            write.write_all(b"\r\n").await.unwrap();
        }

        received
    });

    (port, handle)
}

async fn greeted(port: u16) -> Client<telldaddy_smtp::Connected> {
    let stream = connect("127.0.0.1", port).await.unwrap();
    let client = Client::from_stream(stream).await.unwrap();
    client.ehlo(telldaddy_smtp::CLIENT_NAME).await.unwrap()
}

#[tokio::test]
async fn test_full_authenticated_session() {
    let (port, server) = fake_server(Script::default()).await;
    let client = greeted(port).await;

    assert_eq!(client.server_info().hostname, "fake.test");
    assert_eq!(client.server_info().max_message_size(), Some(1000));
    assert_eq!(client.server_info().preferred_auth(), Some(AuthMechanism::Plain));

    let message = b"Subject: Hi\r\n\r\nhello\r\n.hidden\r\n";
    let client = assert_ok!(client.auth("user", "pass").await);
    let client = assert_ok!(
        client
            .mail_from(Address::new("a@x.com").unwrap(), Some(message.len()))
            .await
    );
    let client = assert_ok!(client.rcpt_to(Address::new("b@y.com").unwrap()).await);
    let client = assert_ok!(client.data().await);
    let client = assert_ok!(client.send_message(message).await);
    assert_ok!(client.quit().await);

    let received = server.await.unwrap();
    assert_eq!(received[0], "EHLO localhost");
    // base64("\0user\0pass")
    assert_eq!(received[1], "AUTH PLAIN AHVzZXIAcGFzcw==");
    assert_eq!(received[2], format!("MAIL FROM:<a@x.com> SIZE={}", message.len()));
    assert_eq!(received[3], "RCPT TO:<b@y.com>");
    assert_eq!(received[4], "DATA");
    assert_eq!(&received[5..10], ["Subject: Hi", "", "hello", "..hidden", "."]);
    assert_eq!(received.last().unwrap(), "QUIT");
}

#[tokio::test]
async fn test_auth_login_when_plain_not_offered() {
    let (port, server) = fake_server(Script {
        ehlo: &["fake.test hello", "AUTH LOGIN"],
        ..Script::default()
    })
    .await;
    let client = greeted(port).await;

    let client = assert_ok!(client.auth("user", "pass").await);
    assert_ok!(client.quit().await);

    let received = server.await.unwrap();
    assert_eq!(received[1..4], ["AUTH LOGIN", "dXNlcg==", "cGFzcw=="]);
}

#[tokio::test]
async fn test_auth_without_supported_mechanism_quits() {
    let (port, server) = fake_server(Script {
        ehlo: &["fake.test hello", "AUTH CRAM-MD5"],
        ..Script::default()
    })
    .await;
    let client = greeted(port).await;

    let err = assert_err!(client.auth("user", "pass").await);
    assert!(matches!(err, Error::NotSupported(_)));

    let received = server.await.unwrap();
    assert_eq!(received.last().unwrap(), "QUIT");
}

#[tokio::test]
async fn test_rejected_credentials() {
    let (port, server) = fake_server(Script {
        auth_plain: "535 5.7.8 Authentication credentials invalid",
        ..Script::default()
    })
    .await;
    let client = greeted(port).await;

    let err = assert_err!(client.auth("user", "wrong").await);
    assert_eq!(err.code(), Some(535));
    assert!(err.is_permanent());

    let received = server.await.unwrap();
    assert_eq!(received.last().unwrap(), "QUIT");
}

#[tokio::test]
async fn test_rejected_recipient_quits() {
    let (port, server) = fake_server(Script {
        rcpt: "550 5.1.1 No such user",
        ..Script::default()
    })
    .await;
    let client = greeted(port).await;

    let client = client
        .mail_from(Address::new("a@x.com").unwrap(), None)
        .await
        .unwrap();
    let err = assert_err!(client.rcpt_to(Address::new("nobody@y.com").unwrap()).await);
    assert!(matches!(err, Error::SmtpError { code: 550, .. }));

    let received = server.await.unwrap();
    assert_eq!(received.last().unwrap(), "QUIT");
}

#[tokio::test]
async fn test_message_over_size_limit_is_refused_locally() {
    let (port, server) = fake_server(Script::default()).await;
    let client = greeted(port).await;

    let err = assert_err!(
        client
            .mail_from(Address::new("a@x.com").unwrap(), Some(5000))
            .await
    );
    assert!(matches!(
        err,
        Error::MessageTooLarge {
            size: 5000,
            limit: 1000
        }
    ));

    let received = server.await.unwrap();
    assert!(!received.iter().any(|line| line.starts_with("MAIL FROM")));
}

#[tokio::test]
async fn test_starttls_not_advertised() {
    let (port, server) = fake_server(Script::default()).await;
    let client = greeted(port).await;

    let err = assert_err!(client.starttls("127.0.0.1", telldaddy_smtp::CLIENT_NAME).await);
    assert!(matches!(err, Error::NotSupported(_)));

    let received = server.await.unwrap();
    assert_eq!(received, ["EHLO localhost", "QUIT"]);
}

#[tokio::test]
async fn test_connection_closed_mid_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"220 fake.test ESMTP\r\n").await.unwrap();
    });

    let stream = connect("127.0.0.1", port).await.unwrap();
    let client = Client::from_stream(stream).await.unwrap();
    let err = assert_err!(client.ehlo("localhost").await);
    assert!(matches!(err, Error::Io(_)));
}
