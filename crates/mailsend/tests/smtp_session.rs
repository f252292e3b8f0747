//! End-to-end sends against an in-process SMTP server.

#![allow(clippy::unwrap_used)]

use mailsend::{ErrorKind, Mailer, SecurityMode, TransportConfig};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shows delivery events with `RUST_LOG=mailsend=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsend=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// How the mock server behaves.
#[derive(Clone, Copy)]
struct Behavior {
    starttls: bool,
    accept_auth: bool,
    /// Recipient answered with 550.
    refuse: Option<&'static str>,
}

const RELAY: Behavior = Behavior {
    starttls: false,
    accept_auth: true,
    refuse: None,
};

/// Accepts one session and returns every line the client sent.
async fn mock_server(behavior: Behavior) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut received = Vec::new();

        write.write_all(b"220 mx.test ESMTP ready\r\n").await.unwrap();

        let mut in_data = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            received.push(line.clone());

            if in_data {
                if line == "." {
                    in_data = false;
                    write.write_all(b"250 2.0.0 Ok: queued\r\n").await.unwrap();
                }
                continue;
            }

            let reply = match line.as_str() {
                l if l.starts_with("EHLO") && behavior.starttls => {
                    "250-mx.test\r\n250-STARTTLS\r\n250 AUTH PLAIN\r\n"
                }
                l if l.starts_with("EHLO") => "250-mx.test\r\n250-SIZE 10000000\r\n250 AUTH PLAIN\r\n",
                l if l.starts_with("AUTH") && behavior.accept_auth => {
                    "235 2.7.0 Authentication successful\r\n"
                }
                l if l.starts_with("AUTH") => "535 5.7.8 Authentication credentials invalid\r\n",
                l if behavior.refuse.is_some_and(|to| l == format!("RCPT TO:<{to}>")) => {
                    "550 5.1.1 Recipient address rejected\r\n"
                }
                l if l.starts_with("MAIL FROM") || l.starts_with("RCPT TO") => "250 2.1.0 Ok\r\n",
                "DATA" => "354 End data with <CR><LF>.<CR><LF>\r\n",
                "RSET" => "250 2.0.0 Ok\r\n",
                "QUIT" => "221 2.0.0 Bye\r\n",
                _ => "502 5.5.2 Error: command not recognized\r\n",
            };
            write.write_all(reply.as_bytes()).await.unwrap();
            if line == "DATA" {
                in_data = true;
            }
            if line == "QUIT" {
                break;
            }
        }
        received
    });

    (port, handle)
}

fn plaintext(port: u16) -> mailsend::TransportConfigBuilder {
    TransportConfig::builder("127.0.0.1")
        .port(port)
        .security(SecurityMode::None)
        .client_hostname("client.test")
}

fn data_section(received: &[String]) -> &[String] {
    let start = received.iter().position(|l| l == "DATA").unwrap() + 1;
    let end = start + received[start..].iter().position(|l| l == ".").unwrap();
    &received[start..end]
}

#[tokio::test]
async fn sends_message_with_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let attachment = dir.path().join("notes.txt");
    std::fs::File::create(&attachment)
        .unwrap()
        .write_all(b"attached notes")
        .unwrap();
    let trace = dir.path().join("smtp.log");

    init_tracing();
    let (port, server) = mock_server(RELAY).await;
    let config = plaintext(port)
        .credentials("me@example.com", "hunter2")
        .trace_path(&trace)
        .build();

    let mut mailer = Mailer::new(config);
    mailer.add_from("me@example.com", Some("Me")).unwrap();
    mailer.add_to("a@x.com", None).unwrap();
    mailer.set_subject("Hi");
    mailer.set_text_body("Hello");
    mailer.add_attachment(&attachment);

    let result = mailer.send_async().await;
    assert!(result.is_success(), "{:?}", result.diagnostic());

    let received = server.await.unwrap();
    assert_eq!(received[0], "EHLO client.test");
    assert!(received[1].starts_with("AUTH PLAIN "));
    assert!(received[2].starts_with("MAIL FROM:<me@example.com>"));
    assert_eq!(
        received.iter().filter(|l| l.starts_with("RCPT TO")).count(),
        1
    );
    assert!(received.contains(&"RCPT TO:<a@x.com>".to_string()));
    assert_eq!(received.last().map(String::as_str), Some("QUIT"));

    let data = data_section(&received);
    assert!(data.contains(&"Subject: Hi".to_string()));
    assert!(data.iter().any(|l| l.starts_with("Content-Type: multipart/mixed")));
    assert_eq!(
        data.iter()
            .filter(|l| l.starts_with("Content-Disposition: attachment"))
            .count(),
        1
    );
    assert!(data.contains(&"Hello".to_string()));

    let transcript = std::fs::read_to_string(&trace).unwrap();
    assert!(transcript.starts_with("S: 220 mx.test ESMTP ready\r\n"));
    assert!(transcript.contains("C: EHLO client.test\r\n"));
    assert!(transcript.contains("C: ********\r\n"));
    assert!(!transcript.contains("AUTH PLAIN "));
    assert!(transcript.contains("C: Subject: Hi\r\n"));
    assert!(transcript.contains("S: 221 2.0.0 Bye\r\n"));
}

#[tokio::test]
async fn bcc_reaches_the_envelope_only() {
    init_tracing();
    let (port, server) = mock_server(RELAY).await;
    let mut mailer = Mailer::new(plaintext(port).build());
    mailer.add_from("me@example.com", None).unwrap();
    mailer.add_to("a@x.com", None).unwrap();
    mailer.add_bcc("secret@x.com", None).unwrap();
    mailer.set_html_body("<p>hi</p>");

    assert!(mailer.send_async().await.is_success());

    let received = server.await.unwrap();
    assert!(!received.iter().any(|l| l.starts_with("AUTH")));
    assert!(received.contains(&"RCPT TO:<secret@x.com>".to_string()));
    assert!(!data_section(&received).iter().any(|l| l.contains("secret@x.com")));
}

#[tokio::test]
async fn optional_starttls_falls_back_to_plaintext() {
    init_tracing();
    let (port, server) = mock_server(RELAY).await;
    let config = plaintext(port)
        .security(SecurityMode::StartTlsIfAvailable)
        .build();
    let mut mailer = Mailer::new(config);
    mailer.add_from("me@example.com", None).unwrap();
    mailer.add_to("a@x.com", None).unwrap();

    assert!(mailer.send_async().await.is_success());
    let received = server.await.unwrap();
    assert!(!received.contains(&"STARTTLS".to_string()));
    assert!(received.contains(&"DATA".to_string()));
}

#[tokio::test]
async fn required_starttls_fails_closed() {
    init_tracing();
    let (port, server) = mock_server(RELAY).await;
    let config = plaintext(port).security(SecurityMode::StartTls).build();
    let mut mailer = Mailer::new(config);
    mailer.add_from("me@example.com", None).unwrap();
    mailer.add_to("a@x.com", None).unwrap();

    let result = mailer.send_async().await;
    assert_eq!(result.kind(), Some(ErrorKind::Security));

    let received = server.await.unwrap();
    assert_eq!(received, ["EHLO client.test", "QUIT"]);
}

#[test]
fn blocking_send_reports_rejected_credentials() {
    init_tracing();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (port, server) = runtime.block_on(mock_server(Behavior {
        accept_auth: false,
        ..RELAY
    }));

    let config = plaintext(port).credentials("me@example.com", "wrong").build();
    let mut mailer = Mailer::new(config);
    mailer.add_from("me@example.com", None).unwrap();
    mailer.add_to("a@x.com", None).unwrap();
    mailer.set_subject("Hi");
    mailer.set_text_body("Hello");

    let result = mailer.send();
    assert_eq!(result.kind(), Some(ErrorKind::Authentication));
    let diagnostic = result.diagnostic().unwrap();
    assert!(diagnostic.to_lowercase().contains("authentication"));
    assert!(diagnostic.contains("535"));

    let received = runtime.block_on(server).unwrap();
    assert!(!received.iter().any(|l| l.starts_with("MAIL FROM")));
    assert_eq!(received.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn refused_recipient_resets_and_quits() {
    init_tracing();
    let (port, server) = mock_server(Behavior {
        refuse: Some("nobody@x.com"),
        ..RELAY
    })
    .await;
    let mut mailer = Mailer::new(plaintext(port).build());
    mailer.add_from("me@example.com", None).unwrap();
    mailer.add_to("a@x.com", None).unwrap();
    mailer.add_cc("nobody@x.com", None).unwrap();
    mailer.set_text_body("Hello");

    let result = mailer.send_async().await;
    assert!(matches!(
        result.error(),
        Some(mailsend::Error::Submission { code: Some(550), .. })
    ));

    let received = server.await.unwrap();
    assert!(!received.contains(&"DATA".to_string()));
    assert_eq!(
        received[received.len() - 3..],
        ["RCPT TO:<nobody@x.com>", "RSET", "QUIT"]
    );
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut mailer = Mailer::new(plaintext(port).build());
    mailer.add_from("me@example.com", None).unwrap();
    mailer.add_to("a@x.com", None).unwrap();

    let result = mailer.send_async().await;
    assert_eq!(result.kind(), Some(ErrorKind::Connection));
}
