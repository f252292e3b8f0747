//! Delivery state machine against a scripted in-memory transport.

#![allow(clippy::unwrap_used)]

use mailsend::{
    DeliveryState, Dispatcher, Envelope, Error, ErrorKind, Mailer, MessageBuilder, SecurityMode,
    SecurityPlan, TlsOptions, Transport, TransportConfig,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Connect,
    Secure,
    Authenticate,
    Submit,
}

#[derive(Debug, Default)]
struct Log {
    calls: Vec<String>,
    closes: usize,
    envelope: Option<Envelope>,
    message: Vec<u8>,
}

/// Transport that records every call and fails at a chosen step.
#[derive(Debug, Clone, Default)]
struct Scripted {
    log: Arc<Mutex<Log>>,
    fail_at: Option<Step>,
    hang_at: Option<Step>,
}

impl Scripted {
    fn failing_at(step: Step) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    fn hanging_at(step: Step) -> Self {
        Self {
            hang_at: Some(step),
            ..Self::default()
        }
    }

    async fn step(&self, step: Step, call: String) -> mailsend::Result<()> {
        self.log.lock().unwrap().calls.push(call);
        if self.hang_at == Some(step) {
            std::future::pending::<()>().await;
        }
        if self.fail_at != Some(step) {
            return Ok(());
        }
        Err(match step {
            Step::Connect => Error::Connection("connection refused".into()),
            Step::Secure => Error::Security("certificate has expired".into()),
            Step::Authenticate => {
                Error::Authentication("SMTP error 535: 5.7.8 credentials invalid".into())
            }
            Step::Submit => Error::Submission {
                code: Some(550),
                message: "5.1.1 mailbox unavailable".into(),
            },
        })
    }

    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl Transport for Scripted {
    async fn connect(&mut self, host: &str, port: u16) -> mailsend::Result<()> {
        self.step(Step::Connect, format!("connect {host}:{port}")).await
    }

    async fn secure(&mut self, plan: SecurityPlan, _tls: &TlsOptions) -> mailsend::Result<()> {
        self.step(Step::Secure, format!("secure {plan:?}")).await
    }

    async fn authenticate(&mut self, username: &str, _password: &str) -> mailsend::Result<()> {
        self.step(Step::Authenticate, format!("authenticate {username}"))
            .await
    }

    async fn submit(&mut self, envelope: &Envelope, message: &[u8]) -> mailsend::Result<()> {
        {
            let mut log = self.log.lock().unwrap();
            log.envelope = Some(envelope.clone());
            log.message = message.to_vec();
        }
        self.step(Step::Submit, "submit".into()).await
    }

    async fn close(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.calls.push("close".into());
        log.closes += 1;
    }
}

fn message() -> MessageBuilder {
    let mut message = MessageBuilder::new();
    message.add_from("me@example.com", Some("Me")).unwrap();
    message.add_to("a@x.com", None).unwrap();
    message.add_bcc("hidden@x.com", None).unwrap();
    message.set_subject("Hi");
    message.set_text_body("Hello");
    message
}

fn with_credentials() -> TransportConfig {
    TransportConfig::builder("smtp.example.com")
        .port(587)
        .security(SecurityMode::StartTls)
        .credentials("me@example.com", "secret")
        .build()
}

#[tokio::test]
async fn authenticated_send_walks_every_state() {
    let transport = Scripted::default();
    let mut dispatcher = Dispatcher::new(with_credentials(), transport.clone());
    let result = dispatcher.send(&mut message()).await;

    assert!(result.is_success(), "{:?}", result.diagnostic());
    assert_eq!(
        dispatcher.history(),
        [
            DeliveryState::Idle,
            DeliveryState::Connected,
            DeliveryState::Secured,
            DeliveryState::Authenticated,
            DeliveryState::Sent,
        ]
    );
    assert_eq!(
        transport.calls(),
        [
            "connect smtp.example.com:587",
            "secure StartTls { required: true }",
            "authenticate me@example.com",
            "submit",
            "close",
        ]
    );

    let log = transport.log.lock().unwrap();
    let envelope = log.envelope.as_ref().unwrap();
    assert_eq!(envelope.reverse_path, "me@example.com");
    assert_eq!(envelope.forward_paths, ["a@x.com", "hidden@x.com"]);

    let wire = String::from_utf8(log.message.clone()).unwrap();
    assert!(wire.contains("Subject: Hi\r\n"));
    assert!(!wire.contains("hidden@x.com"));
}

#[tokio::test]
async fn missing_or_partial_credentials_skip_authentication() {
    let partial = [
        TransportConfig::new("smtp.example.com"),
        TransportConfig::builder("smtp.example.com")
            .username("me")
            .build(),
        TransportConfig::builder("smtp.example.com")
            .credentials("me", "")
            .build(),
    ];

    for config in partial {
        let transport = Scripted::default();
        let mut dispatcher = Dispatcher::new(config, transport.clone());
        assert!(dispatcher.send(&mut message()).await.is_success());
        assert!(
            !transport.calls().iter().any(|c| c.starts_with("authenticate")),
            "{:?}",
            transport.calls()
        );
        assert!(!dispatcher.history().contains(&DeliveryState::Authenticated));
    }
}

#[tokio::test]
async fn failures_map_to_their_kind_and_close_once() {
    let cases = [
        (Step::Connect, ErrorKind::Connection, DeliveryState::Idle),
        (Step::Secure, ErrorKind::Security, DeliveryState::Connected),
        (Step::Authenticate, ErrorKind::Authentication, DeliveryState::Secured),
        (Step::Submit, ErrorKind::Submission, DeliveryState::Secured),
    ];

    for (step, kind, last_reached) in cases {
        let transport = Scripted::failing_at(step);
        let mut dispatcher = Dispatcher::new(with_credentials(), transport.clone());
        let result = dispatcher.send(&mut message()).await;

        assert_eq!(result.kind(), Some(kind), "failing at {step:?}");
        assert_eq!(dispatcher.state(), DeliveryState::Failed);
        let history = dispatcher.history();
        assert_eq!(history[history.len() - 1], DeliveryState::Failed);
        assert!(history.contains(&last_reached));
        assert_eq!(transport.closes(), 1, "failing at {step:?}");
        assert_eq!(transport.calls().last().map(String::as_str), Some("close"));
    }
}

#[tokio::test]
async fn connect_failure_still_closes() {
    let transport = Scripted::failing_at(Step::Connect);
    let mut dispatcher = Dispatcher::new(with_credentials(), transport.clone());
    let result = dispatcher.send(&mut message()).await;

    assert_eq!(result.kind(), Some(ErrorKind::Connection));
    assert_eq!(dispatcher.history(), [DeliveryState::Idle, DeliveryState::Failed]);
    assert_eq!(
        transport.calls(),
        ["connect smtp.example.com:587", "close"]
    );
}

#[tokio::test]
async fn submission_error_keeps_the_reply() {
    let transport = Scripted::failing_at(Step::Submit);
    let mut dispatcher = Dispatcher::new(with_credentials(), transport);
    let result = dispatcher.send(&mut message()).await;

    assert!(matches!(
        result.error(),
        Some(Error::Submission { code: Some(550), .. })
    ));
    assert_eq!(
        result.diagnostic().unwrap(),
        "Submission error 550: 5.1.1 mailbox unavailable"
    );
}

#[tokio::test]
async fn missing_attachment_fails_after_authentication() {
    let mut message = message();
    message.add_attachment("/nonexistent/report.pdf");

    let transport = Scripted::default();
    let mut dispatcher = Dispatcher::new(with_credentials(), transport.clone());
    let result = dispatcher.send(&mut message).await;

    assert_eq!(result.kind(), Some(ErrorKind::Io));
    assert!(result.diagnostic().unwrap().contains("report.pdf"));
    assert!(!transport.calls().contains(&"submit".to_string()));
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn message_without_recipients_is_invalid_state() {
    let mut message = MessageBuilder::new();
    message.add_from("me@example.com", None).unwrap();

    let transport = Scripted::default();
    let mut dispatcher = Dispatcher::new(TransportConfig::new("h"), transport.clone());
    let result = dispatcher.send(&mut message).await;

    assert_eq!(result.kind(), Some(ErrorKind::InvalidState));
    assert_eq!(transport.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_steps_time_out() {
    let config = TransportConfig::builder("smtp.example.com")
        .credentials("me", "secret")
        .connect_timeout(Duration::from_secs(10))
        .io_timeout(Duration::from_secs(10))
        .build();

    for (step, kind) in [
        (Step::Connect, ErrorKind::Connection),
        (Step::Secure, ErrorKind::Connection),
        (Step::Authenticate, ErrorKind::Authentication),
        (Step::Submit, ErrorKind::Submission),
    ] {
        let transport = Scripted::hanging_at(step);
        let mut dispatcher = Dispatcher::new(config.clone(), transport.clone());
        let result = dispatcher.send(&mut message()).await;

        assert_eq!(result.kind(), Some(kind), "stalled at {step:?}");
        assert!(result.diagnostic().unwrap().contains("timed out after 10s"));
        assert_eq!(transport.closes(), 1);
    }
}

#[tokio::test]
async fn mailer_sends_once() {
    let transport = Scripted::default();
    let mut mailer = Mailer::new(with_credentials());
    mailer.add_from("me@example.com", None).unwrap();
    mailer.add_to("a@x.com", None).unwrap();

    assert!(mailer.send_with(transport.clone()).await.is_success());
    assert!(mailer.is_sent());
    assert!(mailer.is_finalized());

    let again = mailer.send_with(transport.clone()).await;
    assert_eq!(again.kind(), Some(ErrorKind::InvalidState));
    assert_eq!(transport.calls().iter().filter(|c| *c == "submit").count(), 1);
}

#[tokio::test]
async fn finalized_message_is_not_resent() {
    let mut message = message();
    let transport = Scripted::default();
    let mut dispatcher = Dispatcher::new(with_credentials(), transport.clone());

    assert!(dispatcher.send(&mut message).await.is_success());
    let again = dispatcher.send(&mut message).await;

    assert_eq!(again.kind(), Some(ErrorKind::InvalidState));
    assert_eq!(dispatcher.history(), [DeliveryState::Idle, DeliveryState::Failed]);
    assert_eq!(transport.closes(), 1);
}
