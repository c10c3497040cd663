//! End-to-end tests for composing and sending through a lettre transport
//!
//! A recording transport stands in for the SMTP server and keeps every
//! envelope and raw message it is handed.

use lettre::{address::Envelope, Transport};
use send_mail::smtp::{send_mail_with, AddressInput, AddressList, Mail, MailError};
use std::cell::RefCell;
use std::io;

#[derive(Default)]
struct RecordingTransport {
    sent: RefCell<Vec<(Vec<String>, Option<String>, String)>>,
    fail_with: Option<io::ErrorKind>,
}

impl RecordingTransport {
    fn failing(kind: io::ErrorKind) -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            fail_with: Some(kind),
        }
    }

    fn calls(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Transport for RecordingTransport {
    type Ok = ();
    type Error = io::Error;

    fn send_raw(&self, envelope: &Envelope, email: &[u8]) -> Result<Self::Ok, Self::Error> {
        if let Some(kind) = self.fail_with {
            return Err(io::Error::new(kind, "connection refused by stub"));
        }

        let recipients = envelope.to().iter().map(|a| a.to_string()).collect();
        let from = envelope.from().map(|a| a.to_string());
        self.sent
            .borrow_mut()
            .push((recipients, from, String::from_utf8_lossy(email).into_owned()));
        Ok(())
    }
}

#[test]
fn test_named_recipient_round_trip() {
    let transport = RecordingTransport::default();
    let mail = Mail::new("Hello")
        .message("plain body")
        .sender("app@example.com")
        .to(vec![("Jo", "jo@example.com")]);

    let report = send_mail_with(&transport, &mail, None).unwrap();

    let sent = transport.sent.borrow();
    assert_eq!(sent.len(), 1);
    let (recipients, from, raw) = &sent[0];
    assert_eq!(recipients, &vec!["jo@example.com".to_string()]);
    assert_eq!(from.as_deref(), Some("app@example.com"));
    assert!(raw.contains("To: Jo <jo@example.com>"));
    assert_eq!(report.recipients, vec!["jo@example.com"]);
    assert!(raw.contains(&report.message_id));
}

#[test]
fn test_full_email_reaches_every_recipient_class() {
    let dir = tempfile::tempdir().unwrap();
    let license = dir.path().join("LICENSE");
    let readme = dir.path().join("README.rst");
    std::fs::write(&license, "MIT").unwrap();
    std::fs::write(&readme, "send-mail\n=========\n").unwrap();

    let transport = RecordingTransport::default();
    let mail = Mail::new("[Mail Test] I should be delivered to the inbox")
        .message("\nYo...\n")
        .html_message("<h1>Hello, Welcome to the mailing group</h1><p>See you in the inbox</p>")
        .to(vec![
            AddressInput::from(("To Example", "to@example.com")),
            AddressInput::from("you@example.com"),
        ])
        .cc("him@example.com, her@example.com")
        .bcc(vec![
            AddressInput::from("them@example.com"),
            AddressInput::from(("You Know Who", "youknowwho@example.com")),
        ])
        .sender(("App", "notifications@example.com"))
        .reply_to("no-reply@example.com")
        .attachments([&license, &readme]);

    send_mail_with(&transport, &mail, None).unwrap();

    let sent = transport.sent.borrow();
    let (recipients, _, raw) = &sent[0];
    assert_eq!(
        recipients,
        &vec![
            "to@example.com".to_string(),
            "you@example.com".to_string(),
            "him@example.com".to_string(),
            "her@example.com".to_string(),
            "them@example.com".to_string(),
            "youknowwho@example.com".to_string(),
        ]
    );
    assert!(!raw.contains("youknowwho@example.com"));
    assert!(raw.contains("filename=\"LICENSE\""));
    assert!(raw.contains("filename=\"README.rst\""));
    assert!(raw.find("Content-Type: text/plain").unwrap() < raw.find("Content-Type: text/html").unwrap());
}

#[test]
fn test_no_recipients_is_invalid_input() {
    let transport = RecordingTransport::default();
    let variants = [
        Mail::new("s").message("b").sender("a@example.com"),
        Mail::new("s")
            .message("b")
            .sender("a@example.com")
            .to("")
            .cc(AddressList::Items(vec![]))
            .bcc("  "),
        Mail::new("s")
            .html_message("<p>b</p>")
            .sender("a@example.com")
            .attachment("/no/such/file"),
    ];

    for mail in &variants {
        assert!(matches!(
            send_mail_with(&transport, mail, None),
            Err(MailError::InvalidInput(_))
        ));
    }
    assert_eq!(transport.calls(), 0);
}

#[test]
fn test_missing_attachment_never_reaches_transport() {
    let transport = RecordingTransport::default();
    let mail = Mail::new("Report")
        .message("see attached")
        .sender("a@example.com")
        .to("b@example.com")
        .attachment("/no/such/report.pdf");

    match send_mail_with(&transport, &mail, None) {
        Err(MailError::AttachmentNotFound(path)) => {
            assert!(path.ends_with("report.pdf"));
        }
        other => panic!("Expected AttachmentNotFound, got {:?}", other),
    }
    assert_eq!(transport.calls(), 0);
}

#[test]
fn test_invalid_address_never_reaches_transport() {
    let transport = RecordingTransport::default();
    let mail = Mail::new("s")
        .message("b")
        .sender("a@example.com")
        .to("ok@example.com, not an address");

    assert!(matches!(
        send_mail_with(&transport, &mail, None),
        Err(MailError::InvalidAddress(_))
    ));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn test_transport_error_is_wrapped() {
    let transport = RecordingTransport::failing(io::ErrorKind::ConnectionRefused);
    let mail = Mail::new("s")
        .message("b")
        .sender("a@example.com")
        .to("b@example.com");

    match send_mail_with(&transport, &mail, None) {
        Err(MailError::TransportFailure(source)) => {
            let io_error = source.downcast_ref::<io::Error>().unwrap();
            assert_eq!(io_error.kind(), io::ErrorKind::ConnectionRefused);
        }
        other => panic!("Expected TransportFailure, got {:?}", other),
    }
}

#[test]
fn test_sender_fallback_sets_envelope_originator() {
    let transport = RecordingTransport::default();
    let mail = Mail::new("s").message("b").to("b@example.com");
    let fallback = AddressInput::from("robot@example.org");

    send_mail_with(&transport, &mail, Some(&fallback)).unwrap();

    let sent = transport.sent.borrow();
    assert_eq!(sent[0].1.as_deref(), Some("robot@example.org"));
    assert!(sent[0].2.contains("From: robot@example.org"));
}
