pub mod address;
pub mod client;
pub mod config;
pub mod message;

pub use address::{normalize, normalize_list, validate, AddressInput, AddressList, NormalizedAddress};
pub use client::{deliver, SmtpClient};
pub use config::{parse_flag, TransportConfig, TransportOptions};
pub use message::{compose, ComposedMessage, Mail};

use lettre::Transport;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while composing or sending a mail
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File for attachment \"{}\" not found in file system", .0.display())]
    AttachmentNotFound(PathBuf),

    #[error("Unable to read attachment \"{}\": {source}", .path.display())]
    AttachmentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Message build error: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Unable to send the email: {0}")]
    TransportFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type MailResult<T> = Result<T, MailError>;

/// What a successful send handed to the transport
#[derive(Debug, Clone)]
pub struct SendReport {
    pub message_id: String,
    pub recipients: Vec<String>,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

/// Compose `mail` and send it over SMTP using `config`.
///
/// With no sender on the mail, the configured username is used as the
/// originator when it is itself an address. Nothing touches the network
/// until the message has been fully composed, attachments included.
pub fn send_mail(mail: &Mail, config: &TransportConfig) -> MailResult<SendReport> {
    let fallback = sender_fallback(config);
    let composed = compose(mail, fallback.as_ref())?;

    let client = SmtpClient::new(config.clone())?;
    client.send(&composed)
}

/// Compose `mail` and hand it to an arbitrary lettre transport
pub fn send_mail_with<T>(
    transport: &T,
    mail: &Mail,
    sender_fallback: Option<&AddressInput>,
) -> MailResult<SendReport>
where
    T: Transport,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    let composed = compose(mail, sender_fallback)?;
    deliver(transport, &composed)
}

fn sender_fallback(config: &TransportConfig) -> Option<AddressInput> {
    config
        .username
        .as_deref()
        .map(AddressInput::from)
        .filter(validate)
}
