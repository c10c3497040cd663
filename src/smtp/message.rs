use crate::html::html_to_plain_text;
use crate::smtp::address::{normalize, normalize_list, AddressInput, AddressList, NormalizedAddress};
use crate::smtp::{MailError, MailResult};
use lettre::{
    address::Envelope,
    message::{
        header::{ContentTransferEncoding, ContentType, HeaderName, HeaderValue},
        Attachment, Body, MultiPart, SinglePart,
    },
    Address, Message,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Headers the composer writes itself; a custom header may not replace them
const COMPOSED_HEADERS: &[&str] = &[
    "From",
    "To",
    "Cc",
    "Bcc",
    "Reply-To",
    "Date",
    "Message-ID",
    "Subject",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
];

/// Everything that goes into one outgoing email
#[derive(Debug, Clone, Default)]
pub struct Mail {
    pub subject: String,
    pub message: Option<String>,
    pub html_message: Option<String>,
    pub to: AddressList,
    pub cc: AddressList,
    pub bcc: AddressList,
    pub sender: Option<AddressInput>,
    pub reply_to: AddressList,
    pub attachments: Vec<PathBuf>,
    pub custom_headers: Vec<(String, String)>,
}

impl Mail {
    /// Start a mail with the given subject
    pub fn new<S: Into<String>>(subject: S) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Set the plain-text body
    pub fn message<S: Into<String>>(mut self, body: S) -> Self {
        self.message = Some(body.into());
        self
    }

    /// Set the HTML body
    pub fn html_message<S: Into<String>>(mut self, body: S) -> Self {
        self.html_message = Some(body.into());
        self
    }

    pub fn to<A: Into<AddressList>>(mut self, to: A) -> Self {
        self.to = to.into();
        self
    }

    pub fn cc<A: Into<AddressList>>(mut self, cc: A) -> Self {
        self.cc = cc.into();
        self
    }

    pub fn bcc<A: Into<AddressList>>(mut self, bcc: A) -> Self {
        self.bcc = bcc.into();
        self
    }

    pub fn sender<A: Into<AddressInput>>(mut self, sender: A) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn reply_to<A: Into<AddressList>>(mut self, reply_to: A) -> Self {
        self.reply_to = reply_to.into();
        self
    }

    /// Append one attachment path
    pub fn attachment<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.attachments.push(path.into());
        self
    }

    /// Append several attachment paths, keeping their order
    pub fn attachments<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.attachments.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Append attachment paths given as one comma-separated string
    pub fn attachments_csv(mut self, paths: &str) -> Self {
        self.attachments.extend(
            paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
        self
    }

    /// Append a custom header; order is kept.
    ///
    /// Each name may appear once and must not be one of the headers the
    /// composer writes (From, Subject, Date, ...); `compose` rejects both.
    pub fn header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// True when no recipient class holds an address
    pub fn has_no_recipients(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }
}

/// A built message ready to hand to a transport
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub message: Message,
    pub message_id: String,
    /// To, Cc and Bcc addresses in that order, names stripped
    pub recipients: Vec<String>,
}

impl ComposedMessage {
    /// The full RFC 5322 text as it goes on the wire
    pub fn formatted(&self) -> Vec<u8> {
        self.message.formatted()
    }
}

/// Build the MIME message for `mail`.
///
/// `sender_fallback` is used as the originator when `mail` has no sender.
pub fn compose(mail: &Mail, sender_fallback: Option<&AddressInput>) -> MailResult<ComposedMessage> {
    if mail.subject.trim().is_empty() {
        return Err(MailError::InvalidInput("Subject is required".to_string()));
    }

    if mail.has_no_recipients() {
        return Err(MailError::InvalidInput(
            "At least one recipient is required".to_string(),
        ));
    }

    if mail.message.is_none() && mail.html_message.is_none() {
        return Err(MailError::InvalidInput(
            "A plain-text or HTML body is required".to_string(),
        ));
    }

    let headers = custom_headers(&mail.custom_headers)?;

    let sender = match (&mail.sender, sender_fallback) {
        (Some(sender), _) => normalize(sender).map_err(|e| in_field(e, "From"))?,
        (None, Some(fallback)) => normalize(fallback).map_err(|e| in_field(e, "From"))?,
        (None, None) => {
            return Err(MailError::InvalidInput(
                "A sender address is required".to_string(),
            ))
        }
    };
    let reply_to = normalize_field(&mail.reply_to, "Reply-To")?;
    let to = normalize_field(&mail.to, "To")?;
    let cc = normalize_field(&mail.cc, "Cc")?;
    let bcc = normalize_field(&mail.bcc, "Bcc")?;

    let message_id = generate_message_id(&sender);
    let sender_mailbox = sender.to_mailbox()?;

    let mut message_builder = Message::builder().from(sender_mailbox.clone());

    for to in &to {
        message_builder = message_builder.to(to.to_mailbox()?);
    }

    for cc in &cc {
        message_builder = message_builder.cc(cc.to_mailbox()?);
    }

    for reply_to in &reply_to {
        message_builder = message_builder.reply_to(reply_to.to_mailbox()?);
    }

    message_builder = message_builder
        .date(SystemTime::now())
        .message_id(Some(message_id.clone()))
        .subject(mail.subject.clone());

    for header in headers {
        message_builder = message_builder.raw_header(header);
    }

    // Bcc never becomes a header; it only widens the envelope
    let recipients: Vec<NormalizedAddress> = to.into_iter().chain(cc).chain(bcc).collect();
    let envelope_to = recipients
        .iter()
        .map(|r| r.to_mailbox().map(|mailbox| mailbox.email))
        .collect::<MailResult<Vec<Address>>>()?;
    let envelope = Envelope::new(Some(sender_mailbox.email), envelope_to)?;
    message_builder = message_builder.envelope(envelope);

    let mut mixed = MultiPart::mixed().multipart(build_body(mail));
    for path in &mail.attachments {
        mixed = mixed.singlepart(load_attachment(path)?);
    }

    let message = message_builder.multipart(mixed)?;

    tracing::debug!(
        "Composed message {} for {} recipients with {} attachments",
        message_id,
        recipients.len(),
        mail.attachments.len()
    );

    Ok(ComposedMessage {
        message,
        message_id,
        recipients: recipients.into_iter().map(|r| r.address).collect(),
    })
}

/// Plain text always comes before HTML so clients that take the first
/// readable part show text.
fn build_body(mail: &Mail) -> MultiPart {
    match (&mail.message, &mail.html_message) {
        (text, Some(html)) => {
            let text = text.clone().unwrap_or_else(|| html_to_plain_text(html));
            MultiPart::alternative()
                .singlepart(SinglePart::plain(text))
                .singlepart(SinglePart::html(html.clone()))
        }
        (Some(text), None) => MultiPart::alternative().singlepart(SinglePart::plain(text.clone())),
        (None, None) => MultiPart::alternative().singlepart(SinglePart::plain(String::new())),
    }
}

/// Read one file into a base64 `application/octet-stream` attachment
fn load_attachment(path: &Path) -> MailResult<SinglePart> {
    if !path.is_file() {
        tracing::error!(
            "Unable to open one of the attachments: {} not found",
            path.display()
        );
        return Err(MailError::AttachmentNotFound(path.to_path_buf()));
    }

    let content = std::fs::read(path).map_err(|source| {
        tracing::error!(
            "Unable to open one of the attachments: {}: {}",
            path.display(),
            source
        );
        match source.kind() {
            std::io::ErrorKind::NotFound => MailError::AttachmentNotFound(path.to_path_buf()),
            _ => MailError::AttachmentRead {
                path: path.to_path_buf(),
                source,
            },
        }
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    let content_type = ContentType::parse("application/octet-stream")
        .map_err(|e| MailError::InvalidInput(format!("Invalid attachment content type: {}", e)))?;

    // Base64 is always representable, so the Err arm cannot be taken
    let body = Body::new_with_encoding(content, ContentTransferEncoding::Base64)
        .map_err(|_| MailError::InvalidInput(format!("Cannot encode {}", path.display())))?;

    Ok(Attachment::new(filename).body(body, content_type))
}

/// Turn custom header pairs into lettre headers.
///
/// lettre keeps one value per name, so a repeated name or one the composer
/// sets itself would silently replace a header.
fn custom_headers(pairs: &[(String, String)]) -> MailResult<Vec<HeaderValue>> {
    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(pairs.len());

    for (name, value) in pairs {
        let header_name = HeaderName::new_from_ascii(name.clone()).map_err(|_| {
            MailError::InvalidInput(format!("Invalid custom header name: \"{}\"", name))
        })?;

        if COMPOSED_HEADERS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
        {
            return Err(MailError::InvalidInput(format!(
                "Custom header \"{}\" would replace a header set by the composer",
                name
            )));
        }

        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(MailError::InvalidInput(format!(
                "Custom header \"{}\" is given more than once",
                name
            )));
        }

        headers.push(HeaderValue::new(header_name, value.clone()));
    }

    Ok(headers)
}

fn normalize_field(list: &AddressList, field: &str) -> MailResult<Vec<NormalizedAddress>> {
    normalize_list(list).map_err(|e| in_field(e, field))
}

fn in_field(error: MailError, field: &str) -> MailError {
    match error {
        MailError::InvalidAddress(address) => {
            MailError::InvalidAddress(format!("{} in {}", address, field))
        }
        other => other,
    }
}

/// Generate a unique message ID under the sender's domain
fn generate_message_id(sender: &NormalizedAddress) -> String {
    format!("<{}@{}>", uuid::Uuid::new_v4(), sender.domain())
}
