use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::smtp::{
    parse_flag, send_mail, AddressInput, AddressList, Mail, SendReport, TransportConfig,
    TransportOptions,
};

/// send-mail - compose and send one email over SMTP
#[derive(Parser, Debug)]
#[command(name = "send-mail")]
#[command(about = "Compose and send one email over SMTP")]
#[command(version)]
pub struct Cli {
    /// Subject line
    #[arg(short, long)]
    pub subject: String,

    /// Plain-text body
    #[arg(short, long, conflicts_with = "message_file")]
    pub message: Option<String>,

    /// Read the plain-text body from a file
    #[arg(long)]
    pub message_file: Option<PathBuf>,

    /// HTML body; a plain-text fallback is derived when no text body is given
    #[arg(long, conflicts_with = "html_file")]
    pub html: Option<String>,

    /// Read the HTML body from a file
    #[arg(long)]
    pub html_file: Option<PathBuf>,

    /// To recipients (repeatable, comma-separated, `Name <addr>` allowed)
    #[arg(long)]
    pub to: Vec<String>,

    /// Cc recipients
    #[arg(long)]
    pub cc: Vec<String>,

    /// Bcc recipients
    #[arg(long)]
    pub bcc: Vec<String>,

    /// Sender address
    #[arg(long)]
    pub from: Option<String>,

    /// Reply-To addresses
    #[arg(long)]
    pub reply_to: Vec<String>,

    /// File to attach (repeatable)
    #[arg(short, long = "attach")]
    pub attachments: Vec<PathBuf>,

    /// Custom header as `Name: value` (repeatable)
    #[arg(long = "header", value_parser = parse_header_arg)]
    pub headers: Vec<(String, String)>,

    /// SMTP server host [env: SMTP_HOST]
    #[arg(long)]
    pub host: Option<String>,

    /// SMTP server port [env: SMTP_PORT]
    #[arg(long)]
    pub port: Option<u16>,

    /// SMTP username [env: SMTP_USERNAME]
    #[arg(long)]
    pub username: Option<String>,

    /// SMTP password [env: SMTP_PASSWORD]
    #[arg(long)]
    pub password: Option<String>,

    /// Upgrade the connection with STARTTLS [env: SMTP_USE_TLS]
    #[arg(long, value_name = "FLAG", value_parser = parse_flag_arg)]
    pub use_tls: Option<bool>,

    /// Use implicit TLS [env: SMTP_USE_SSL]
    #[arg(long, value_name = "FLAG", value_parser = parse_flag_arg)]
    pub use_ssl: Option<bool>,

    /// Enable debug logging and protocol tracing [env: SMTP_DEBUG]
    #[arg(long)]
    pub debug: bool,

    /// TOML file with transport settings; command-line flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Transport options given on the command line, layered over `--config`
    pub fn transport_options(&self) -> Result<TransportOptions> {
        let cli_options = TransportOptions {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            use_tls: self.use_tls,
            use_ssl: self.use_ssl,
            debug: self.debug.then_some(true),
        };

        match &self.config {
            Some(path) => {
                let file_options = TransportOptions::from_toml_file(path)
                    .with_context(|| format!("Loading transport config {}", path.display()))?;
                Ok(cli_options.or(file_options))
            }
            None => Ok(cli_options),
        }
    }

    /// Resolve the transport configuration against the process environment
    pub fn transport_config(&self) -> Result<TransportConfig> {
        let options = self.transport_options()?;
        Ok(TransportConfig::from_env(&options)?)
    }

    /// Build the mail described by the arguments
    pub fn to_mail(&self) -> Result<Mail> {
        let mut mail = Mail::new(self.subject.clone())
            .to(parse_address_args(&self.to))
            .cc(parse_address_args(&self.cc))
            .bcc(parse_address_args(&self.bcc))
            .reply_to(parse_address_args(&self.reply_to))
            .attachments(self.attachments.iter().cloned());

        if let Some(body) = read_body(&self.message, &self.message_file)? {
            mail = mail.message(body);
        }

        if let Some(body) = read_body(&self.html, &self.html_file)? {
            mail = mail.html_message(body);
        }

        if let Some(from) = &self.from {
            mail = mail.sender(AddressInput::parse_display(from));
        }

        for (name, value) in &self.headers {
            mail = mail.header(name.clone(), value.clone());
        }

        Ok(mail)
    }
}

/// Build the mail and send it
pub fn run(cli: &Cli, config: &TransportConfig) -> Result<SendReport> {
    let mail = cli.to_mail()?;
    let report = send_mail(&mail, config).context("Sending mail failed")?;
    Ok(report)
}

fn read_body(inline: &Option<String>, file: &Option<PathBuf>) -> Result<Option<String>> {
    match (inline, file) {
        (Some(body), _) => Ok(Some(body.clone())),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Reading body from {}", path.display())),
        (None, None) => Ok(None),
    }
}

/// Flatten repeated, comma-separated address arguments into one list
pub fn parse_address_args(values: &[String]) -> AddressList {
    let inputs: Vec<AddressInput> = values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(AddressInput::parse_display)
        .collect();
    AddressList::Items(inputs)
}

/// Parse a `Name: value` header argument
pub fn parse_header_arg(value: &str) -> Result<(String, String)> {
    let (name, header_value) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("Header must look like `Name: value`, got \"{}\"", value))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Header name is empty in \"{}\"", value));
    }

    Ok((name.to_string(), header_value.trim().to_string()))
}

fn parse_flag_arg(value: &str) -> Result<bool> {
    Ok(parse_flag(value)?)
}
