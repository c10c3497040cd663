use crate::smtp::config::TransportConfig;
use crate::smtp::message::ComposedMessage;
use crate::smtp::{MailError, MailResult, SendReport};
use lettre::{
    transport::smtp::authentication::{Credentials, Mechanism},
    SmtpTransport, Transport,
};

/// Blocking SMTP client; every send opens and closes its own connection
pub struct SmtpClient {
    config: TransportConfig,
    transport: SmtpTransport,
}

impl SmtpClient {
    /// Create a new SMTP client
    pub fn new(config: TransportConfig) -> MailResult<Self> {
        let transport = Self::build_transport(&config)?;

        Ok(Self { config, transport })
    }

    /// Build the lettre transport from configuration
    fn build_transport(config: &TransportConfig) -> MailResult<SmtpTransport> {
        // Implicit TLS wins over STARTTLS when both are requested
        let builder = (if config.use_ssl {
            SmtpTransport::relay(&config.host)
        } else if config.use_tls {
            SmtpTransport::starttls_relay(&config.host)
        } else {
            Ok(SmtpTransport::builder_dangerous(&config.host))
        })
        .map_err(|e| {
            MailError::InvalidConfig(format!("TLS configuration failed for {}: {}", config.host, e))
        })?;

        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .authentication(vec![Mechanism::Plain, Mechanism::Login]);
        }

        if config.debug {
            tracing::debug!(
                "SMTP transport for {}:{} (implicit TLS: {}, STARTTLS: {}, auth: {})",
                config.host,
                config.port,
                config.use_ssl,
                config.use_tls && !config.use_ssl,
                config.username.is_some()
            );
        }

        Ok(builder.build())
    }

    /// Send a composed message to all of its recipients
    pub fn send(&self, composed: &ComposedMessage) -> MailResult<SendReport> {
        if self.config.debug {
            tracing::debug!(
                "Outgoing message:\n{}",
                String::from_utf8_lossy(&composed.formatted())
            );
        }

        deliver(&self.transport, composed)
    }
}

/// Hand `composed` to `transport` in one transmission.
///
/// Failures are logged and returned as [`MailError::TransportFailure`].
pub fn deliver<T>(transport: &T, composed: &ComposedMessage) -> MailResult<SendReport>
where
    T: Transport,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    match transport.send(&composed.message) {
        Ok(_) => {
            let report = SendReport {
                message_id: composed.message_id.clone(),
                recipients: composed.recipients.clone(),
                sent_at: chrono::Utc::now(),
            };

            tracing::info!(
                "Email sent successfully: {} to {} recipients",
                report.message_id,
                report.recipients.len()
            );

            Ok(report)
        }
        Err(e) => {
            tracing::error!("Unable to send the email. Error: {}", e);
            Err(MailError::TransportFailure(Box::new(e)))
        }
    }
}
