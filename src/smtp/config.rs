use crate::smtp::{MailError, MailResult};
use serde::Deserialize;
use std::path::Path;

pub const ENV_HOST: &str = "SMTP_HOST";
pub const ENV_PORT: &str = "SMTP_PORT";
pub const ENV_USERNAME: &str = "SMTP_USERNAME";
pub const ENV_PASSWORD: &str = "SMTP_PASSWORD";
pub const ENV_USE_TLS: &str = "SMTP_USE_TLS";
pub const ENV_USE_SSL: &str = "SMTP_USE_SSL";
pub const ENV_DEBUG: &str = "SMTP_DEBUG";

/// Connection settings supplied at the call site; anything left `None`
/// falls back to the environment when resolved.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: Option<bool>,
    pub use_ssl: Option<bool>,
    pub debug: Option<bool>,
}

impl TransportOptions {
    /// Fill every unset field from `fallback`
    pub fn or(self, fallback: TransportOptions) -> Self {
        Self {
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
            use_tls: self.use_tls.or(fallback.use_tls),
            use_ssl: self.use_ssl.or(fallback.use_ssl),
            debug: self.debug.or(fallback.debug),
        }
    }

    /// Load options from a TOML file
    pub fn from_toml_file(path: &Path) -> MailResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MailError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> MailResult<Self> {
        toml::from_str(content)
            .map_err(|e| MailError::InvalidConfig(format!("Invalid transport config: {}", e)))
    }
}

/// Fully resolved SMTP connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upgrade a plain connection with STARTTLS
    pub use_tls: bool,
    /// Implicit TLS from the first byte
    pub use_ssl: bool,
    /// Verbose protocol tracing
    pub debug: bool,
}

impl TransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            use_tls: false,
            use_ssl: false,
            debug: false,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_starttls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_implicit_tls(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Merge explicit options over values from `lookup`.
    ///
    /// `lookup` receives the `SMTP_*` variable names. Empty values count as
    /// unset. Host and port must come from one side or the other.
    pub fn resolve<F>(options: &TransportOptions, lookup: F) -> MailResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = options
            .host
            .clone()
            .or_else(|| lookup(ENV_HOST))
            .ok_or_else(|| {
                MailError::InvalidConfig(format!("SMTP host is required (set {})", ENV_HOST))
            })?;

        let port = match options.port {
            Some(port) => port,
            None => {
                let raw = lookup(ENV_PORT).ok_or_else(|| {
                    MailError::InvalidConfig(format!("SMTP port is required (set {})", ENV_PORT))
                })?;
                raw.trim().parse::<u16>().map_err(|_| {
                    MailError::InvalidConfig(format!("Invalid SMTP port in {}: \"{}\"", ENV_PORT, raw))
                })?
            }
        };

        let username = options.username.clone().or_else(|| lookup(ENV_USERNAME));
        let password = options.password.clone().or_else(|| lookup(ENV_PASSWORD));

        if username.is_some() && password.is_none() {
            return Err(MailError::InvalidConfig(format!(
                "SMTP password is required when a username is set (set {})",
                ENV_PASSWORD
            )));
        }

        if username.is_none() && password.is_some() {
            return Err(MailError::InvalidConfig(format!(
                "SMTP username is required when a password is set (set {})",
                ENV_USERNAME
            )));
        }

        let flag = |explicit: Option<bool>, key: &str| -> MailResult<bool> {
            match explicit {
                Some(value) => Ok(value),
                None => lookup(key).map(|raw| parse_flag(&raw)).unwrap_or(Ok(false)),
            }
        };

        Ok(Self {
            host,
            port,
            username,
            password,
            use_tls: flag(options.use_tls, ENV_USE_TLS)?,
            use_ssl: flag(options.use_ssl, ENV_USE_SSL)?,
            debug: flag(options.debug, ENV_DEBUG)?,
        })
    }

    /// Resolve against the process environment
    pub fn from_env(options: &TransportOptions) -> MailResult<Self> {
        Self::resolve(options, |key| std::env::var(key).ok())
    }
}

/// Parse a boolean flag given as text.
///
/// Accepts `true/1/yes/on` and `false/0/no/off`, case-insensitive.
pub fn parse_flag(value: &str) -> MailResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(MailError::InvalidConfig(format!(
            "Invalid boolean flag: \"{}\"",
            value
        ))),
    }
}
