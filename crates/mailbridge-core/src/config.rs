//! Server and pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    #[serde(rename = "starttls")]
    StartTls,
}

impl Security {
    /// Maps the `useTls` flag of a request: implicit TLS or STARTTLS.
    #[must_use]
    pub const fn from_use_tls(use_tls: bool) -> Self {
        if use_tls { Self::Tls } else { Self::StartTls }
    }
}

/// Which server an endpoint talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Mailbox access (IMAP).
    Mailbox,
    /// Message submission (SMTP).
    Submission,
}

impl Protocol {
    /// Conventional port for this protocol and security mode.
    #[must_use]
    pub const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Mailbox, Security::Tls) => 993,
            (Self::Mailbox, Security::None | Security::StartTls) => 143,
            (Self::Submission, Security::Tls) => 465,
            (Self::Submission, Security::None | Security::StartTls) => 587,
        }
    }

    /// Host name guessed from the address domain.
    #[must_use]
    pub fn guess_host(self, domain: &str) -> String {
        match self {
            Self::Mailbox => format!("imap.{domain}"),
            Self::Submission => format!("smtp.{domain}"),
        }
    }
}

/// Connection settings a caller may supply instead of the guessed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointSettings {
    /// Server hostname.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Whether implicit TLS is used. `false` means STARTTLS.
    pub use_tls: Option<bool>,
}

/// One server endpoint with credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl EndpointConfig {
    fn resolve(
        protocol: Protocol,
        domain: &str,
        username: &str,
        password: &str,
        settings: Option<&EndpointSettings>,
    ) -> Self {
        let fallback = match protocol {
            Protocol::Mailbox => Security::Tls,
            Protocol::Submission => Security::StartTls,
        };
        let security = settings
            .and_then(|s| s.use_tls)
            .map_or(fallback, Security::from_use_tls);
        let host = settings
            .and_then(|s| s.host.clone())
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| protocol.guess_host(domain));
        let port = settings
            .and_then(|s| s.port)
            .unwrap_or_else(|| protocol.default_port(security));
        Self {
            host,
            port,
            security,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn validate(&self, field: &'static str) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::validation(field, "host is required"));
        }
        if self.port == 0 {
            return Err(Error::validation(field, "port must be non-zero"));
        }
        if self.username.is_empty() {
            return Err(Error::validation(field, "username is required"));
        }
        Ok(())
    }
}

/// Mailbox and submission endpoints of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Mailbox access server.
    pub mailbox: EndpointConfig,
    /// Submission server.
    pub submission: EndpointConfig,
}

impl ServerConfig {
    /// Builds a configuration for `email`, guessing `imap.<domain>` and
    /// `smtp.<domain>` for endpoints that are not supplied.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the email or password is missing or
    /// the address has no domain.
    pub fn from_email(
        email: &str,
        password: &str,
        mailbox: Option<&EndpointSettings>,
        submission: Option<&EndpointSettings>,
    ) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::missing("email"));
        }
        if password.is_empty() {
            return Err(Error::missing("password"));
        }
        let domain = email
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::validation("email", "must contain a domain"))?;

        let config = Self {
            mailbox: EndpointConfig::resolve(Protocol::Mailbox, domain, email, password, mailbox),
            submission: EndpointConfig::resolve(
                Protocol::Submission,
                domain,
                email,
                password,
                submission,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that both endpoints are usable.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<()> {
        self.mailbox.validate("mailboxConfig")?;
        self.submission.validate("submissionConfig")
    }
}

/// Tunables of the mail pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Charset fallback order for undeclared or unknown charsets.
    pub charset_fallbacks: Vec<String>,
    /// Length of the preview text in message summaries.
    pub preview_chars: usize,
    /// Limit for every mailbox operation, in seconds.
    pub operation_timeout_secs: u64,
    /// Limit for each credential test, in seconds.
    pub connect_test_timeout_secs: u64,
    /// Number of messages listed when the caller gives no limit.
    pub default_fetch_limit: u32,
    /// Whether external images are removed from rendered HTML.
    pub block_external_images: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            charset_fallbacks: mailbridge_mime::DecoderConfig::default().charset_fallbacks,
            preview_chars: 200,
            operation_timeout_secs: 60,
            connect_test_timeout_secs: 10,
            default_fetch_limit: 50,
            block_external_images: true,
        }
    }
}

impl PipelineConfig {
    /// Limit for every mailbox operation.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Limit for each credential test.
    #[must_use]
    pub const fn connect_test_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_test_timeout_secs)
    }

    /// Decoder settings derived from this configuration.
    #[must_use]
    pub fn decoder_config(&self) -> mailbridge_mime::DecoderConfig {
        mailbridge_mime::DecoderConfig {
            charset_fallbacks: self.charset_fallbacks.clone(),
            block_external_images: self.block_external_images,
            include_attachment_content: true,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_from_email_guesses_hosts() {
        let config = ServerConfig::from_email("alice@x.org", "secret", None, None).unwrap();
        assert_eq!(config.mailbox.host, "imap.x.org");
        assert_eq!(config.mailbox.port, 993);
        assert_eq!(config.mailbox.security, Security::Tls);
        assert_eq!(config.submission.host, "smtp.x.org");
        assert_eq!(config.submission.port, 587);
        assert_eq!(config.submission.security, Security::StartTls);
        assert_eq!(config.submission.username, "alice@x.org");
    }

    #[test]
    fn test_from_email_with_settings() {
        let mailbox = EndpointSettings {
            host: Some("mail.example.com".to_string()),
            port: None,
            use_tls: Some(false),
        };
        let submission = EndpointSettings {
            host: None,
            port: Some(2525),
            use_tls: Some(true),
        };
        let config =
            ServerConfig::from_email("alice@x.org", "pw", Some(&mailbox), Some(&submission))
                .unwrap();
        assert_eq!(config.mailbox.host, "mail.example.com");
        assert_eq!(config.mailbox.security, Security::StartTls);
        assert_eq!(config.mailbox.port, 143);
        assert_eq!(config.submission.host, "smtp.x.org");
        assert_eq!(config.submission.port, 2525);
        assert_eq!(config.submission.security, Security::Tls);
    }

    #[test]
    fn test_from_email_validation() {
        let err = ServerConfig::from_email("", "pw", None, None).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "email", .. }));

        let err = ServerConfig::from_email("alice@x.org", "", None, None).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "password", .. }));

        let err = ServerConfig::from_email("alice", "pw", None, None).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_password_is_not_debug_printed() {
        let config = ServerConfig::from_email("alice@x.org", "hunter2", None, None).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_pipeline_defaults_and_partial_json() {
        let config: PipelineConfig = serde_json::from_str(r#"{"preview_chars": 80}"#).unwrap();
        assert_eq!(config.preview_chars, 80);
        assert_eq!(config.operation_timeout(), Duration::from_secs(60));
        assert_eq!(config.connect_test_timeout(), Duration::from_secs(10));
        assert_eq!(config.default_fetch_limit, 50);
        assert!(!config.charset_fallbacks.is_empty());
    }
}
