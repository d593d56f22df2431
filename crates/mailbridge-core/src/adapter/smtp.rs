//! Submission protocol over the SMTP client.

use mailbridge_mime::ComposedMessage;
use mailbridge_smtp::{Authenticated, Client, Config, Envelope, SmtpStream};
use tracing::{info, warn};

use crate::config::{EndpointConfig, Security};
use crate::error::{Error, Result};
use crate::protocol::SubmissionProtocol;

/// Translates an endpoint into SMTP client settings.
#[must_use]
pub fn smtp_config(endpoint: &EndpointConfig) -> Config {
    let security = match endpoint.security {
        Security::Tls => mailbridge_smtp::Security::Implicit,
        Security::StartTls => mailbridge_smtp::Security::StartTls,
        Security::None => mailbridge_smtp::Security::None,
    };
    Config::new(endpoint.host.clone())
        .security(security)
        .port(endpoint.port)
}

/// Verified submission credentials. Each submission opens its own
/// connection, so nothing is held open between messages.
#[derive(Debug, Clone)]
pub struct SmtpSubmission {
    endpoint: EndpointConfig,
}

impl SmtpSubmission {
    /// Connects, authenticates and quits to prove the credentials work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] when the server is unreachable or
    /// refuses the credentials.
    pub async fn verify(endpoint: &EndpointConfig) -> Result<Self> {
        let client = authenticate(endpoint)
            .await
            .map_err(|e| Error::Connection(format!("{}:{}: {e}", endpoint.host, endpoint.port)))?;
        if let Err(e) = client.quit().await {
            warn!(host = %endpoint.host, error = %e, "QUIT after credential check failed");
        }
        Ok(Self {
            endpoint: endpoint.clone(),
        })
    }
}

async fn authenticate(
    endpoint: &EndpointConfig,
) -> mailbridge_smtp::Result<Client<SmtpStream, Authenticated>> {
    Client::connect(&smtp_config(endpoint))
        .await?
        .auth_plain(&endpoint.username, &endpoint.password)
        .await
}

impl SubmissionProtocol for SmtpSubmission {
    async fn submit(&mut self, message: &ComposedMessage) -> Result<String> {
        let envelope = Envelope::new(&message.sender, &message.recipients)?;
        let client = authenticate(&self.endpoint).await?;
        let (client, reply) = client.send(&envelope, message.content.as_bytes()).await?;
        info!(
            message_id = %message.message_id,
            recipients = envelope.to.len(),
            reply = %reply.text(),
            "message submitted"
        );
        if let Err(e) = client.quit().await {
            warn!(error = %e, "QUIT after submission failed");
        }
        Ok(message.message_id.clone())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
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
    fn test_smtp_config_mapping() {
        let endpoint = EndpointConfig {
            host: "smtp.x.org".to_string(),
            port: 465,
            security: Security::Tls,
            username: "alice".to_string(),
            password: "pw".to_string(),
        };
        let config = smtp_config(&endpoint);
        assert_eq!(config.port, 465);
        assert_eq!(config.security, mailbridge_smtp::Security::Implicit);
        assert_eq!(config.host, "smtp.x.org");
    }

    #[tokio::test]
    async fn test_verify_unreachable_is_connection_error() {
        let endpoint = EndpointConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            security: Security::None,
            username: "alice".to_string(),
            password: "pw".to_string(),
        };
        let err = SmtpSubmission::verify(&endpoint).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
