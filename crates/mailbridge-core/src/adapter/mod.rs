//! Network implementations of the protocol traits.

mod imap;
mod smtp;

pub use imap::{ImapMailbox, PREVIEW_BYTES, SUMMARY_HEADERS, build_tree, imap_config};
pub use smtp::{SmtpSubmission, smtp_config};

use crate::config::EndpointConfig;
use crate::error::Result;
use crate::protocol::Connector;

/// Opens real IMAP and SMTP connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector;

impl Connector for NetworkConnector {
    type Mailbox = ImapMailbox;
    type Submission = SmtpSubmission;

    async fn open_mailbox(&self, config: &EndpointConfig) -> Result<Self::Mailbox> {
        ImapMailbox::connect(config).await
    }

    async fn open_submission(&self, config: &EndpointConfig) -> Result<Self::Submission> {
        SmtpSubmission::verify(config).await
    }
}
