//! # mailbridge-core
//!
//! Session and mailbox layer of the mailbridge webmail back end.
//!
//! This crate provides:
//! - Protocol traits the operations are written against, with IMAP and
//!   SMTP implementations in [`adapter`]
//! - A per-user [`SessionRegistry`] holding one authenticated connection
//!   pair per user
//! - Mailbox operations: folder listing, message listing, full message
//!   retrieval, flag changes, move, copy and delete
//! - The [`MailService`] facade returning [`ApiResponse`] envelopes
//!
//! ## Example
//!
//! ```ignore
//! use mailbridge_core::{Credentials, MailService, NetworkConnector, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = MailService::new(NetworkConnector, PipelineConfig::default());
//!     let connected = service
//!         .connect_session(&Credentials::new("user@example.com", "password"))
//!         .await;
//!     let session_id = connected.data.map(|info| info.session_id);
//!
//!     let inbox = service
//!         .list_messages(session_id.as_deref(), None, Some(20))
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&inbox).unwrap());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod config;
mod error;
pub mod mailbox;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod service;

pub use adapter::{ImapMailbox, NetworkConnector, SmtpSubmission};
pub use config::{EndpointConfig, EndpointSettings, PipelineConfig, Security, ServerConfig};
pub use error::{Error, Result};
pub use model::{CredentialCheck, FolderDescriptor, FolderKind, MessageFlag, MessageSummary};
pub use protocol::{
    Connector, FetchEvent, FolderNode, MailboxProtocol, SelectedFolder, SubmissionProtocol,
};
pub use registry::{Session, SessionHandle, SessionRegistry};
pub use service::{
    ApiResponse, AttachmentUpload, Credentials, MailService, SendRequest, SentMessage,
    SessionInfo, decode_session_id, encode_session_id,
};
