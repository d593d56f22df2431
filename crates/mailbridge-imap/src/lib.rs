//! # mailbridge-imap
//!
//! Async IMAP client (RFC 9051 with RFC 3501 fallback) covering what a
//! webmail back end needs: LOGIN, LIST, SELECT/EXAMINE, FETCH, UID STORE,
//! UID COPY, UID MOVE, EXPUNGE and STARTTLS.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbridge_imap::{Client, Config, FetchAttribute, SequenceSet};
//!
//! #[tokio::main]
//! async fn main() -> mailbridge_imap::Result<()> {
//!     let mut client = Client::connect(&Config::new("imap.example.com")).await?;
//!     client.login("user@example.com", "password").await?;
//!
//!     for mailbox in client.list("", "*").await? {
//!         println!("{}", mailbox.name);
//!     }
//!
//!     let status = client.examine("INBOX").await?;
//!     let messages = client
//!         .fetch(
//!             &SequenceSet::starting_at(status.exists.saturating_sub(9).max(1)),
//!             &[FetchAttribute::Uid, FetchAttribute::Flags],
//!             false,
//!         )
//!         .await?;
//!     println!("{} messages", messages.len());
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──> Authenticated ── select()/examine() ──> Selected
//!                                       ^                                    │
//!                                       └────────────── close() ─────────────┘
//! ```
//!
//! The client tracks the state at runtime and rejects commands that are not
//! valid in it with [`Error::InvalidState`].
//!
//! ## Modules
//!
//! - [`command`]: command types and serialization
//! - [`connection`]: transport, framing and the client
//! - [`parser`]: response parser
//! - [`types`]: flags, sequence sets, mailbox and fetch data

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
mod state;
pub mod types;

pub use command::{Command, FetchAttribute, StoreAction, TagGenerator};
pub use connection::{Client, Config, FramedStream, ImapStream, Security};
pub use error::{Error, Result};
pub use parser::{Response, ResponseParser, Status, StatusResponse, UntaggedResponse};
pub use state::{ProtocolState, SelectedState};
pub use types::{
    BodySection, FetchedMessage, Flag, ListResponse, MailboxAttribute, MailboxStatus, SeqNum,
    SequenceSet, Uid,
};
