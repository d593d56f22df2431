//! # mailbridge-smtp
//!
//! SMTP submission client (RFC 5321, RFC 4954 AUTH PLAIN, RFC 3207
//! STARTTLS) that hands composed messages to the outbound relay.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbridge_smtp::{Client, Config, Envelope};
//!
//! #[tokio::main]
//! async fn main() -> mailbridge_smtp::Result<()> {
//!     let client = Client::connect(&Config::new("smtp.example.com")).await?;
//!     let client = client.auth_plain("user@example.com", "password").await?;
//!
//!     let envelope = Envelope::new("user@example.com", ["friend@example.org"])?;
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let (client, reply) = client.send(&envelope, message).await?;
//!     println!("{}", reply.text());
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ── auth_plain() ──> Authenticated ── mail_from() ──> MailTransaction
//!                                     ^                                │ rcpt_to()
//!                                     │                                v
//!                                     └── send_message() ── Data <── RecipientAdded
//! ```
//!
//! ## Modules
//!
//! - [`command`]: commands and DATA dot-stuffing
//! - [`connection`]: transport and the type-state client
//! - [`parser`]: reply parser
//! - [`types`]: addresses, extensions, replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Config, Connected, Data, MailTransaction, RecipientAdded, Security,
    SmtpStream,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Envelope, Extension, Reply, ReplyCode, ServerInfo};
