//! SMTP connection management with type-state pattern.

mod client;
mod config;
mod stream;

pub use client::{Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded};
pub use config::{Config, Security};
pub use stream::{SmtpStream, connect, with_timeout};
