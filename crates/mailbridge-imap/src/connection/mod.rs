//! Transport, framing and the client.

mod client;
mod config;
mod framed;
mod stream;

pub use client::Client;
pub use config::{Config, Security};
pub use framed::{FramedStream, MAX_LINE_LENGTH, MAX_LITERAL_SIZE};
pub use stream::{ImapStream, connect, tls_connector, with_timeout};
