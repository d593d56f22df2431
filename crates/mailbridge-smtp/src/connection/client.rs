//! Type-state SMTP client.

use std::io;
use std::marker::PhantomData;
use std::time::Duration;

use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::config::{Config, Security};
use super::stream::{self, SmtpStream, with_timeout};
use crate::command::{Command, dot_stuff};
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Envelope, Reply, ReplyCode, ServerInfo};

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REPLY_LINE: usize = 64 * 1024;

/// Type-state marker: greeted, not authenticated.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: AUTH succeeded.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: MAIL FROM accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker: at least one RCPT TO accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker: DATA accepted, content expected.
#[derive(Debug)]
pub struct Data;

/// SMTP client over transport `S` in protocol state `State`.
#[derive(Debug)]
pub struct Client<S, State = Connected> {
    reader: BufReader<S>,
    server_info: ServerInfo,
    io_timeout: Duration,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Extensions from the last EHLO.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            reader: self.reader,
            server_info: self.server_info,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, command: &Command) -> Result<Reply> {
        debug!(command = command.name(), "sending");
        self.write(&command.serialize()).await?;
        let reply = self.read_reply().await?;
        debug!(command = command.name(), code = reply.code.as_u16(), "reply");
        Ok(reply)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        with_timeout(self.io_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await?;
            Ok(())
        })
        .await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }
            let last = is_last_reply_line(&line);
            lines.push(line);
            if last {
                return parse_reply(&lines);
            }
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let reader = &mut self.reader;
        let raw = with_timeout(self.io_timeout, async {
            let mut raw = Vec::new();
            let n = reader.read_until(b'\n', &mut raw).await?;
            if n == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
            Ok(raw)
        })
        .await?;

        if raw.len() > MAX_REPLY_LINE {
            return Err(Error::Parse("reply line too long".to_string()));
        }
        Ok(String::from_utf8_lossy(&raw).trim_end().to_string())
    }

    /// Sends QUIT and closes the session (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT is not acknowledged.
    pub async fn quit(mut self) -> Result<()> {
        self.send_command(&Command::Quit)
            .await?
            .expect_code(|code| code.is_success())?;
        Ok(())
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the 220 greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] when the server refuses service.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            reader: BufReader::new(stream),
            server_info: ServerInfo::default(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            _state: PhantomData,
        };
        let greeting = client
            .read_reply()
            .await?
            .expect_code(|code| code == ReplyCode::SERVICE_READY)?;
        debug!(greeting = %greeting.text(), "connected");
        Ok(client)
    }

    /// Sets the limit applied to each read and write.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sends EHLO and records the announced extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if EHLO is rejected.
    pub async fn ehlo(mut self, client_name: &str) -> Result<Self> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_name.to_string(),
            })
            .await?
            .into_success()?;
        self.server_info = ServerInfo::from_ehlo(&reply.lines);
        Ok(self)
    }

    /// Authenticates with PLAIN (`\0user\0password`, base64).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the credentials are refused.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        let reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            })
            .await?;

        if !reply.is_success() {
            return Err(Error::Auth {
                code: reply.code.as_u16(),
                message: reply.text(),
            });
        }
        info!(user = %username, "SMTP authenticated");
        Ok(self.transition())
    }
}

impl Client<SmtpStream, Connected> {
    /// Connects, reads the greeting, sends EHLO and upgrades with STARTTLS
    /// when configured.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a refused greeting, or a
    /// server without STARTTLS when it is required.
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = stream::connect(config).await?;
        let client = with_timeout(config.connect_timeout, Self::from_stream(transport))
            .await?
            .with_timeout(config.io_timeout)
            .ehlo(&config.client_name)
            .await?;

        if config.security == Security::StartTls {
            return client.starttls(&config.host, &config.client_name).await;
        }
        Ok(client)
    }

    /// Upgrades to TLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if STARTTLS was not announced.
    pub async fn starttls(mut self, host: &str, client_name: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".to_string()));
        }
        self.send_command(&Command::StartTls)
            .await?
            .expect_code(|code| code == ReplyCode::SERVICE_READY)?;

        let transport = self.reader.into_inner().upgrade_to_tls(host).await?;
        let upgraded = Self {
            reader: BufReader::new(transport),
            server_info: ServerInfo::default(),
            io_timeout: self.io_timeout,
            _state: PhantomData,
        };
        upgraded.ehlo(client_name).await
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the sender is refused.
    pub async fn mail_from(
        mut self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<S, MailTransaction>> {
        self.send_command(&Command::MailFrom { from, size })
            .await?
            .into_success()?;
        Ok(self.transition())
    }

    /// Sends one message: MAIL FROM, RCPT TO per recipient, DATA and the
    /// dot-stuffed content. Returns the final reply and the client ready for
    /// the next transaction.
    ///
    /// # Errors
    ///
    /// Returns the first rejection; the connection should then be dropped.
    pub async fn send(self, envelope: &Envelope, message: &[u8]) -> Result<(Self, Reply)> {
        let size = self
            .server_info
            .max_message_size()
            .map(|_| message.len());
        let mut recipients = envelope.to.iter();
        let first = recipients
            .next()
            .ok_or_else(|| Error::InvalidAddress("no recipients".to_string()))?;

        let mut client = self
            .mail_from(envelope.from.clone(), size)
            .await?
            .rcpt_to(first.clone())
            .await?;
        for to in recipients {
            client = client.rcpt_to(to.clone()).await?;
        }
        client.data().await?.send_message(message).await
    }
}

impl<S> Client<S, MailTransaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the recipient is refused.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<S, RecipientAdded>> {
        self.send_command(&Command::RcptTo { to })
            .await?
            .into_success()?;
        Ok(self.transition())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET is refused.
    pub async fn reset(mut self) -> Result<Client<S, Authenticated>> {
        self.send_command(&Command::Rset).await?.into_success()?;
        Ok(self.transition())
    }
}

impl<S> Client<S, RecipientAdded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the recipient is refused.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.send_command(&Command::RcptTo { to })
            .await?
            .into_success()?;
        Ok(self)
    }

    /// Sends DATA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<S, Data>> {
        self.send_command(&Command::Data)
            .await?
            .expect_code(|code| code == ReplyCode::START_DATA)?;
        Ok(self.transition())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET is refused.
    pub async fn reset(mut self) -> Result<Client<S, Authenticated>> {
        self.send_command(&Command::Rset).await?.into_success()?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Data>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes the message content with CRLF line endings and dot-stuffing,
    /// terminates it and waits for acceptance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the server refuses the message.
    pub async fn send_message(
        mut self,
        message: &[u8],
    ) -> Result<(Client<S, Authenticated>, Reply)> {
        self.write(&dot_stuff(message)).await?;
        let reply = self.read_reply().await?.into_success()?;
        debug!(bytes = message.len(), reply = %reply.text(), "message accepted");
        Ok((self.transition(), reply))
    }
}
